//! Small demonstration filters built on top of the resampler.

use crate::error::{ProcessError, Result};
use crate::interpolate::{bilinear, target_dimensions, validate_factor};
use image::RgbaImage;

/// Axis-aligned pixel rectangle, `x..x + width` by `y..y + height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self { Self { x, y, width, height } }

    fn fits(&self, w: u32, h: u32) -> bool {
        self.x.checked_add(self.width).is_some_and(|r| r <= w)
            && self.y.checked_add(self.height).is_some_and(|b| b <= h)
    }
}

/// Channel mean written to green; red and blue zeroed.
pub fn greenscale(input: &RgbaImage) -> RgbaImage {
    let mut green = RgbaImage::new(input.width(), input.height());
    for (dst, p) in green.pixels_mut().zip(input.pixels()) {
        let mean = (p[0] as u16 + p[1] as u16 + p[2] as u16) / 3;
        dst.0 = [0, mean as u8, 0, 255];
    }
    green
}

/// Copy of `input` where `region` shows the same coordinates of `input`
/// scaled by `zoom_level`. Only the pixels inside `region` are interpolated.
pub fn zoom(input: &RgbaImage, region: Region, zoom_level: f64) -> Result<RgbaImage> {
    validate_factor(zoom_level)?;
    let (w, h) = input.dimensions();
    if w == 0 || h == 0 {
        return Err(ProcessError::EmptyImage { width: w, height: h });
    }
    let (zw, zh) = target_dimensions(w, h, zoom_level)?;
    if !region.fits(w, h) || !region.fits(zw, zh) {
        return Err(ProcessError::InvalidRegion {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            bound_w: w.min(zw),
            bound_h: h.min(zh),
        });
    }

    let mut zoomed = RgbaImage::new(zw, zh);
    let mut result = input.clone();
    for y in region.y..region.y + region.height {
        for x in region.x..region.x + region.width {
            bilinear(input, &mut zoomed, x, y, zoom_level);
            result.put_pixel(x, y, *zoomed.get_pixel(x, y));
        }
    }
    Ok(result)
}
