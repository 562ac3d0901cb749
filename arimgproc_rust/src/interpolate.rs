//! Pixel resampling. Target pixel `(x, y)` at scale factor `f` samples the
//! source at `(x / f, y / f)`.

use crate::error::{ProcessError, Result};
use image::RgbaImage;
use log::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    #[default]
    Bilinear,
    NearestNeighbor,
}

#[inline]
fn pix_offset(img: &RgbaImage, x: u32, y: u32) -> usize {
    y as usize * img.width() as usize * 4 + x as usize * 4
}

#[inline]
fn pixel(img: &RgbaImage, x: u32, y: u32) -> [u8; 4] {
    let o = pix_offset(img, x, y);
    let p = &img.as_raw()[o..o + 4];
    [p[0], p[1], p[2], p[3]]
}

/// Largest target the resamplers will allocate, in pixels (1 GiB of RGBA).
pub const MAX_TARGET_PIXELS: u64 = 1 << 28;

/// Size of the image produced by scaling `width x height` by `factor`.
/// Fails if either side overflows `u32` or the area exceeds
/// [`MAX_TARGET_PIXELS`].
pub fn target_dimensions(width: u32, height: u32, factor: f64) -> Result<(u32, u32)> {
    let tw = (width as f64 * factor).floor();
    let th = (height as f64 * factor).floor();
    let too_large = || ProcessError::TargetTooLarge { width, height, factor };
    if tw > u32::MAX as f64 || th > u32::MAX as f64 {
        return Err(too_large());
    }
    let (tw, th) = (tw as u32, th as u32);
    match (tw as u64).checked_mul(th as u64) {
        Some(area) if area <= MAX_TARGET_PIXELS => Ok((tw, th)),
        _ => Err(too_large()),
    }
}

pub fn validate_factor(factor: f64) -> Result<()> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(ProcessError::InvalidScaleFactor(factor));
    }
    Ok(())
}

/// Fill `target[x, y]` with the bilinear blend of the four source pixels
/// around `(x / f, y / f)`. A right or bottom neighbor that falls outside the
/// source is substituted by the nearest in-bounds pixel of the same 2x2 cell
/// (top-left for the right and bottom ones). Each channel is kept within the
/// range of its four sources before truncation. Alpha is always 255.
///
/// # Panics
///
/// If `src` is empty or `(x, y)` lies outside `target`. [`resample`] checks
/// both before calling this.
pub fn bilinear(src: &RgbaImage, target: &mut RgbaImage, x: u32, y: u32, f: f64) {
    let (w, h) = src.dimensions();

    let sx = x as f64 / f;
    let xf = sx.floor();
    let dx = sx - xf;

    let sy = y as f64 / f;
    let yf = sy.floor();
    let dy = sy - yf;

    let x0 = (xf as u32).min(w - 1);
    let y0 = (yf as u32).min(h - 1);
    let right_out = x0 + 1 >= w;
    let bottom_out = y0 + 1 >= h;

    let tl = pixel(src, x0, y0);
    let tr = if right_out { tl } else { pixel(src, x0 + 1, y0) };
    let bl = if bottom_out { tl } else { pixel(src, x0, y0 + 1) };
    let br = match (right_out, bottom_out) {
        (true, true) => tl,
        (false, true) => tr,
        (true, false) => bl,
        (false, false) => pixel(src, x0 + 1, y0 + 1),
    };

    let o = pix_offset(target, x, y);
    let raw: &mut [u8] = target;
    let out = &mut raw[o..o + 4];
    for c in 0..3 {
        let top = lerp(tl[c] as f64, tr[c] as f64, dx);
        let bottom = lerp(bl[c] as f64, br[c] as f64, dx);
        let lo = tl[c].min(tr[c]).min(bl[c]).min(br[c]);
        let hi = tl[c].max(tr[c]).max(bl[c]).max(br[c]);
        // rounding can leave 254.999.. where every source is 255
        out[c] = (lerp(top, bottom, dy) as u8).clamp(lo, hi);
    }
    out[3] = 255;
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 { a + (b - a) * t }

/// Round half away from zero.
fn roundf(f: f64) -> i64 {
    if f > 0.0 { (f + 0.5) as i64 } else { (f - 0.5) as i64 }
}

/// Copy the source pixel nearest to `(x / f, y / f)` into `target[x, y]`.
/// The rounded coordinate is clamped to the last source row/column.
///
/// # Panics
///
/// If `src` is empty or `(x, y)` lies outside `target`.
pub fn nearest_neighbor(src: &RgbaImage, target: &mut RgbaImage, x: u32, y: u32, f: f64) {
    let (w, h) = src.dimensions();
    let xd = roundf(x as f64 / f).clamp(0, w as i64 - 1) as u32;
    let yd = roundf(y as f64 / f).clamp(0, h as i64 - 1) as u32;

    let p = pixel(src, xd, yd);
    let o = pix_offset(target, x, y);
    let raw: &mut [u8] = target;
    raw[o..o + 4].copy_from_slice(&p);
}

/// Scale `src` by `factor` into a freshly allocated image.
pub fn resample(src: &RgbaImage, factor: f64, method: Interpolation) -> Result<RgbaImage> {
    validate_factor(factor)?;
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return Err(ProcessError::EmptyImage { width: w, height: h });
    }
    let (tw, th) = target_dimensions(w, h, factor)?;
    if tw == 0 || th == 0 {
        return Err(ProcessError::EmptyTarget { width: w, height: h, factor });
    }
    debug!("resampling {}x{} -> {}x{} ({:?})", w, h, tw, th, method);

    let mut target = RgbaImage::new(tw, th);
    let step: fn(&RgbaImage, &mut RgbaImage, u32, u32, f64) = match method {
        Interpolation::Bilinear => bilinear,
        Interpolation::NearestNeighbor => nearest_neighbor,
    };
    for y in 0..th {
        for x in 0..tw {
            step(src, &mut target, x, y, factor);
        }
    }
    Ok(target)
}
