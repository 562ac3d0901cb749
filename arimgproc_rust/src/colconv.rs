//! Pointwise RGB <-> YUV and RGB -> gray conversions.

use image::RgbaImage;

const R_CONST: f32 = 0.299;
const G_CONST: f32 = 0.587;
const B_CONST: f32 = 0.114;
const U_MAX: f32 = 0.436;
const V_MAX: f32 = 0.615;

fn clamp_abs(f: f32, limit: f32) -> f32 {
    let limit = limit.abs();
    f.clamp(-limit, limit)
}

/// Convert an RGB color to YUV. Luma is clamped to `[-1, 1]`, U to
/// `±0.436` and V to `±0.615`.
pub fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let rf = r as f32 / 255.0;
    let gf = g as f32 / 255.0;
    let bf = b as f32 / 255.0;

    let y = clamp_abs(R_CONST * rf + G_CONST * gf + B_CONST * bf, 1.0);
    let u = clamp_abs(0.492 * (bf - y), U_MAX);
    let v = clamp_abs(0.877 * (rf - y), V_MAX);
    (y, u, v)
}

/// Convert YUV back to RGB. Channels are truncated and saturate at the byte
/// range.
pub fn yuv_to_rgb(y: f32, u: f32, v: f32) -> (u8, u8, u8) {
    let r = (y + 1.14 * v) * 255.0;
    let g = (y - 0.395 * u - 0.581 * v) * 255.0;
    let b = (y + 2.033 * u) * 255.0;
    (r as u8, g as u8, b as u8)
}

/// BT.601 luma of an RGB color, truncated to a byte.
pub fn rgb_to_gray(r: u8, g: u8, b: u8) -> u8 {
    let (y, _, _) = rgb_to_yuv(r, g, b);
    (y * 255.0) as u8
}

fn map_pixels(src: &RgbaImage, f: impl Fn(u8, u8, u8) -> [u8; 3]) -> RgbaImage {
    let mut out = RgbaImage::new(src.width(), src.height());
    for (dst, p) in out.pixels_mut().zip(src.pixels()) {
        let [r, g, b] = f(p[0], p[1], p[2]);
        dst.0 = [r, g, b, 255];
    }
    out
}

pub fn grayscale(src: &RgbaImage) -> RgbaImage {
    map_pixels(src, |r, g, b| {
        let l = rgb_to_gray(r, g, b);
        [l, l, l]
    })
}

/// Every pixel pushed through YUV and back, exposing the clamping and
/// truncation of the two conversions.
pub fn yuv_round_trip(src: &RgbaImage) -> RgbaImage {
    map_pixels(src, |r, g, b| {
        let (y, u, v) = rgb_to_yuv(r, g, b);
        let (r, g, b) = yuv_to_rgb(y, u, v);
        [r, g, b]
    })
}
