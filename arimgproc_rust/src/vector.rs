//! Normalized RGB color vectors and the per-pixel records clustered by
//! [`crate::kmeans`].

/// An RGB color with each channel scaled into `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ColorVector {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl ColorVector {
    pub const fn new(r: f64, g: f64, b: f64) -> Self { Self { r, g, b } }

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r: r as f64 / 255.0, g: g as f64 / 255.0, b: b as f64 / 255.0 }
    }

    /// Back to bytes. Channels are truncated, not rounded.
    pub fn to_rgb(self) -> [u8; 3] {
        [(self.r * 255.0) as u8, (self.g * 255.0) as u8, (self.b * 255.0) as u8]
    }

    pub fn add(self, o: Self) -> Self { Self { r: self.r + o.r, g: self.g + o.g, b: self.b + o.b } }
    pub fn scale(self, s: f64) -> Self { Self { r: self.r * s, g: self.g * s, b: self.b * s } }

    #[inline]
    pub fn squared_distance(self, o: Self) -> f64 {
        let dr = self.r - o.r;
        let dg = self.g - o.g;
        let db = self.b - o.b;
        dr.mul_add(dr, dg.mul_add(dg, db * db))
    }

    pub fn distance(self, o: Self) -> f64 { self.squared_distance(o).sqrt() }
}

pub fn to_vector(r: u8, g: u8, b: u8) -> ColorVector { ColorVector::from_rgb(r, g, b) }
pub fn to_color(v: ColorVector) -> [u8; 3] { v.to_rgb() }
pub fn distance(a: ColorVector, b: ColorVector) -> f64 { a.distance(b) }
pub fn sum(a: ColorVector, b: ColorVector) -> ColorVector { a.add(b) }
pub fn scale(v: ColorVector, s: f64) -> ColorVector { v.scale(s) }

/// One source pixel: its color, where it sits, and which cluster currently
/// owns it (`None` until the first assignment step).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionedVector {
    pub vector: ColorVector,
    pub x: u32,
    pub y: u32,
    pub cluster: Option<usize>,
}

impl PositionedVector {
    pub fn new(vector: ColorVector, x: u32, y: u32) -> Self { Self { vector, x, y, cluster: None } }
}
