//! Region-boundary highlighting over a finished [`Clustering`].

use crate::kmeans::Clustering;
use image::RgbaImage;

pub const RED: [u8; 3] = [255, 0, 0];

/// Offsets of the four axis neighbors: north, south, west, east.
const NEIGHBORS: [(i64, i64); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

/// True if any axis neighbor of `(x, y)` belongs to another cluster.
/// Neighbor coordinates are clamped into the image, so an edge pixel
/// compares against itself on the outward side.
pub fn is_boundary(clustering: &Clustering, x: u32, y: u32) -> bool {
    let max_x = clustering.width() as i64 - 1;
    let max_y = clustering.height() as i64 - 1;
    let own = clustering.cluster_at(x, y);
    NEIGHBORS.iter().any(|&(dx, dy)| {
        let nx = (x as i64 + dx).clamp(0, max_x) as u32;
        let ny = (y as i64 + dy).clamp(0, max_y) as u32;
        clustering.cluster_at(nx, ny) != own
    })
}

/// Copy of `canvas` with every boundary pixel overwritten by `color` at full
/// opacity. Boundaries come from the cluster ids, never from `canvas`, so
/// running this again on its own output marks nothing new.
pub fn highlight_boundaries(clustering: &Clustering, canvas: &RgbaImage, color: [u8; 3]) -> RgbaImage {
    debug_assert_eq!(canvas.dimensions(), (clustering.width(), clustering.height()));
    let [r, g, b] = color;
    let mut out = canvas.clone();
    for (x, y, px) in out.enumerate_pixels_mut() {
        if is_boundary(clustering, x, y) {
            px.0 = [r, g, b, 255];
        }
    }
    out
}

impl Clustering {
    /// [`highlight_boundaries`] on this clustering.
    pub fn highlight_boundaries(&self, canvas: &RgbaImage, color: [u8; 3]) -> RgbaImage {
        highlight_boundaries(self, canvas, color)
    }
}
