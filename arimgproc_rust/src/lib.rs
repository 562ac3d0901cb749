//! Image processing core: color-vector k-means segmentation, bilinear and
//! nearest-neighbor resampling, region-boundary highlighting and a few
//! pointwise colorspace filters.

pub mod boundary;
pub mod colconv;
pub mod error;
pub mod exam;
pub mod interpolate;
pub mod kmeans;
pub mod source;
pub mod vector;

pub use boundary::{highlight_boundaries, RED};
pub use error::{ProcessError, Result};
pub use exam::Region;
pub use interpolate::{resample, Interpolation};
pub use kmeans::{cluster_image, default_config, ClusterConfig, Clustering, EmptyClusterPolicy, KMeans, Termination};
pub use source::SourceImage;
pub use vector::{ColorVector, PositionedVector};

use image::RgbaImage;
use log::info;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct SegmentParams {
    pub config: ClusterConfig,
    /// Bilinear scale factor applied before clustering to bound its cost.
    pub prescale: Option<f64>,
    /// Paint region boundaries in this color.
    pub highlight: Option<[u8; 3]>,
}

impl SegmentParams {
    pub fn new(k: usize) -> Self {
        Self { config: default_config(k), prescale: None, highlight: None }
    }
}

#[derive(Debug, Clone)]
pub struct Segmentation {
    pub image: RgbaImage,
    pub clustering: Clustering,
}

/// Optionally shrink `img`, cluster its colors, paint each pixel with its
/// centroid and optionally mark region boundaries. The output has the size
/// of the (possibly shrunk) clustering input.
pub fn segment(img: &RgbaImage, params: &SegmentParams) -> Result<Segmentation> {
    let t = Instant::now();
    let scaled;
    let input = match params.prescale {
        Some(f) => {
            scaled = resample(img, f, Interpolation::Bilinear)?;
            &scaled
        }
        None => img,
    };

    let clustering = cluster_image(input, params.config.clone())?;
    let painted = clustering.paint();
    let image = match params.highlight {
        Some(color) => clustering.highlight_boundaries(&painted, color),
        None => painted,
    };
    info!(
        "Segmented {}x{} into {} clusters ({:?}) in {:?}",
        input.width(),
        input.height(),
        params.config.k,
        clustering.termination(),
        t.elapsed()
    );
    Ok(Segmentation { image, clustering })
}
