use thiserror::Error;

pub type Result<T, E = ProcessError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("cluster count {k} must be between 1 and the pixel count ({pixels})")]
    InvalidClusterCount { k: usize, pixels: usize },

    #[error("scale factor must be positive and finite, got {0}")]
    InvalidScaleFactor(f64),

    #[error("image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("scaling {width}x{height} by {factor} yields an empty image")]
    EmptyTarget { width: u32, height: u32, factor: f64 },

    #[error("scaling {width}x{height} by {factor} yields an image too large to allocate")]
    TargetTooLarge { width: u32, height: u32, factor: f64 },

    #[error("region {x},{y} {width}x{height} does not fit in a {bound_w}x{bound_h} image")]
    InvalidRegion {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        bound_w: u32,
        bound_h: u32,
    },

    #[error("clustering worker panicked")]
    WorkerPanicked,

    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    /// True for errors caused by caller-supplied parameters rather than by
    /// the image data or the codec.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidClusterCount { .. }
                | Self::InvalidScaleFactor(_)
                | Self::EmptyImage { .. }
                | Self::EmptyTarget { .. }
                | Self::TargetTooLarge { .. }
                | Self::InvalidRegion { .. }
        )
    }
}
