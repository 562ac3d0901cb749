//! Decoding into RGBA buffers and re-encoding in the original format.

use crate::error::{ProcessError, Result};
use image::{io::Reader as ImageReader, DynamicImage, ImageFormat, RgbaImage};
use log::info;
use std::io::Cursor;
use std::path::Path;

/// A decoded image together with the format it was stored in.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub image: RgbaImage,
    pub format: ImageFormat,
}

impl SourceImage {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let format = reader
            .format()
            .ok_or_else(|| ProcessError::UnsupportedFormat(path.display().to_string()))?;
        let image = reader.decode().map_err(ProcessError::Decode)?.to_rgba8();
        info!("Loaded {} ({:?}, {}x{})", path.display(), format, image.width(), image.height());
        Ok(Self { image, format })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let format = image::guess_format(bytes).map_err(ProcessError::Decode)?;
        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(ProcessError::Decode)?
            .to_rgba8();
        Ok(Self { image, format })
    }

    pub fn width(&self) -> u32 { self.image.width() }
    pub fn height(&self) -> u32 { self.image.height() }

    /// Encode `img` in this source's format.
    pub fn encode(&self, img: &RgbaImage) -> Result<Vec<u8>> {
        encode(img, self.format)
    }

    pub fn content_type(&self) -> &'static str { content_type(self.format) }
}

/// Encode an RGBA buffer. Formats without an alpha channel get RGB.
pub fn encode(img: &RgbaImage, format: ImageFormat) -> Result<Vec<u8>> {
    let dynamic = match format {
        ImageFormat::Jpeg | ImageFormat::Bmp => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(img.clone()).to_rgb8()),
        _ => DynamicImage::ImageRgba8(img.clone()),
    };
    let mut buf = Cursor::new(Vec::new());
    dynamic.write_to(&mut buf, format).map_err(ProcessError::Encode)?;
    Ok(buf.into_inner())
}

pub fn content_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::Bmp => "image/bmp",
        _ => "application/octet-stream",
    }
}
