//! Cover thumbnail generation.
//!
//! The orchestrator treats thumbnailing as an opaque awaitable
//! collaborator behind [`Thumbnailer`]. [`ImageThumbnailer`] is the
//! default implementation: decode, fit within a square bound, re-encode as
//! JPEG on the blocking pool.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;

use crate::error::CoreError;

/// Default bound for the thumbnail's longest edge, in pixels.
pub const DEFAULT_THUMBNAIL_EDGE: u32 = 320;

/// Default JPEG quality for thumbnails.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Produces a cover thumbnail from the original cover bytes.
#[async_trait]
pub trait Thumbnailer: Send + Sync {
    async fn thumbnail(&self, cover: &[u8]) -> Result<Vec<u8>, CoreError>;
}

/// [`Thumbnailer`] backed by the `image` crate.
#[derive(Debug, Clone)]
pub struct ImageThumbnailer {
    pub max_edge: u32,
    pub quality: u8,
}

impl Default for ImageThumbnailer {
    fn default() -> Self {
        Self {
            max_edge: DEFAULT_THUMBNAIL_EDGE,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ImageThumbnailer {
    /// Synchronous thumbnail generation.
    pub fn render(&self, cover: &[u8]) -> Result<Vec<u8>, CoreError> {
        let img = image::load_from_memory(cover)
            .map_err(|e| CoreError::Image(format!("Failed to decode cover: {e}")))?;
        let thumb = img.thumbnail(self.max_edge, self.max_edge).to_rgb8();
        let thumb = image::DynamicImage::ImageRgb8(thumb);

        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
        thumb
            .write_with_encoder(encoder)
            .map_err(|e| CoreError::Image(format!("Failed to encode thumbnail: {e}")))?;
        Ok(out)
    }
}

#[async_trait]
impl Thumbnailer for ImageThumbnailer {
    async fn thumbnail(&self, cover: &[u8]) -> Result<Vec<u8>, CoreError> {
        let this = self.clone();
        let cover = cover.to_vec();
        tokio::task::spawn_blocking(move || this.render(&cover))
            .await
            .map_err(|e| CoreError::Internal(format!("Thumbnail task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use image::{GenericImageView, ImageFormat, RgbImage};

    use super::*;

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 128]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn thumbnail_fits_within_bound() {
        let thumbnailer = ImageThumbnailer {
            max_edge: 64,
            ..Default::default()
        };
        let bytes = thumbnailer.thumbnail(&jpeg(200, 100)).await.unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        let (w, h) = decoded.dimensions();
        assert!(w <= 64 && h <= 64, "got {w}x{h}");
        assert_eq!(w, 64);
    }

    #[test]
    fn output_is_jpeg() {
        let bytes = ImageThumbnailer::default().render(&jpeg(200, 200)).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn garbage_input_is_an_image_error() {
        let err = ImageThumbnailer::default()
            .thumbnail(b"not an image")
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Image(_));
    }
}
