//! Pure Rust image backend built on the `image` crate.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify (header only) | `image::ImageReader::into_dimensions` |
//! | Decode (PNG, JPEG) | `image::load_from_memory` |
//! | Draw at target size | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless only) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` with quality |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//!
//! The `image` crate only ships a lossless WebP encoder, so WebP output
//! ignores the quality setting here even though WebP is treated as a lossy
//! target for labels and file names.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{EncodeParams, OutputFormat, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a full image from memory.
fn decode(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    image::load_from_memory(bytes).map_err(|e| BackendError::Decode(e.to_string()))
}

/// Draw the decoded image onto a surface of exactly `width` × `height`.
fn draw(img: DynamicImage, width: u32, height: u32) -> DynamicImage {
    if img.width() == width && img.height() == height {
        img
    } else {
        img.resize_exact(width, height, FilterType::Lanczos3)
    }
}

/// Encode a surface into an in-memory buffer.
fn encode(
    img: &DynamicImage,
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let result = match format {
        OutputFormat::WebP => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(&mut buf)),
        // JPEG has no alpha channel and rejects quality 0
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(
            JpegEncoder::new_with_quality(&mut buf, quality.value().max(1)),
        ),
        OutputFormat::Png => img.write_with_encoder(PngEncoder::new(&mut buf)),
    };
    result.map_err(|e| BackendError::Encode(format!("{format} encode failed: {e}")))?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| BackendError::Decode(format!("Failed to read dimensions: {e}")))?;
        Ok(Dimensions { width, height })
    }

    fn convert(&self, params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
        let img = decode(&params.source)?;
        let surface = draw(img, params.width, params.height);
        encode(&surface, params.format, params.quality)
    }
}
