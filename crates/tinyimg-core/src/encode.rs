//! JPEG encoding for the conversion output.
//!
//! This module provides JPEG encoding using the `image` crate's JPEG
//! encoder. The pipeline always encodes at [`JPEG_QUALITY`]; quality tuning
//! is not a host-facing knob.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use thiserror::Error;

/// Fixed quality used by the conversion pipeline.
pub const JPEG_QUALITY: u8 = 90;

/// Errors that can occur during JPEG encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// JPEG encoding failed
    #[error("JPEG encoding failed: {0}")]
    EncodingFailed(String),
}

/// Encode a decoded image as JPEG.
///
/// The image is flattened to RGB8 first; alpha and higher bit depths from
/// the source format are discarded. Quality is clamped to 1-100.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let quality = quality.clamp(1, 100);
    let rgb = image.to_rgb8();

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;

    Ok(buffer.into_inner())
}
