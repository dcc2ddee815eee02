//! Source-format decoding.
//!
//! The bridge treats the codec as a black box: given well-formed bytes in
//! any enabled source format (TIFF, PNG, JPEG), produce a decoded image or
//! fail. Format detection is sniffed from the bytes themselves, never from
//! a file name.

use std::io::Cursor;

use image::{DynamicImage, ImageReader};
use thiserror::Error;

/// Errors that can occur while decoding the source image.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes do not start with any recognized image signature.
    #[error("unrecognized image format")]
    UnknownFormat,

    /// The format was recognized but the data could not be decoded.
    #[error("corrupted or truncated image: {0}")]
    Corrupted(String),
}

/// Decode an image from bytes, guessing the format from its signature.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::Corrupted(e.to_string()))?;

    if reader.format().is_none() {
        return Err(DecodeError::UnknownFormat);
    }

    reader
        .decode()
        .map_err(|e| DecodeError::Corrupted(e.to_string()))
}
