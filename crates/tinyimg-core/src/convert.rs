//! Conversion pipeline: one complete input buffer in, one published JPEG out.
//!
//! The pipeline decodes the input with the codec collaborator, encodes the
//! result as JPEG at the fixed pipeline quality, and publishes the encoded
//! bytes through the allocation table. The outcome is reported as a
//! fixed-layout [`ConvertResult`] record so hosts on the far side of the
//! memory boundary can read it without any marshalling layer.

use serde::Serialize;
use thiserror::Error;

use crate::alloc::AllocTable;
use crate::decode::{self, DecodeError};
use crate::encode::{self, EncodeError, JPEG_QUALITY};

/// Status codes carried in [`ConvertResult::status`].
///
/// `OK` is zero; every failure is a distinct negative value, so hosts can
/// branch on sign first and kind second.
pub mod status {
    /// Conversion succeeded; `handle` and `size` are valid.
    pub const OK: i32 = 0;
    /// The input could not be decoded.
    pub const DECODE_FAILED: i32 = -1;
    /// The decoded image could not be encoded as JPEG.
    pub const ENCODE_FAILED: i32 = -2;
    /// A conversion is already in flight (single-flight rejection).
    pub const BUSY: i32 = -3;
    /// Publishing the result failed (allocation exhaustion or an output
    /// too large for the record's size field).
    pub const ALLOC_FAILED: i32 = -4;
}

/// A failed decode or encode step.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl ConvertError {
    /// The status code this failure maps to in a [`ConvertResult`].
    pub fn status(&self) -> i32 {
        match self {
            ConvertError::Decode(_) => status::DECODE_FAILED,
            ConvertError::Encode(_) => status::ENCODE_FAILED,
        }
    }
}

/// Boundary-safe conversion outcome.
///
/// Layout is part of the contract for hosts that read the record straight
/// out of linear memory: `#[repr(C)]`, 12 bytes, no padding. `handle` sits
/// at offset 0, `size` at 4, `status` at 8, little-endian on wasm32.
///
/// `handle` and `size` are meaningful only when `status == 0`; on failure
/// both are zero and no allocation is left behind.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConvertResult {
    /// Handle of the published JPEG buffer (raw form).
    pub handle: u32,
    /// Size of the published JPEG in bytes.
    pub size: i32,
    /// [`status`] code; zero on success, negative on failure.
    pub status: i32,
}

impl ConvertResult {
    /// A failure record carrying only a status code.
    pub fn failure(status: i32) -> Self {
        Self {
            handle: 0,
            size: 0,
            status,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == status::OK
    }
}

/// Decode `input` and re-encode it as JPEG, without touching any table.
///
/// This is the codec half of the pipeline, shared by the publishing path
/// and the one-shot bytes-in/bytes-out path.
pub fn transcode(input: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let image = decode::decode_image(input)?;
    let jpeg = encode::encode_jpeg(&image, JPEG_QUALITY)?;
    Ok(jpeg)
}

/// Run the full pipeline against `table`: transcode `input` and publish the
/// JPEG under a fresh handle.
///
/// Every failure path returns a pure-status record and leaves no allocation
/// behind.
pub fn convert(table: &mut AllocTable, input: &[u8]) -> ConvertResult {
    let jpeg = match transcode(input) {
        Ok(jpeg) => jpeg,
        Err(err) => return ConvertResult::failure(err.status()),
    };

    publish(table, jpeg)
}

/// Publish already-encoded JPEG bytes under a fresh handle.
pub(crate) fn publish(table: &mut AllocTable, jpeg: Vec<u8>) -> ConvertResult {
    let Ok(size) = i32::try_from(jpeg.len()) else {
        return ConvertResult::failure(status::ALLOC_FAILED);
    };

    match table.adopt(jpeg) {
        Ok(handle) => ConvertResult {
            handle: handle.to_raw(),
            size,
            status: status::OK,
        },
        Err(_) => ConvertResult::failure(status::ALLOC_FAILED),
    }
}
