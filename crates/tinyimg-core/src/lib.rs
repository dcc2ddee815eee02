//! Tinyimg Core - Conversion bridge library
//!
//! This crate implements the memory bridge behind tinyimg's image
//! conversion: a handle-keyed allocation table hosts write into across the
//! WASM boundary, a chunk accumulator that assembles streamed fragments
//! into one input, and a single-flight conversion pipeline that decodes any
//! recognized source format and publishes the result as JPEG.
//!
//! Everything hangs off an explicit [`Bridge`] context owned by the caller;
//! there is no ambient global state, so a process can run any number of
//! independent bridges and tests exercise the real thing directly.

pub mod alloc;
pub mod bridge;
pub mod chunks;
pub mod convert;
pub mod decode;
pub mod encode;

pub use alloc::{AllocError, AllocTable, Handle};
pub use bridge::{Bridge, BridgeStats};
pub use chunks::{ChunkAccumulator, ChunkError, ConvertGuard};
pub use convert::{status, transcode, ConvertError, ConvertResult};
pub use decode::{decode_image, DecodeError};
pub use encode::{encode_jpeg, EncodeError, JPEG_QUALITY};
