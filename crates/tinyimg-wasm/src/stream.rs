//! Chunked-conversion WASM bindings.
//!
//! Hosts streaming a large file push it in fragments instead of staging one
//! giant buffer: `start_cycle`, any number of `append_chunk` calls, then
//! `finish_cycle`. Fragments are reassembled in append order, byte for
//! byte. At most one conversion runs at a time; an overlapping
//! `finish_cycle` is rejected with a busy status, never queued.
//!
//! # Example
//!
//! ```typescript
//! import { start_cycle, append_chunk, finish_cycle, read, release } from '@tinyimg/wasm';
//!
//! start_cycle();
//! for await (const chunk of file.stream()) {
//!   append_chunk(chunk);
//! }
//! const result = finish_cycle();
//! if (result.status === 0) {
//!   const jpeg = read(result.handle);
//!   release(result.handle);
//! }
//! ```

use tinyimg_core::Handle;
use wasm_bindgen::prelude::*;

use crate::bridge;
use crate::types::JsConvertResult;

/// Begin a new chunked-conversion cycle.
///
/// Discards any chunks left over from a prior unfinished cycle. Calling
/// this while a conversion is still running does not wait for it; the
/// running conversion keeps the input it already took.
#[wasm_bindgen]
pub fn start_cycle() {
    bridge().start_cycle();
}

/// Append one fragment of the input, in order.
#[wasm_bindgen]
pub fn append_chunk(bytes: &[u8]) {
    bridge().append_chunk(bytes.to_vec());
}

/// Append a fragment from an allocation the host filled, consuming it.
///
/// The allocation's bytes become the next chunk and its handle is released
/// in the same step.
///
/// # Errors
///
/// Throws if the handle cannot be resolved (stale or never issued); the
/// pending sequence is left unchanged.
#[wasm_bindgen]
pub fn append_chunk_from(handle: u32) -> Result<(), JsValue> {
    bridge()
        .append_chunk_from(Handle::from_raw(handle))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Concatenate all appended chunks in order and convert them.
///
/// Returns the result record: on success its `handle` names the published
/// JPEG, which the host reads with `read` and must eventually `release`.
/// Returns status -3 (busy) if a conversion is already in flight, leaving
/// the pending chunks untouched; any other outcome consumes them.
#[wasm_bindgen]
pub fn finish_cycle() -> JsConvertResult {
    JsConvertResult::from_result(bridge().finish_cycle())
}

/// Tests for the streaming bindings.
///
/// These drive the module-wide bridge, so the whole protocol lives in one
/// sequential test per scenario; the accumulator is shared state.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{read, release};
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn tiff_fixture() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, image::Rgb([40, 80, 120])));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageFormat::Tiff).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_streaming_end_to_end() {
        let input = tiff_fixture();

        // Stale chunk from an abandoned cycle, discarded by the restart
        start_cycle();
        append_chunk(b"abandoned");

        start_cycle();
        for chunk in input.chunks(5) {
            append_chunk(chunk);
        }
        let result = finish_cycle();

        assert_eq!(result.status(), 0);
        assert!(result.size() > 0);
        let jpeg = read(result.handle()).unwrap();
        assert_eq!(jpeg.len(), result.size() as usize);
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
        release(result.handle());

        // Failed cycle leaves the accumulator clean for the next one
        start_cycle();
        append_chunk(b"not an image");
        assert_eq!(finish_cycle().status(), -1);

        start_cycle();
        append_chunk(&input);
        let retry = finish_cycle();
        assert_eq!(retry.status(), 0);
        release(retry.handle());
    }
}
