//! Single-shot conversion WASM bindings.
//!
//! Two non-chunked paths: `convert_direct` runs against an allocation the
//! host already filled through the memory bindings, publishing the JPEG
//! behind a fresh handle; `convert_bytes` is the one-call convenience form
//! that never touches the allocation table.

use tinyimg_core::Handle;
use wasm_bindgen::prelude::*;

use crate::bridge;
use crate::types::JsConvertResult;

/// Convert the first `size` bytes of a host-filled allocation.
///
/// The input allocation stays alive; the host releases it when done. On
/// success the returned record's `handle` names the published JPEG buffer.
///
/// # Errors
///
/// Throws on an unknown handle or a `size` beyond the allocation. These are
/// caller errors, distinct from conversion failures, which are reported
/// through the record's `status`.
#[wasm_bindgen]
pub fn convert_direct(handle: u32, size: u32) -> Result<JsConvertResult, JsValue> {
    bridge()
        .convert_direct(Handle::from_raw(handle), size as usize)
        .map(JsConvertResult::from_result)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// One-call conversion: source bytes in, JPEG bytes out.
///
/// Nothing is registered in the allocation table; the result crosses the
/// boundary as a plain `Uint8Array`.
///
/// # Errors
///
/// Throws if the input cannot be decoded or the JPEG cannot be encoded.
#[wasm_bindgen]
pub fn convert_bytes(bytes: &[u8]) -> Result<Vec<u8>, JsValue> {
    tinyimg_core::transcode(bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}


/// WASM-specific tests that require JsValue.
///
/// Use `wasm-pack test` to run these.
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use crate::memory::allocate;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_convert_direct_unknown_handle_throws() {
        assert!(convert_direct(0xDEAD_BEEF, 1).is_err());
    }

    #[wasm_bindgen_test]
    fn test_convert_direct_oversized_size_throws() {
        let handle = allocate(4).unwrap();
        assert!(convert_direct(handle, 5).is_err());
    }

    #[wasm_bindgen_test]
    fn test_convert_bytes_garbage_throws() {
        assert!(convert_bytes(&[0, 1, 2, 3]).is_err());
    }

    #[wasm_bindgen_test]
    fn test_stats_is_a_js_object() {
        let stats = crate::stats().unwrap();
        assert!(stats.is_object());
    }
}
