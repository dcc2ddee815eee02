//! WASM-compatible wrapper for the conversion result record.

use tinyimg_core::ConvertResult;
use wasm_bindgen::prelude::*;

/// Conversion outcome exposed to JavaScript.
///
/// Wraps the core result record: `status === 0` means success and `handle`
/// names the published JPEG buffer of `size` bytes, readable via `read` and
/// owned by the host until `release`. On failure `status` is negative
/// (-1 decode failed, -2 encode failed, -3 conversion already in flight,
/// -4 publishing failed) and `handle`/`size` are zero.
#[wasm_bindgen]
pub struct JsConvertResult {
    inner: ConvertResult,
}

#[wasm_bindgen]
impl JsConvertResult {
    /// Handle of the published JPEG buffer (meaningful only on success)
    #[wasm_bindgen(getter)]
    pub fn handle(&self) -> u32 {
        self.inner.handle
    }

    /// Size of the published JPEG in bytes
    #[wasm_bindgen(getter)]
    pub fn size(&self) -> i32 {
        self.inner.size
    }

    /// Status code: zero on success, negative on failure
    #[wasm_bindgen(getter)]
    pub fn status(&self) -> i32 {
        self.inner.status
    }

    /// Whether the conversion succeeded
    pub fn is_ok(&self) -> bool {
        self.inner.is_ok()
    }
}

impl JsConvertResult {
    pub(crate) fn from_result(result: ConvertResult) -> Self {
        Self { inner: result }
    }
}
