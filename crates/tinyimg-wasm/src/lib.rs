//! Tinyimg WASM - WebAssembly bindings for the tinyimg conversion bridge
//!
//! This crate exposes the tinyimg-core conversion bridge to
//! JavaScript/TypeScript applications. One bridge instance backs the whole
//! module; all exported functions operate on it.
//!
//! # Module Structure
//!
//! - `memory` - Allocation-table bindings (allocate, release, read/write, raw views)
//! - `stream` - Chunked-conversion bindings (start/append/finish)
//! - `convert` - Single-shot conversion bindings
//! - `types` - WASM-compatible wrapper for the conversion result record
//!
//! # Usage
//!
//! ```typescript
//! import init, { allocate, write, convert_direct, read, release } from '@tinyimg/wasm';
//!
//! // Initialize WASM module (must call first)
//! await init();
//!
//! // Single-shot: fill a buffer, convert, read the JPEG back
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! const input = allocate(bytes.length);
//! write(input, 0, bytes);
//! const result = convert_direct(input, bytes.length);
//! if (result.status === 0) {
//!   const jpeg = read(result.handle);
//!   release(result.handle);
//! }
//! release(input);
//! ```

use std::sync::OnceLock;

use tinyimg_core::Bridge;
use wasm_bindgen::prelude::*;

mod convert;
mod memory;
mod stream;
mod types;

// Re-export public surface
pub use convert::{convert_bytes, convert_direct};
pub use memory::{allocate, buffer_len, buffer_ptr, buffer_view, read, release, write};
pub use stream::{append_chunk, append_chunk_from, finish_cycle, start_cycle};
pub use types::JsConvertResult;

/// The module-wide bridge instance behind every exported operation.
pub(crate) fn bridge() -> &'static Bridge {
    static BRIDGE: OnceLock<Bridge> = OnceLock::new();
    BRIDGE.get_or_init(Bridge::new)
}

/// Console diagnostic for host misuse that is reported but not escalated.
pub(crate) fn console_warn(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::warn_1(&message.into());
    #[cfg(not(target_arch = "wasm32"))]
    eprintln!("{message}");
}

/// Initialize the WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::log_1(&"tinyimg wasm module initialized".into());
}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Snapshot of bridge state as a plain JS object: live allocation count and
/// bytes, pending chunk count and bytes, and the converting flag.
#[wasm_bindgen]
pub fn stats() -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&bridge().stats()).map_err(|e| JsValue::from_str(&e.to_string()))
}
