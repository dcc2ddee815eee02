//! Allocation-table WASM bindings.
//!
//! The host obtains writable buffers by handle, fills them through the raw
//! pointer/view or the copying accessors, and reads conversion results back
//! through the same mechanism. The bridge is the sole arbiter of buffer
//! lifetime: a handle is valid from `allocate` until `release`, and a stale
//! handle is rejected by every operation rather than aliasing freed memory.
//!
//! # Example
//!
//! ```typescript
//! import { allocate, buffer_ptr, read, release } from '@tinyimg/wasm';
//!
//! const handle = allocate(bytes.length);
//! // Zero-copy fill through linear memory:
//! const ptr = buffer_ptr(handle);
//! new Uint8Array(wasmMemory.buffer, ptr, bytes.length).set(bytes);
//! // ... convert ...
//! release(handle);
//! ```

use tinyimg_core::Handle;
use wasm_bindgen::prelude::*;

use crate::{bridge, console_warn};

/// Allocate a zero-initialized buffer of `size` bytes.
///
/// Returns the buffer's handle. `size` of zero is valid and yields an empty
/// readable region.
///
/// # Errors
///
/// Throws if memory or handle space is exhausted; the caller can release
/// other handles and retry.
#[wasm_bindgen]
pub fn allocate(size: u32) -> Result<u32, JsValue> {
    bridge()
        .allocate(size as usize)
        .map(Handle::to_raw)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Release a buffer, ending its handle's validity.
///
/// Releasing an unknown or already-released handle is a caller bug; it is
/// logged to the console so double-frees stay visible, and the table is
/// left unchanged.
#[wasm_bindgen]
pub fn release(handle: u32) {
    if let Err(err) = bridge().release(Handle::from_raw(handle)) {
        console_warn(&format!("release: {err}"));
    }
}

/// Raw pointer into linear memory for the buffer behind `handle`.
///
/// The pointer stays valid until the handle is released; buffers are never
/// grown or moved after creation. For a zero-length allocation the pointer
/// must not be dereferenced.
#[wasm_bindgen]
pub fn buffer_ptr(handle: u32) -> Result<*mut u8, JsValue> {
    bridge()
        .buffer_ptr(Handle::from_raw(handle))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Size in bytes of the buffer behind `handle`.
#[wasm_bindgen]
pub fn buffer_len(handle: u32) -> Result<u32, JsValue> {
    bridge()
        .buffer_len(Handle::from_raw(handle))
        .map(|len| len as u32)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Zero-copy `Uint8Array` view over the buffer behind `handle`.
///
/// The view aliases WASM linear memory directly: it is invalidated by
/// releasing the handle and by anything that grows the module's memory.
/// Prefer `read`/`write` unless the extra copy is the bottleneck.
#[wasm_bindgen]
pub fn buffer_view(handle: u32) -> Result<js_sys::Uint8Array, JsValue> {
    let bridge = bridge();
    let handle = Handle::from_raw(handle);
    let ptr = bridge
        .buffer_ptr(handle)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    let len = bridge
        .buffer_len(handle)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    // SAFETY: the buffer is owned by the table and neither moved nor
    // resized until release; the view's documented lifetime matches that.
    let slice = unsafe { std::slice::from_raw_parts(ptr, len) };
    Ok(unsafe { js_sys::Uint8Array::view(slice) })
}

/// Copy `bytes` into the buffer at `offset`.
///
/// # Errors
///
/// Throws on an unknown handle or a write that would land outside the
/// allocation.
#[wasm_bindgen]
pub fn write(handle: u32, offset: u32, bytes: &[u8]) -> Result<(), JsValue> {
    bridge()
        .write(Handle::from_raw(handle), offset as usize, bytes)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Copy the buffer's current bytes out as a `Uint8Array`.
#[wasm_bindgen]
pub fn read(handle: u32) -> Result<Vec<u8>, JsValue> {
    bridge()
        .read(Handle::from_raw(handle))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}


/// WASM-specific tests that require JsValue.
///
/// Use `wasm-pack test` to run these.
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_read_unknown_handle_throws() {
        assert!(read(0xDEAD_BEEF).is_err());
    }

    #[wasm_bindgen_test]
    fn test_write_out_of_bounds_throws() {
        let handle = allocate(2).unwrap();
        assert!(write(handle, 1, &[1, 2]).is_err());
        release(handle);
    }

    #[wasm_bindgen_test]
    fn test_stale_handle_after_release_throws() {
        let handle = allocate(2).unwrap();
        release(handle);
        assert!(read(handle).is_err());
        assert!(buffer_ptr(handle).is_err());
        assert!(buffer_view(handle).is_err());
    }

    #[wasm_bindgen_test]
    fn test_buffer_view_reflects_writes() {
        let handle = allocate(4).unwrap();
        write(handle, 0, &[1, 2, 3, 4]).unwrap();

        let view = buffer_view(handle).unwrap();
        assert_eq!(view.length(), 4);
        assert_eq!(view.to_vec(), vec![1, 2, 3, 4]);
        release(handle);
    }
}
