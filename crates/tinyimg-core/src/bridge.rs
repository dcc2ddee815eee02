//! The bridge context: one independent conversion session.
//!
//! All state a host can touch hangs off a [`Bridge`]: the allocation table,
//! the chunk accumulator, and the single-flight gate. Callers own the
//! instance and pass it by reference into every operation, so a process can
//! run any number of independent bridges and tests never need reset hooks.
//!
//! Operations take `&self`; mutation is serialized internally by a mutex
//! over the table and by the accumulator's own lock and flag, as two
//! independent critical sections. The conversion itself runs while holding
//! only the single-flight gate, so buffer traffic and next-cycle appends
//! proceed during a long decode.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::alloc::{AllocError, AllocTable, Handle};
use crate::chunks::{ChunkAccumulator, ChunkError};
use crate::convert::{self, status, ConvertResult};

/// Snapshot of a bridge's live state, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    /// Number of live allocations in the table.
    pub live_allocations: usize,
    /// Total bytes across live allocations.
    pub live_bytes: usize,
    /// Number of fragments waiting in the accumulator.
    pub pending_chunks: usize,
    /// Total bytes waiting in the accumulator.
    pub pending_bytes: usize,
    /// Whether a conversion currently holds the single-flight gate.
    pub converting: bool,
}

/// One independent conversion bridge.
#[derive(Default)]
pub struct Bridge {
    table: Mutex<AllocTable>,
    accumulator: ChunkAccumulator,
}

impl Bridge {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_table(&self) -> MutexGuard<'_, AllocTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---- allocation surface -------------------------------------------------

    /// Create a zero-initialized host-writable buffer of `size` bytes.
    pub fn allocate(&self, size: usize) -> Result<Handle, AllocError> {
        self.lock_table().allocate(size)
    }

    /// Release a buffer. Double-release and stale handles are reported, not
    /// absorbed.
    pub fn release(&self, handle: Handle) -> Result<(), AllocError> {
        self.lock_table().release(handle)
    }

    /// Copy the buffer's current bytes out.
    pub fn read(&self, handle: Handle) -> Result<Vec<u8>, AllocError> {
        self.lock_table().get(handle).map(<[u8]>::to_vec)
    }

    /// Copy `bytes` into the buffer at `offset`, bounds-checked.
    pub fn write(&self, handle: Handle, offset: usize, bytes: &[u8]) -> Result<(), AllocError> {
        self.lock_table().write(handle, offset, bytes)
    }

    /// Size in bytes of the allocation behind `handle`.
    pub fn buffer_len(&self, handle: Handle) -> Result<usize, AllocError> {
        self.lock_table().len(handle)
    }

    /// Raw pointer to the buffer's storage, for hosts that write through
    /// linear memory directly.
    ///
    /// The pointer stays valid until the handle is released: buffers are
    /// never grown or moved after creation. For a zero-length allocation the
    /// pointer is dangling and must not be dereferenced.
    pub fn buffer_ptr(&self, handle: Handle) -> Result<*mut u8, AllocError> {
        self.lock_table().get_mut(handle).map(<[u8]>::as_mut_ptr)
    }

    // ---- streaming surface --------------------------------------------------

    /// Begin (or reset) a chunked-conversion cycle.
    pub fn start_cycle(&self) {
        self.accumulator.start();
    }

    /// Append one raw-bytes fragment to the current cycle.
    pub fn append_chunk(&self, bytes: Vec<u8>) {
        self.accumulator.append(bytes);
    }

    /// Append a fragment by handle reference, consuming the allocation.
    ///
    /// The wire form here is a handle the host previously filled; a stale or
    /// unknown handle means the payload cannot be materialized and yields
    /// [`ChunkError::InvalidChunk`] with the accumulator unchanged.
    pub fn append_chunk_from(&self, handle: Handle) -> Result<(), ChunkError> {
        let bytes = self
            .lock_table()
            .take(handle)
            .map_err(|_| ChunkError::InvalidChunk)?;
        self.accumulator.append(bytes);
        Ok(())
    }

    /// Concatenate the accumulated chunks and convert them.
    ///
    /// Fails fast with a `BUSY` record if a conversion is already in flight,
    /// leaving the pending sequence untouched. Otherwise the pending chunks
    /// are consumed whatever the outcome, and the gate is released on every
    /// exit path.
    pub fn finish_cycle(&self) -> ConvertResult {
        let Ok(_guard) = self.accumulator.begin_convert() else {
            return ConvertResult::failure(status::BUSY);
        };

        let input = self.accumulator.take_pending();

        // The codec runs with only the gate held; allocation traffic and
        // appends for a newly started cycle are not blocked behind it.
        let jpeg = match convert::transcode(&input) {
            Ok(jpeg) => jpeg,
            Err(err) => return ConvertResult::failure(err.status()),
        };
        convert::publish(&mut self.lock_table(), jpeg)
    }

    // ---- single-shot surface ------------------------------------------------

    /// Convert the first `size` bytes of a host-filled allocation.
    ///
    /// The input allocation is left alive; the host releases it when done.
    /// A bad handle or a `size` beyond the allocation is a caller error,
    /// reported as such rather than as a conversion status.
    pub fn convert_direct(&self, handle: Handle, size: usize) -> Result<ConvertResult, AllocError> {
        let input = {
            let table = self.lock_table();
            let bytes = table.get(handle)?;
            let capacity = bytes.len();
            bytes
                .get(..size)
                .map(<[u8]>::to_vec)
                .ok_or(AllocError::OutOfBounds {
                    offset: 0,
                    len: size,
                    capacity,
                })?
        };

        let jpeg = match convert::transcode(&input) {
            Ok(jpeg) => jpeg,
            Err(err) => return Ok(ConvertResult::failure(err.status())),
        };
        Ok(convert::publish(&mut self.lock_table(), jpeg))
    }

    // ---- diagnostics --------------------------------------------------------

    /// Snapshot the bridge's live state.
    pub fn stats(&self) -> BridgeStats {
        let (live_allocations, live_bytes) = {
            let table = self.lock_table();
            (table.live_count(), table.live_bytes())
        };
        BridgeStats {
            live_allocations,
            live_bytes,
            pending_chunks: self.accumulator.pending_chunks(),
            pending_bytes: self.accumulator.pending_bytes(),
            converting: self.accumulator.is_converting(),
        }
    }
}
