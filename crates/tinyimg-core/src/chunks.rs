//! Chunked-input accumulation and the single-flight conversion gate.
//!
//! A host streaming a large file pushes it as an ordered sequence of
//! fragments; the accumulator assembles them into one logical input. The
//! state machine is `Idle -> Accumulating -> Converting -> Idle`, with
//! `Accumulating -> Accumulating` on each append.
//!
//! At most one conversion runs at a time. The gate is an atomic
//! compare-and-set rather than a locked boolean, so the single-flight
//! invariant holds even under reentrant host callbacks, and the returned
//! guard clears the flag on every exit path including unwinding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// Errors from the accumulator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    /// The chunk payload could not be materialized from its wire form.
    /// The pending sequence is unchanged.
    #[error("chunk payload could not be resolved")]
    InvalidChunk,

    /// A conversion is already in flight; concurrent requests are rejected,
    /// not queued. The caller may retry once the current one completes.
    #[error("a conversion is already in progress")]
    AlreadyConverting,
}

/// Assembles one logical input from host-pushed fragments.
///
/// `start` is accepted even while a conversion is in flight: it resets the
/// pending sequence without waiting, and chunks appended before that reset
/// never reach the conversion already running. Hosts issuing conflicting
/// calls concurrently (`append` racing `start`) get lock-order semantics,
/// not wall-clock intention.
pub struct ChunkAccumulator {
    pending: Mutex<Vec<Vec<u8>>>,
    converting: AtomicBool,
}

impl Default for ChunkAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkAccumulator {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            converting: AtomicBool::new(false),
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin a new cycle, discarding any chunks left over from a prior
    /// unfinished one. Always succeeds.
    pub fn start(&self) {
        self.lock_pending().clear();
    }

    /// Append one fragment verbatim. Order of appends is the order of the
    /// final byte layout; O(1) amortized.
    pub fn append(&self, bytes: Vec<u8>) {
        self.lock_pending().push(bytes);
    }

    /// Number of pending fragments.
    pub fn pending_chunks(&self) -> usize {
        self.lock_pending().len()
    }

    /// Total bytes across all pending fragments.
    pub fn pending_bytes(&self) -> usize {
        self.lock_pending().iter().map(Vec::len).sum()
    }

    /// Whether a conversion currently holds the gate.
    pub fn is_converting(&self) -> bool {
        self.converting.load(Ordering::Acquire)
    }

    /// Claim the single-flight gate.
    ///
    /// Fails with [`ChunkError::AlreadyConverting`] if another conversion
    /// holds it, leaving the pending sequence untouched. The guard releases
    /// the gate when dropped.
    pub fn begin_convert(&self) -> Result<ConvertGuard<'_>, ChunkError> {
        self.converting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ChunkError::AlreadyConverting)?;
        Ok(ConvertGuard {
            flag: &self.converting,
        })
    }

    /// Concatenate all pending fragments in append order into one contiguous
    /// buffer, clearing the sequence.
    ///
    /// Called with the gate held; the pending lock is released before this
    /// returns, so appends for the next cycle are not blocked while the
    /// conversion itself runs.
    pub fn take_pending(&self) -> Vec<u8> {
        let mut pending = self.lock_pending();
        let total: usize = pending.iter().map(Vec::len).sum();
        let mut combined = Vec::with_capacity(total);
        for chunk in pending.drain(..) {
            combined.extend_from_slice(&chunk);
        }
        combined
    }
}

/// Releases the single-flight gate on drop.
#[derive(Debug)]
pub struct ConvertGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ConvertGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
