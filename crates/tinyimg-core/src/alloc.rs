//! Handle-keyed allocation table for host-visible buffers.
//!
//! The table is the only owner of buffers the host can reach. Every buffer
//! lives in a slot; a [`Handle`] packs the slot index together with the
//! generation the slot had when the handle was issued. Releasing a buffer
//! bumps the slot's generation, so a handle held past its release fails the
//! generation check instead of aliasing whatever buffer reuses the slot.
//! Double-free and use-after-free are therefore checked errors, not
//! undefined behavior.

use thiserror::Error;

const INDEX_BITS: u32 = 16;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;

/// Hard cap on simultaneously live allocations (the 16-bit slot index space).
pub const MAX_LIVE_ALLOCATIONS: usize = 1 << INDEX_BITS;

/// Errors from allocation-table operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocError {
    /// Memory or handle space is exhausted. Recoverable: the caller can
    /// release other handles and retry.
    #[error("allocation of {requested} bytes failed")]
    Exhausted { requested: usize },

    /// The handle does not name a live allocation: it was never issued, or
    /// it was already released. Surfaced as a caller bug.
    #[error("unknown or released handle {0:#010x}")]
    UnknownHandle(u32),

    /// A write would land outside the allocation.
    #[error("write of {len} bytes at offset {offset} exceeds allocation of {capacity} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },
}

/// Opaque identifier for one live allocation.
///
/// The raw `u32` form crosses the boundary; hosts treat it as opaque.
/// Internally: low 16 bits slot index, high 16 bits generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    fn new(index: u16, generation: u16) -> Self {
        Handle(((generation as u32) << INDEX_BITS) | index as u32)
    }

    fn split(self) -> (usize, u16) {
        ((self.0 & INDEX_MASK) as usize, (self.0 >> INDEX_BITS) as u16)
    }

    /// The raw boundary form of this handle.
    pub const fn to_raw(self) -> u32 {
        self.0
    }

    /// Reconstruct a handle from its raw boundary form.
    ///
    /// The result is only meaningful against the table that issued the raw
    /// value; anything else fails the generation check on use.
    pub const fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }
}

struct Slot {
    generation: u16,
    buf: Option<Vec<u8>>,
}

/// Owns the mapping from live handles to byte buffers.
///
/// At any instant the live handles map one-to-one onto disjoint owned
/// buffers; total live bytes is bounded only by host memory. Generations
/// wrap at `u16::MAX` releases of a single slot, which is the accepted
/// limit of staleness detection.
#[derive(Default)]
pub struct AllocTable {
    slots: Vec<Slot>,
    free: Vec<u16>,
    live: usize,
    live_bytes: usize,
}

impl AllocTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zero-initialized buffer of exactly `size` bytes under a
    /// fresh handle. `size == 0` is valid and yields an empty region.
    ///
    /// Memory is reserved fallibly: exhaustion returns
    /// [`AllocError::Exhausted`] instead of aborting the process.
    pub fn allocate(&mut self, size: usize) -> Result<Handle, AllocError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(size)
            .map_err(|_| AllocError::Exhausted { requested: size })?;
        buf.resize(size, 0);
        self.adopt(buf)
    }

    /// Register an already-materialized buffer under a fresh handle.
    ///
    /// Used by the conversion pipeline to publish results without a second
    /// zero-fill-and-copy pass.
    pub fn adopt(&mut self, buf: Vec<u8>) -> Result<Handle, AllocError> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                if self.slots.len() >= MAX_LIVE_ALLOCATIONS {
                    return Err(AllocError::Exhausted {
                        requested: buf.len(),
                    });
                }
                let index = self.slots.len() as u16;
                self.slots.push(Slot {
                    generation: 0,
                    buf: None,
                });
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        self.live += 1;
        self.live_bytes += buf.len();
        slot.buf = Some(buf);
        Ok(Handle::new(index, slot.generation))
    }

    /// Remove the handle's entry and take ownership of its buffer.
    pub fn take(&mut self, handle: Handle) -> Result<Vec<u8>, AllocError> {
        let (index, generation) = handle.split();
        let slot = self
            .slots
            .get_mut(index)
            .filter(|slot| slot.generation == generation && slot.buf.is_some())
            .ok_or(AllocError::UnknownHandle(handle.to_raw()))?;

        let buf = slot.buf.take().unwrap_or_default();
        slot.generation = slot.generation.wrapping_add(1);
        self.live -= 1;
        self.live_bytes -= buf.len();
        self.free.push(index as u16);
        Ok(buf)
    }

    /// Remove the handle's entry and free its storage.
    ///
    /// Releasing an unknown or already-released handle leaves the table
    /// unchanged and returns [`AllocError::UnknownHandle`] so the caller bug
    /// stays observable; silently tolerating it would mask double-frees in
    /// the host.
    pub fn release(&mut self, handle: Handle) -> Result<(), AllocError> {
        self.take(handle).map(drop)
    }

    /// The buffer's current bytes.
    pub fn get(&self, handle: Handle) -> Result<&[u8], AllocError> {
        let (index, generation) = handle.split();
        self.slots
            .get(index)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.buf.as_deref())
            .ok_or(AllocError::UnknownHandle(handle.to_raw()))
    }

    /// The buffer's current bytes, writable.
    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut [u8], AllocError> {
        let (index, generation) = handle.split();
        self.slots
            .get_mut(index)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.buf.as_deref_mut())
            .ok_or(AllocError::UnknownHandle(handle.to_raw()))
    }

    /// Copy `bytes` into the allocation at `offset`, bounds-checked.
    pub fn write(&mut self, handle: Handle, offset: usize, bytes: &[u8]) -> Result<(), AllocError> {
        let buf = self.get_mut(handle)?;
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= buf.len())
            .ok_or(AllocError::OutOfBounds {
                offset,
                len: bytes.len(),
                capacity: buf.len(),
            })?;
        buf[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Size in bytes of the allocation behind `handle`.
    pub fn len(&self, handle: Handle) -> Result<usize, AllocError> {
        self.get(handle).map(<[u8]>::len)
    }

    /// Number of live allocations.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Total bytes across all live allocations.
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_zero_filled() {
        let mut table = AllocTable::new();
        let handle = table.allocate(16).unwrap();
        assert_eq!(table.get(handle).unwrap(), &[0u8; 16]);
    }

    #[test]
    fn test_allocate_zero_size() {
        let mut table = AllocTable::new();
        let handle = table.allocate(0).unwrap();
        assert_eq!(table.get(handle).unwrap(), &[] as &[u8]);
        assert_eq!(table.len(handle).unwrap(), 0);
    }

    #[test]
    fn test_write_then_read_back() {
        let mut table = AllocTable::new();
        let handle = table.allocate(8).unwrap();
        table.write(handle, 2, &[1, 2, 3]).unwrap();
        assert_eq!(table.get(handle).unwrap(), &[0, 0, 1, 2, 3, 0, 0, 0]);
    }

    #[test]
    fn test_write_out_of_bounds() {
        let mut table = AllocTable::new();
        let handle = table.allocate(4).unwrap();
        let err = table.write(handle, 2, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, AllocError::OutOfBounds { .. }));
        // Offset arithmetic must not wrap into bounds
        let err = table.write(handle, usize::MAX, &[1]).unwrap_err();
        assert!(matches!(err, AllocError::OutOfBounds { .. }));
    }

    #[test]
    fn test_release_invalidates_handle() {
        let mut table = AllocTable::new();
        let handle = table.allocate(4).unwrap();
        table.release(handle).unwrap();

        assert_eq!(
            table.get(handle).unwrap_err(),
            AllocError::UnknownHandle(handle.to_raw())
        );
        assert!(table.get_mut(handle).is_err());
        assert!(table.len(handle).is_err());
    }

    #[test]
    fn test_double_release_is_an_error() {
        let mut table = AllocTable::new();
        let handle = table.allocate(4).unwrap();
        table.release(handle).unwrap();
        assert_eq!(
            table.release(handle).unwrap_err(),
            AllocError::UnknownHandle(handle.to_raw())
        );
        assert_eq!(table.live_count(), 0);
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut table = AllocTable::new();
        let first = table.allocate(4).unwrap();
        table.release(first).unwrap();

        // Reuses the slot under a new generation
        let second = table.allocate(4).unwrap();
        assert_ne!(first, second);
        assert!(table.get(first).is_err());
        assert!(table.get(second).is_ok());
    }

    #[test]
    fn test_handles_distinct_while_live() {
        let mut table = AllocTable::new();
        let handles: Vec<Handle> = (0..100).map(|i| table.allocate(i).unwrap()).collect();
        for (i, a) in handles.iter().enumerate() {
            for b in &handles[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_adopt_publishes_bytes() {
        let mut table = AllocTable::new();
        let handle = table.adopt(vec![0xFF, 0xD8, 0xFF]).unwrap();
        assert_eq!(table.get(handle).unwrap(), &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_take_returns_ownership() {
        let mut table = AllocTable::new();
        let handle = table.adopt(vec![1, 2, 3]).unwrap();
        let buf = table.take(handle).unwrap();
        assert_eq!(buf, vec![1, 2, 3]);
        assert!(table.get(handle).is_err());
        assert_eq!(table.live_count(), 0);
    }

    #[test]
    fn test_live_accounting() {
        let mut table = AllocTable::new();
        let a = table.allocate(10).unwrap();
        let b = table.allocate(20).unwrap();
        assert_eq!(table.live_count(), 2);
        assert_eq!(table.live_bytes(), 30);

        table.release(a).unwrap();
        assert_eq!(table.live_count(), 1);
        assert_eq!(table.live_bytes(), 20);

        table.release(b).unwrap();
        assert_eq!(table.live_count(), 0);
        assert_eq!(table.live_bytes(), 0);
    }

    #[test]
    fn test_slot_space_exhaustion() {
        let mut table = AllocTable::new();
        for _ in 0..MAX_LIVE_ALLOCATIONS {
            table.allocate(0).unwrap();
        }
        assert_eq!(
            table.allocate(0).unwrap_err(),
            AllocError::Exhausted { requested: 0 }
        );
    }

    #[test]
    fn test_raw_round_trip() {
        let mut table = AllocTable::new();
        let handle = table.allocate(4).unwrap();
        let raw = handle.to_raw();
        assert_eq!(Handle::from_raw(raw), handle);
        assert!(table.get(Handle::from_raw(raw)).is_ok());
    }

    #[test]
    fn test_foreign_raw_handle_rejected() {
        let table = AllocTable::new();
        assert!(table.get(Handle::from_raw(0xDEAD_BEEF)).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Live accounting matches the surviving allocations for any
        /// interleaving of allocate and release.
        #[test]
        fn prop_live_accounting_consistent(
            sizes in prop::collection::vec(0usize..512, 1..40),
            release_mask in prop::collection::vec(any::<bool>(), 1..40),
        ) {
            let mut table = AllocTable::new();
            let handles: Vec<(Handle, usize)> = sizes
                .iter()
                .map(|&size| (table.allocate(size).unwrap(), size))
                .collect();

            let mut expected_count = handles.len();
            let mut expected_bytes: usize = sizes.iter().sum();

            for (&(handle, size), &release) in handles.iter().zip(&release_mask) {
                if release {
                    table.release(handle).unwrap();
                    expected_count -= 1;
                    expected_bytes -= size;
                }
            }

            prop_assert_eq!(table.live_count(), expected_count);
            prop_assert_eq!(table.live_bytes(), expected_bytes);
        }

        /// A released handle is rejected by every operation, even after its
        /// slot has been reallocated.
        #[test]
        fn prop_released_handles_stay_dead(
            generations in 1usize..50,
        ) {
            let mut table = AllocTable::new();
            let mut dead = Vec::new();

            for i in 0..generations {
                let handle = table.allocate(i).unwrap();
                table.release(handle).unwrap();
                dead.push(handle);

                for &stale in &dead {
                    prop_assert!(table.get(stale).is_err());
                }
            }
        }

        /// Writes land exactly where addressed and nowhere else.
        #[test]
        fn prop_write_is_exact(
            size in 1usize..256,
            payload in prop::collection::vec(any::<u8>(), 1..64),
            offset in 0usize..256,
        ) {
            prop_assume!(offset + payload.len() <= size);

            let mut table = AllocTable::new();
            let handle = table.allocate(size).unwrap();
            table.write(handle, offset, &payload).unwrap();

            let bytes = table.get(handle).unwrap();
            prop_assert_eq!(&bytes[offset..offset + payload.len()], &payload[..]);
            prop_assert!(bytes[..offset].iter().all(|&b| b == 0));
            prop_assert!(bytes[offset + payload.len()..].iter().all(|&b| b == 0));
        }
    }
}
