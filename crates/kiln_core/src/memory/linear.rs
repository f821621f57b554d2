//! # Linear Allocator
//!
//! A bump allocator for transient data that is freed all at once.
//!
//! ## Safety Note
//!
//! Regions are carved out of one raw buffer, which needs unsafe code.
//! Soundness rests on two rules enforced by the signatures:
//! - allocation takes `&self` and only ever moves the cursor forward, so
//!   regions handed out between two releases never overlap;
//! - `release` takes `&mut self`, so it cannot run while any region is
//!   still borrowed.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::cell::Cell;
use std::fmt;
use std::mem;
use std::ptr::NonNull;
use std::slice;

use bytemuck::Pod;

use super::error::{MemoryError, MemoryResult};

/// Alignment of the backing buffer start.
pub const BUFFER_ALIGN: usize = 16;

/// Usage counters of a [`LinearAllocator`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Total size in bytes.
    pub capacity: usize,
    /// Bytes in use since the last release.
    pub used: usize,
    /// Highest `used` ever observed.
    pub peak_used: usize,
    /// Successful allocations since construction.
    pub allocations: u64,
    /// Number of releases (completed cycles) since construction.
    pub releases: u64,
}

/// A fixed-capacity bump-pointer arena.
///
/// Allocations are fast (just bump a cursor). There is no per-allocation
/// free: [`release`](Self::release) resets the cursor and reclaims
/// everything at once. Bytes are not cleared on release.
///
/// Everything handed out borrows the allocator, so the compiler rejects any
/// use of a region after the next release:
///
/// ```compile_fail
/// let mut arena = kiln_core::LinearAllocator::new(64).unwrap();
/// let label = arena.alloc_str("stale").unwrap();
/// arena.release();
/// println!("{label}");
/// ```
///
/// # Thread Safety
///
/// The arena can be sent to another thread but not shared. Use one arena
/// per thread.
///
/// # Example
///
/// ```rust
/// use kiln_core::LinearAllocator;
///
/// let mut arena = LinearAllocator::new(1024)?;
///
/// let scratch = arena.alloc_slice::<f32>(16)?;
/// scratch[0] = 1.0;
/// assert_eq!(arena.used(), 64);
///
/// arena.release();
/// assert!(arena.has_free_for(1024));
/// # Ok::<(), kiln_core::MemoryError>(())
/// ```
pub struct LinearAllocator {
    /// Start of the backing buffer.
    buffer: NonNull<u8>,
    /// Layout the buffer was allocated with.
    layout: Layout,
    /// Current allocation offset.
    offset: Cell<usize>,
    peak: Cell<usize>,
    allocations: Cell<u64>,
    releases: Cell<u64>,
}

// SAFETY: the allocator exclusively owns its buffer; moving it to another
// thread moves that ownership. `Cell` keeps it `!Sync`.
unsafe impl Send for LinearAllocator {}

impl LinearAllocator {
    /// Creates a new arena with the specified capacity in bytes.
    ///
    /// The buffer is zero-filled once here and aligned to [`BUFFER_ALIGN`].
    ///
    /// # Errors
    ///
    /// * [`MemoryError::InvalidCapacity`] if `capacity` is zero or too large
    ///   for a layout.
    /// * [`MemoryError::BackingAllocation`] if the system allocator refuses
    ///   the buffer.
    pub fn new(capacity: usize) -> MemoryResult<Self> {
        if capacity == 0 {
            return Err(MemoryError::InvalidCapacity(capacity));
        }
        let layout = Layout::from_size_align(capacity, BUFFER_ALIGN)
            .map_err(|_| MemoryError::InvalidCapacity(capacity))?;

        // SAFETY: `layout` has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let buffer = NonNull::new(raw).ok_or(MemoryError::BackingAllocation { bytes: capacity })?;

        tracing::debug!(capacity, "linear allocator created");

        Ok(Self {
            buffer,
            layout,
            offset: Cell::new(0),
            peak: Cell::new(0),
            allocations: Cell::new(0),
            releases: Cell::new(0),
        })
    }

    /// Returns the total capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.layout.size()
    }

    /// Returns the bytes in use since the last release.
    #[inline]
    #[must_use]
    pub fn used(&self) -> usize {
        self.offset.get()
    }

    /// Returns the remaining free space in bytes.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.used()
    }

    /// Returns true if at least one byte is free.
    #[inline]
    #[must_use]
    pub fn has_free(&self) -> bool {
        self.used() < self.capacity()
    }

    /// Returns true if `size` more bytes fit without padding.
    #[inline]
    #[must_use]
    pub fn has_free_for(&self, size: usize) -> bool {
        self.used()
            .checked_add(size)
            .is_some_and(|end| end <= self.capacity())
    }

    /// Returns a snapshot of the usage counters.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            capacity: self.capacity(),
            used: self.used(),
            peak_used: self.peak.get(),
            allocations: self.allocations.get(),
            releases: self.releases.get(),
        }
    }

    /// Allocates `size` bytes at the cursor with no alignment padding.
    ///
    /// The contents are whatever the region held last cycle.
    ///
    /// # Errors
    ///
    /// [`MemoryError::ArenaExhausted`] if fewer than `size` bytes remain.
    /// The cursor does not move on failure.
    #[allow(clippy::mut_from_ref)]
    pub fn allocate(&self, size: usize) -> MemoryResult<&mut [u8]> {
        self.allocate_aligned(size, 1)
    }

    /// Allocates `size` bytes starting at an address that is a multiple of
    /// `align`. Padding skipped to reach the alignment counts as used.
    ///
    /// # Errors
    ///
    /// * [`MemoryError::InvalidAlignment`] if `align` is not a power of two.
    /// * [`MemoryError::ArenaExhausted`] if the padded request does not fit.
    #[allow(clippy::mut_from_ref)]
    pub fn allocate_aligned(&self, size: usize, align: usize) -> MemoryResult<&mut [u8]> {
        if !align.is_power_of_two() {
            return Err(MemoryError::InvalidAlignment(align));
        }
        let start = self.bump(size, align)?;

        // SAFETY: `start + size <= capacity`, so the range lies inside the
        // buffer, which was initialised at construction. The cursor has moved
        // past the range, so no other region overlaps it until `release`,
        // which cannot run while this borrow of `self` is alive.
        Ok(unsafe { slice::from_raw_parts_mut(self.buffer.as_ptr().add(start), size) })
    }

    /// Allocates and stores `value`, returning a reference to it.
    ///
    /// The arena never runs destructors, so only plain-old-data types are
    /// accepted.
    ///
    /// # Errors
    ///
    /// [`MemoryError::ArenaExhausted`] if the value does not fit.
    #[allow(clippy::mut_from_ref)]
    pub fn create<T: Pod>(&self, value: T) -> MemoryResult<&mut T> {
        let bytes = self.allocate_aligned(mem::size_of::<T>(), mem::align_of::<T>())?;
        let slot: &mut T = bytemuck::from_bytes_mut(bytes);
        *slot = value;
        Ok(slot)
    }

    /// Allocates a zeroed slice of `count` elements.
    ///
    /// Zero-sized element types yield an empty slice.
    ///
    /// # Errors
    ///
    /// [`MemoryError::ArenaExhausted`] if the slice does not fit.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice<T: Pod>(&self, count: usize) -> MemoryResult<&mut [T]> {
        if mem::size_of::<T>() == 0 {
            return Ok(Default::default());
        }
        let size = mem::size_of::<T>()
            .checked_mul(count)
            .ok_or(MemoryError::ArenaExhausted {
                requested: usize::MAX,
                remaining: self.remaining(),
                capacity: self.capacity(),
            })?;

        let bytes = self.allocate_aligned(size, mem::align_of::<T>())?;
        bytes.fill(0);
        Ok(bytemuck::cast_slice_mut(bytes))
    }

    /// Copies `text` into the arena.
    ///
    /// # Errors
    ///
    /// [`MemoryError::ArenaExhausted`] if the text does not fit.
    pub fn alloc_str(&self, text: &str) -> MemoryResult<&str> {
        let bytes = self.allocate(text.len())?;
        bytes.copy_from_slice(text.as_bytes());
        // SAFETY: the bytes are an exact copy of a `str`.
        Ok(unsafe { std::str::from_utf8_unchecked(bytes) })
    }

    /// Resets the cursor to zero, reclaiming every allocation at once.
    ///
    /// This is a **O(1)** operation: nothing is freed, cleared or
    /// reallocated.
    #[inline]
    pub fn release(&mut self) {
        let used = self.offset.replace(0);
        self.releases.set(self.releases.get() + 1);
        tracing::trace!(used, capacity = self.capacity(), "linear allocator released");
    }

    /// Runs one cycle: hands the arena to `frame`, then releases it.
    ///
    /// The result of `frame` cannot borrow from the arena.
    pub fn cycle<R>(&mut self, frame: impl FnOnce(&Self) -> R) -> R {
        let result = frame(self);
        self.release();
        result
    }

    /// Advances the cursor past `size` bytes aligned to `align` and returns
    /// the start offset of the region.
    fn bump(&self, size: usize, align: usize) -> MemoryResult<usize> {
        let used = self.offset.get();
        let base = self.buffer.as_ptr() as usize;

        let start = (base + used)
            .checked_add(align - 1)
            .map(|addr| (addr & !(align - 1)) - base);
        let end = start.and_then(|start| start.checked_add(size));

        match (start, end) {
            (Some(start), Some(end)) if end <= self.capacity() => {
                self.offset.set(end);
                self.peak.set(self.peak.get().max(end));
                self.allocations.set(self.allocations.get() + 1);
                tracing::trace!(offset = start, size, "linear allocation");
                Ok(start)
            }
            _ => {
                let padding = start.map_or(0, |start| start - used);
                let requested = size.saturating_add(padding);
                tracing::debug!(
                    requested,
                    remaining = self.remaining(),
                    capacity = self.capacity(),
                    "linear allocator exhausted"
                );
                Err(MemoryError::ArenaExhausted {
                    requested,
                    remaining: self.remaining(),
                    capacity: self.capacity(),
                })
            }
        }
    }
}

impl Drop for LinearAllocator {
    fn drop(&mut self) {
        // SAFETY: `buffer` was allocated in `new` with exactly `layout`.
        unsafe { alloc::dealloc(self.buffer.as_ptr(), self.layout) };
    }
}

impl fmt::Debug for LinearAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearAllocator")
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_sequence() {
        let mut arena = LinearAllocator::new(16).unwrap();

        let _ = arena.allocate(4).unwrap();
        assert!(!arena.has_free_for(16));
        assert!(arena.has_free_for(12));

        let value = arena.create::<i32>(5).unwrap();
        assert_eq!(*value, 5);
        assert!(arena.has_free_for(8));

        let _ = arena.allocate(8).unwrap();
        assert!(!arena.has_free());

        arena.release();
        assert!(arena.has_free_for(16));
    }

    #[test]
    fn test_allocations_do_not_overlap() {
        let arena = LinearAllocator::new(64).unwrap();
        let a = arena.allocate(8).unwrap();
        let b = arena.allocate(8).unwrap();
        a.fill(0xAA);
        b.fill(0xBB);

        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 8);
        assert!(a.iter().all(|&byte| byte == 0xAA));
        assert!(b.iter().all(|&byte| byte == 0xBB));
    }

    #[test]
    fn test_exhaustion_leaves_cursor() {
        let arena = LinearAllocator::new(32).unwrap();
        let _ = arena.allocate(30).unwrap();

        let err = arena.allocate(4).unwrap_err();
        assert_eq!(
            err,
            MemoryError::ArenaExhausted { requested: 4, remaining: 2, capacity: 32 }
        );
        assert_eq!(arena.used(), 30);
        assert!(arena.allocate(2).is_ok());
    }

    #[test]
    fn test_typed_create_is_aligned() {
        let arena = LinearAllocator::new(64).unwrap();
        let _ = arena.allocate(1).unwrap();

        let value = arena.create::<u64>(7).unwrap();
        assert_eq!(value as *const u64 as usize % mem::align_of::<u64>(), 0);
        assert_eq!(arena.used(), 16);
    }

    #[test]
    fn test_padding_counts_toward_request() {
        let arena = LinearAllocator::new(16).unwrap();
        let _ = arena.allocate(9).unwrap();

        let err = arena.allocate_aligned(8, 8).unwrap_err();
        assert_eq!(
            err,
            MemoryError::ArenaExhausted { requested: 15, remaining: 7, capacity: 16 }
        );
    }

    #[test]
    fn test_invalid_alignment() {
        let arena = LinearAllocator::new(16).unwrap();
        assert_eq!(arena.allocate_aligned(4, 3), Err(MemoryError::InvalidAlignment(3)));
    }

    #[test]
    fn test_alloc_slice_is_zeroed_after_release() {
        let mut arena = LinearAllocator::new(64).unwrap();
        arena.allocate(64).unwrap().fill(0xFF);
        arena.release();

        let slice = arena.alloc_slice::<u32>(16).unwrap();
        assert_eq!(slice.len(), 16);
        assert!(slice.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_alloc_str_copies_text() {
        let arena = LinearAllocator::new(32).unwrap();
        let text = arena.alloc_str("frame 12").unwrap();
        assert_eq!(text, "frame 12");
        assert_eq!(arena.used(), 8);
    }

    #[test]
    fn test_stats_track_cycles() {
        let mut arena = LinearAllocator::new(128).unwrap();

        let kept = arena.cycle(|a| {
            let _ = a.allocate(100).unwrap();
            a.used()
        });
        assert_eq!(kept, 100);

        let _ = arena.allocate(10).unwrap();
        let stats = arena.stats();
        assert_eq!(stats.used, 10);
        assert_eq!(stats.peak_used, 100);
        assert_eq!(stats.allocations, 2);
        assert_eq!(stats.releases, 1);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(LinearAllocator::new(0).err(), Some(MemoryError::InvalidCapacity(0)));
    }
}
