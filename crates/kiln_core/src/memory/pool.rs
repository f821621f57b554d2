//! # Pool Allocator
//!
//! Fixed-capacity slot allocator for objects that are frequently created and
//! released individually.
//!
//! Free slots form an intrusive singly-linked list: a free slot stores only
//! the index of the next free slot, and the pool keeps the head. Creating pops
//! the head, releasing pushes the slot back on the head, so the most recently
//! released slot is the next one handed out.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};

use super::error::{MemoryError, MemoryResult};

/// Source of process-unique pool ids used to brand handles.
static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(1);

enum SlotState<T> {
    /// Linked into the free list.
    Free { next: Option<u32> },
    /// Holds a constructed value.
    Live(T),
}

struct Slot<T> {
    /// Bumped on every release so old handles to the slot stop matching.
    generation: u32,
    state: SlotState<T>,
}

/// A pool allocator for same-typed objects.
///
/// All slots are reserved at construction. `create` and `release` are O(1)
/// and never touch the heap.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per thread or wrap it in a
/// [`SharedPool`](super::SharedPool).
///
/// # Example
///
/// ```rust
/// use kiln_core::PoolAllocator;
///
/// struct Particle { x: f32, y: f32, life: f32 }
///
/// let mut pool: PoolAllocator<Particle> = PoolAllocator::new(10_000)?;
///
/// let handle = pool.create(Particle { x: 0.0, y: 0.0, life: 1.0 })?;
/// assert_eq!(pool.get(handle).map(|p| p.life), Some(1.0));
///
/// pool.release(handle)?;
/// # Ok::<(), kiln_core::MemoryError>(())
/// ```
pub struct PoolAllocator<T> {
    /// Brand carried by every handle this pool issues.
    id: u32,
    /// The slot array, never resized.
    slots: Box<[Slot<T>]>,
    /// First free slot, `None` when the pool is exhausted.
    free_head: Option<u32>,
    /// Number of live slots.
    live_count: usize,
}

/// Handle to a live object in a [`PoolAllocator`].
///
/// A handle is branded with the id of the pool that issued it and the
/// generation of its slot, so passing it to another pool or releasing it
/// twice is reported instead of corrupting the free list. Generations wrap
/// after `u32::MAX` releases of one slot.
pub struct PoolHandle<T> {
    pool: u32,
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PoolHandle<T> {
    /// Returns the slot index this handle points at.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the slot generation captured when the object was created.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Returns the id of the pool that issued this handle.
    #[inline]
    #[must_use]
    pub const fn pool_id(self) -> u32 {
        self.pool
    }
}

impl<T> Clone for PoolHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PoolHandle<T> {}

impl<T> PartialEq for PoolHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.pool == other.pool && self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for PoolHandle<T> {}

impl<T> Hash for PoolHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pool.hash(state);
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for PoolHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolHandle")
            .field("pool", &self.pool)
            .field("index", &self.index)
            .field("generation", &self.generation)
            .finish()
    }
}

impl<T> PoolAllocator<T> {
    /// Creates a new pool with the specified capacity.
    ///
    /// All memory is reserved upfront and every slot is chained into the
    /// free list in ascending order.
    ///
    /// # Errors
    ///
    /// * [`MemoryError::InvalidCapacity`] if `capacity` is zero or does not
    ///   fit a `u32` slot index.
    /// * [`MemoryError::BackingAllocation`] if the slot array cannot be
    ///   reserved.
    pub fn new(capacity: usize) -> MemoryResult<Self> {
        if capacity == 0 || u32::try_from(capacity).is_err() {
            return Err(MemoryError::InvalidCapacity(capacity));
        }

        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity).map_err(|_| MemoryError::BackingAllocation {
            bytes: capacity.saturating_mul(mem::size_of::<Slot<T>>()),
        })?;
        slots.extend((0..capacity).map(|index| Slot {
            generation: 0,
            state: SlotState::Free {
                next: Self::successor(index, capacity),
            },
        }));

        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(pool = id, capacity, "pool allocator created");

        Ok(Self {
            id,
            slots: slots.into_boxed_slice(),
            free_head: Some(0),
            live_count: 0,
        })
    }

    /// Returns the id branded into this pool's handles.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Returns the total capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of live objects.
    #[inline]
    #[must_use]
    pub const fn live_count(&self) -> usize {
        self.live_count
    }

    /// Returns the number of free slots.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.capacity() - self.live_count
    }

    /// Returns true if at least one slot is free.
    #[inline]
    #[must_use]
    pub const fn has_free(&self) -> bool {
        self.free_head.is_some()
    }

    /// Stores `value` in the first free slot.
    ///
    /// This is a **O(1)** operation with **zero heap allocations**.
    ///
    /// # Errors
    ///
    /// [`MemoryError::PoolExhausted`] if no slot is free. The pool is left
    /// untouched and `value` is dropped.
    pub fn create(&mut self, value: T) -> MemoryResult<PoolHandle<T>> {
        self.create_with(|| value)
    }

    /// Constructs a value in the first free slot.
    ///
    /// `init` is only called once a slot is known to be available.
    ///
    /// # Errors
    ///
    /// [`MemoryError::PoolExhausted`] if no slot is free.
    pub fn create_with<F>(&mut self, init: F) -> MemoryResult<PoolHandle<T>>
    where
        F: FnOnce() -> T,
    {
        let Some(index) = self.free_head else {
            tracing::debug!(pool = self.id, capacity = self.capacity(), "pool exhausted");
            return Err(MemoryError::PoolExhausted {
                capacity: self.capacity(),
            });
        };

        let slot = &mut self.slots[index as usize];
        let next = match slot.state {
            SlotState::Free { next } => next,
            SlotState::Live(_) => unreachable!("free list head {index} is live"),
        };

        slot.state = SlotState::Live(init());
        let generation = slot.generation;
        self.free_head = next;
        self.live_count += 1;

        Ok(PoolHandle {
            pool: self.id,
            index,
            generation,
            _marker: PhantomData,
        })
    }

    /// Drops the object behind `handle` and returns its slot to the pool.
    ///
    /// # Errors
    ///
    /// * [`MemoryError::ForeignHandle`] if `handle` was issued by another pool.
    /// * [`MemoryError::StaleHandle`] if the object was already released.
    pub fn release(&mut self, handle: PoolHandle<T>) -> MemoryResult<()> {
        self.take(handle).map(drop)
    }

    /// Moves the object behind `handle` out and returns its slot to the pool.
    ///
    /// # Errors
    ///
    /// Same as [`release`](Self::release).
    pub fn take(&mut self, handle: PoolHandle<T>) -> MemoryResult<T> {
        self.validate(handle)?;

        let slot = &mut self.slots[handle.index as usize];
        let previous = mem::replace(
            &mut slot.state,
            SlotState::Free {
                next: self.free_head,
            },
        );
        slot.generation = slot.generation.wrapping_add(1);
        self.free_head = Some(handle.index);
        self.live_count -= 1;

        match previous {
            SlotState::Live(value) => Ok(value),
            SlotState::Free { .. } => unreachable!("validated slot {} was free", handle.index),
        }
    }

    /// Returns true if `handle` refers to a live object of this pool.
    #[must_use]
    pub fn contains(&self, handle: PoolHandle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Gets a reference to a live object.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle<T>) -> Option<&T> {
        if handle.pool != self.id {
            return None;
        }
        match self.slots.get(handle.index as usize)? {
            Slot {
                generation,
                state: SlotState::Live(value),
            } if *generation == handle.generation => Some(value),
            _ => None,
        }
    }

    /// Gets a mutable reference to a live object.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle<T>) -> Option<&mut T> {
        if handle.pool != self.id {
            return None;
        }
        match self.slots.get_mut(handle.index as usize)? {
            Slot {
                generation,
                state: SlotState::Live(value),
            } if *generation == handle.generation => Some(value),
            _ => None,
        }
    }

    /// Drops every live object and rebuilds the free list.
    ///
    /// Outstanding handles become stale. No memory is freed.
    pub fn clear(&mut self) {
        let capacity = self.capacity();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if matches!(slot.state, SlotState::Live(_)) {
                slot.generation = slot.generation.wrapping_add(1);
            }
            slot.state = SlotState::Free {
                next: Self::successor(index, capacity),
            };
        }
        self.free_head = Some(0);
        self.live_count = 0;
    }

    /// Iterates over all live objects in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle<T>, &T)> {
        let pool = self.id;
        self.slots.iter().zip(0u32..).filter_map(move |(slot, index)| match &slot.state {
            SlotState::Live(value) => Some((
                PoolHandle {
                    pool,
                    index,
                    generation: slot.generation,
                    _marker: PhantomData,
                },
                value,
            )),
            SlotState::Free { .. } => None,
        })
    }

    /// Iterates mutably over all live objects in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PoolHandle<T>, &mut T)> {
        let pool = self.id;
        self.slots.iter_mut().zip(0u32..).filter_map(move |(slot, index)| {
            let generation = slot.generation;
            match &mut slot.state {
                SlotState::Live(value) => Some((
                    PoolHandle {
                        pool,
                        index,
                        generation,
                        _marker: PhantomData,
                    },
                    value,
                )),
                SlotState::Free { .. } => None,
            }
        })
    }

    fn validate(&self, handle: PoolHandle<T>) -> MemoryResult<()> {
        if handle.pool != self.id {
            tracing::warn!(expected = self.id, found = handle.pool, "foreign pool handle rejected");
            return Err(MemoryError::ForeignHandle {
                expected: self.id,
                found: handle.pool,
            });
        }
        if self.get(handle).is_none() {
            tracing::warn!(
                pool = self.id,
                index = handle.index,
                generation = handle.generation,
                "stale pool handle rejected"
            );
            return Err(MemoryError::StaleHandle {
                index: handle.index,
                generation: handle.generation,
            });
        }
        Ok(())
    }

    /// Index of the slot that follows `index` in a freshly built free list.
    fn successor(index: usize, capacity: usize) -> Option<u32> {
        let next = index + 1;
        if next < capacity {
            u32::try_from(next).ok()
        } else {
            None
        }
    }
}

impl<T> fmt::Debug for PoolAllocator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("id", &self.id)
            .field("capacity", &self.capacity())
            .field("live_count", &self.live_count)
            .field("free_head", &self.free_head)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Transform {
        a: i32,
        b: i32,
        c: i32,
        d: f64,
        e: f32,
    }

    #[test]
    fn test_pool_create_release() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new(10).unwrap();

        let h1 = pool.create(42).unwrap();
        assert_eq!(*pool.get(h1).unwrap(), 42);
        assert_eq!(pool.live_count(), 1);

        assert_eq!(pool.take(h1).unwrap(), 42);
        assert_eq!(pool.live_count(), 0);
        assert!(pool.get(h1).is_none());
    }

    #[test]
    fn test_pool_full() {
        let mut pool: PoolAllocator<u8> = PoolAllocator::new(2).unwrap();

        let _ = pool.create(1).unwrap();
        let _ = pool.create(2).unwrap();
        assert!(!pool.has_free());
        assert_eq!(pool.create(3), Err(MemoryError::PoolExhausted { capacity: 2 }));
        assert_eq!(pool.live_count(), 2);
    }

    #[test]
    fn test_create_with_skips_init_when_full() {
        let mut pool: PoolAllocator<u8> = PoolAllocator::new(1).unwrap();
        let _ = pool.create(1).unwrap();

        let mut called = false;
        let result = pool.create_with(|| {
            called = true;
            2
        });
        assert!(result.is_err());
        assert!(!called);
    }

    #[test]
    fn test_pool_reuse_is_lifo() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new(3).unwrap();

        let a = pool.create(1).unwrap();
        let b = pool.create(2).unwrap();
        pool.release(a).unwrap();
        pool.release(b).unwrap();

        // Most recently released slot comes back first.
        let c = pool.create(3).unwrap();
        let d = pool.create(4).unwrap();
        assert_eq!(c.index(), b.index());
        assert_eq!(d.index(), a.index());
    }

    #[test]
    fn test_fresh_pool_hands_out_ascending_slots() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new(4).unwrap();
        let indices: Vec<u32> = (0..4).map(|i| pool.create(i).unwrap().index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_constructor_arguments_forwarded() {
        let mut pool: PoolAllocator<Transform> = PoolAllocator::new(4).unwrap();

        let h = pool
            .create_with(|| Transform { a: 1, b: 2, c: 3, d: 10.4, e: 15.4 })
            .unwrap();
        assert_eq!(
            pool.get(h),
            Some(&Transform { a: 1, b: 2, c: 3, d: 10.4, e: 15.4 })
        );
    }

    #[test]
    fn test_double_release_is_stale() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new(2).unwrap();
        let h = pool.create(7).unwrap();
        pool.release(h).unwrap();

        assert_eq!(
            pool.release(h),
            Err(MemoryError::StaleHandle { index: h.index(), generation: h.generation() })
        );
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn test_reused_slot_rejects_old_handle() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new(1).unwrap();
        let old = pool.create(1).unwrap();
        pool.release(old).unwrap();
        let new = pool.create(2).unwrap();

        assert_eq!(old.index(), new.index());
        assert_ne!(old, new);
        assert!(pool.get(old).is_none());
        assert!(pool.release(old).is_err());
        assert_eq!(*pool.get(new).unwrap(), 2);
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let mut first: PoolAllocator<u32> = PoolAllocator::new(2).unwrap();
        let mut second: PoolAllocator<u32> = PoolAllocator::new(2).unwrap();
        let h = first.create(5).unwrap();
        let _ = second.create(6).unwrap();

        assert_eq!(
            second.release(h),
            Err(MemoryError::ForeignHandle { expected: second.id(), found: first.id() })
        );
        assert!(second.get(h).is_none());
        assert_eq!(second.live_count(), 1);
    }

    #[test]
    fn test_release_drops_value() {
        use std::rc::Rc;

        let tracker = Rc::new(());
        let mut pool: PoolAllocator<Rc<()>> = PoolAllocator::new(2).unwrap();
        let h = pool.create(Rc::clone(&tracker)).unwrap();
        assert_eq!(Rc::strong_count(&tracker), 2);

        pool.release(h).unwrap();
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new(3).unwrap();
        let h = pool.create(1).unwrap();
        let _ = pool.create(2).unwrap();

        pool.clear();
        assert_eq!(pool.live_count(), 0);
        assert!(!pool.contains(h));
        assert_eq!(pool.create(9).unwrap().index(), 0);
    }

    #[test]
    fn test_iter_skips_free_slots() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new(4).unwrap();
        let a = pool.create(10).unwrap();
        let b = pool.create(20).unwrap();
        let _ = pool.create(30).unwrap();
        pool.release(b).unwrap();

        for (_, value) in pool.iter_mut() {
            *value += 1;
        }
        let live: Vec<u32> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(live, vec![11, 31]);
        assert_eq!(pool.iter().next().map(|(h, _)| h), Some(a));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(
            PoolAllocator::<u8>::new(0).err(),
            Some(MemoryError::InvalidCapacity(0))
        );
    }
}
