//! # Shared Pool
//!
//! A [`PoolAllocator`] behind a `parking_lot` mutex for callers that create
//! and release objects from several threads.

use parking_lot::{Mutex, MutexGuard};

use super::error::MemoryResult;
use super::pool::{PoolAllocator, PoolHandle};

/// Thread-safe wrapper around a [`PoolAllocator`].
///
/// Every call takes the lock for its own duration only. Use
/// [`lock`](Self::lock) to batch several operations under one acquisition.
pub struct SharedPool<T> {
    inner: Mutex<PoolAllocator<T>>,
}

impl<T> SharedPool<T> {
    /// Creates a shared pool with the specified capacity.
    ///
    /// # Errors
    ///
    /// Same as [`PoolAllocator::new`].
    pub fn new(capacity: usize) -> MemoryResult<Self> {
        Ok(Self::from_pool(PoolAllocator::new(capacity)?))
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn from_pool(pool: PoolAllocator<T>) -> Self {
        Self {
            inner: Mutex::new(pool),
        }
    }

    /// Returns true if at least one slot is free.
    #[must_use]
    pub fn has_free(&self) -> bool {
        self.inner.lock().has_free()
    }

    /// Returns the number of live objects.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner.lock().live_count()
    }

    /// Stores `value` in a free slot.
    ///
    /// # Errors
    ///
    /// Same as [`PoolAllocator::create`].
    pub fn create(&self, value: T) -> MemoryResult<PoolHandle<T>> {
        self.inner.lock().create(value)
    }

    /// Drops the object behind `handle` and frees its slot.
    ///
    /// The value is dropped after the lock is released.
    ///
    /// # Errors
    ///
    /// Same as [`PoolAllocator::release`].
    pub fn release(&self, handle: PoolHandle<T>) -> MemoryResult<()> {
        self.take(handle).map(drop)
    }

    /// Moves the object behind `handle` out and frees its slot.
    ///
    /// # Errors
    ///
    /// Same as [`PoolAllocator::take`].
    pub fn take(&self, handle: PoolHandle<T>) -> MemoryResult<T> {
        self.inner.lock().take(handle)
    }

    /// Runs `f` on the object behind `handle` while holding the lock.
    pub fn with<R>(&self, handle: PoolHandle<T>, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.inner.lock().get(handle).map(f)
    }

    /// Runs `f` on the object behind `handle` mutably while holding the lock.
    pub fn with_mut<R>(&self, handle: PoolHandle<T>, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.inner.lock().get_mut(handle).map(f)
    }

    /// Locks the pool for a batch of operations.
    pub fn lock(&self) -> MutexGuard<'_, PoolAllocator<T>> {
        self.inner.lock()
    }

    /// Consumes the wrapper and returns the pool.
    #[must_use]
    pub fn into_inner(self) -> PoolAllocator<T> {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_concurrent_create_release() {
        let pool: SharedPool<u64> = SharedPool::new(64).unwrap();

        thread::scope(|scope| {
            for worker in 0..4u64 {
                let pool = &pool;
                scope.spawn(move || {
                    for round in 0..100 {
                        let handle = pool.create(worker * 1000 + round).unwrap();
                        assert_eq!(pool.with(handle, |v| *v), Some(worker * 1000 + round));
                        pool.release(handle).unwrap();
                    }
                });
            }
        });

        assert_eq!(pool.live_count(), 0);
        assert!(pool.has_free());
    }

    #[test]
    fn test_batch_under_one_lock() {
        let pool: SharedPool<u32> = SharedPool::new(2).unwrap();
        {
            let mut guard = pool.lock();
            let _ = guard.create(1).unwrap();
            let _ = guard.create(2).unwrap();
            assert!(!guard.has_free());
        }
        let inner = pool.into_inner();
        assert_eq!(inner.live_count(), 2);
    }

    #[test]
    fn test_with_mut_updates_value() {
        let pool: SharedPool<u32> = SharedPool::new(1).unwrap();
        let handle = pool.create(1).unwrap();

        assert_eq!(pool.with_mut(handle, |v| {
            *v += 41;
            *v
        }), Some(42));
        assert_eq!(pool.take(handle), Ok(42));
        assert_eq!(pool.with(handle, |v| *v), None);
    }
}
