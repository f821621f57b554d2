//! # Memory Error Types
//!
//! All errors that can occur in the allocator layer.

use thiserror::Error;

/// Errors reported by the pool allocator, the linear allocator and the
/// frame-string context built on top of it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Every slot of the pool is live.
    #[error("pool exhausted: all {capacity} slots are live")]
    PoolExhausted {
        /// Fixed slot count of the pool.
        capacity: usize,
    },

    /// The arena cannot satisfy the request before the next release.
    #[error("arena exhausted: requested {requested} bytes, {remaining} of {capacity} remaining")]
    ArenaExhausted {
        /// Bytes requested, including alignment padding.
        requested: usize,
        /// Bytes left before the request.
        remaining: usize,
        /// Total arena size.
        capacity: usize,
    },

    /// A handle issued by another pool was passed to this one.
    #[error("handle belongs to pool {found}, not pool {expected}")]
    ForeignHandle {
        /// Id of the pool the call was made on.
        expected: u32,
        /// Id carried by the handle.
        found: u32,
    },

    /// The slot behind the handle was already released (or reused since).
    #[error("stale handle: slot {index} generation {generation} is no longer live")]
    StaleHandle {
        /// Slot index carried by the handle.
        index: u32,
        /// Generation carried by the handle.
        generation: u32,
    },

    /// Requested capacity cannot back an allocator.
    #[error("invalid capacity: {0}")]
    InvalidCapacity(usize),

    /// Alignment is not a power of two.
    #[error("invalid alignment: {0} is not a power of two")]
    InvalidAlignment(usize),

    /// The backing buffer could not be obtained from the system allocator.
    #[error("backing allocation of {bytes} bytes failed")]
    BackingAllocation {
        /// Size of the failed request in bytes.
        bytes: usize,
    },

    /// A `Display` implementation failed while formatting a frame string.
    #[error("formatting a frame string failed")]
    Format,
}

/// Result type for allocator operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
