//! # KILN Core Memory Kernel
//!
//! Fixed-capacity allocators for a real-time frame loop:
//! - Pool allocator for same-typed objects released one at a time
//! - Linear (bump) allocator for transient data reclaimed once per frame
//! - Frame strings: text built inside the linear allocator
//!
//! ## Architecture Rules
//!
//! 1. **No heap allocations in the frame** - Buffers are reserved at startup
//! 2. **Exhaustion is a value** - Full pools and arenas return [`MemoryError`]
//! 3. **Release is a boundary** - Arena data cannot outlive the next release
//!
//! ## Example
//!
//! ```rust
//! use kiln_core::{LinearAllocator, PoolAllocator, StringArena};
//!
//! let mut arena = LinearAllocator::new(1024)?;
//! let mut particles: PoolAllocator<[f32; 3]> = PoolAllocator::new(256)?;
//!
//! let spark = particles.create([0.0, 1.0, 0.0])?;
//! let label = arena.cycle(|frame| {
//!     let strings = StringArena::new(frame);
//!     strings
//!         .format(format_args!("live: {}", particles.live_count()))
//!         .map(|text| text.len())
//! })?;
//! assert_eq!(label, 7);
//! particles.release(spark)?;
//! # Ok::<(), kiln_core::MemoryError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod memory;

pub use config::{ConfigError, MemoryConfig};
pub use memory::{
    ArenaStats, FrameString, LinearAllocator, MemoryError, MemoryResult, PoolAllocator,
    PoolHandle, SharedPool, StringArena,
};
