//! # Memory Management
//!
//! Pre-allocated pools and arenas for allocation-free frames.
//!
//! ## Design Philosophy
//!
//! All memory is reserved once at startup. During a frame:
//! - No heap allocations
//! - Fixed-size objects come from a [`PoolAllocator`]
//! - Transient data and text come from a [`LinearAllocator`], reset once per
//!   cycle
//!
//! Running out of space is an ordinary condition reported as
//! [`MemoryError`]; nothing here aborts on exhaustion.

mod error;
mod frame_string;
mod linear;
mod pool;
mod shared;

pub use error::{MemoryError, MemoryResult};
pub use frame_string::{FrameString, StringArena};
pub use linear::{ArenaStats, LinearAllocator, BUFFER_ALIGN};
pub use pool::{PoolAllocator, PoolHandle};
pub use shared::SharedPool;
