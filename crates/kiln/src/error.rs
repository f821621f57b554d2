//! # Frame Loop Error Types

use kiln_core::{ConfigError, MemoryError};
use thiserror::Error;

/// Errors that stop the frame loop.
#[derive(Error, Debug)]
pub enum FrameLoopError {
    /// An allocator could not be built or misused a handle.
    #[error("memory: {0}")]
    Memory(#[from] MemoryError),

    /// The loop configuration could not be loaded.
    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for frame loop operations.
pub type FrameLoopResult<T> = Result<T, FrameLoopError>;
