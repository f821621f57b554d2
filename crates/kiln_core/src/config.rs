//! # Memory Configuration
//!
//! Allocator sizes are loaded once at startup from TOML.
//!
//! ```toml
//! frame_arena_bytes = 65536
//! pool_capacity = 4096
//! log_releases = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default size of the per-frame arena (64 KiB).
pub const DEFAULT_FRAME_ARENA_BYTES: usize = 64 * 1024;

/// Default slot count of object pools.
pub const DEFAULT_POOL_CAPACITY: usize = 4096;

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The text is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Sizes of the allocators an application sets up at startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Capacity in bytes of the arena reset every frame.
    pub frame_arena_bytes: usize,
    /// Slot count of each object pool.
    pub pool_capacity: usize,
    /// Log every arena release at debug level.
    pub log_releases: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            frame_arena_bytes: DEFAULT_FRAME_ARENA_BYTES,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            log_releases: false,
        }
    }
}

impl MemoryConfig {
    /// Parses and validates a TOML document. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed input or unknown keys,
    /// [`ConfigError::Invalid`] on zero sizes.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks that every size can back an allocator.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_arena_bytes == 0 {
            return Err(ConfigError::Invalid("frame_arena_bytes must be non-zero".into()));
        }
        if self.pool_capacity == 0 || u32::try_from(self.pool_capacity).is_err() {
            return Err(ConfigError::Invalid(format!(
                "pool_capacity must be in 1..={}, got {}",
                u32::MAX,
                self.pool_capacity
            )));
        }
        Ok(())
    }
}
