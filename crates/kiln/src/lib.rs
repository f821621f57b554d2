//! # KILN
//!
//! The frame loop crate, driving the memory kernel once per frame.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          FRAME LOOP                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌──────────────────┐            ┌──────────────────┐        │
//! │  │  ParticleSystem  │            │  Frame Arena     │        │
//! │  │                  │            │                  │        │
//! │  │  • PoolAllocator │            │  • HUD strings   │        │
//! │  │  • spawn/expire  │            │  • release/frame │        │
//! │  └──────────────────┘            └──────────────────┘        │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `frame_loop`: Frame orchestration and timing
//! - `particles`: Pool-backed particle emitter
//! - `error`: Loop error type

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod frame_loop;
pub mod particles;

pub use kiln_core as core;

pub use error::{FrameLoopError, FrameLoopResult};
pub use frame_loop::{FrameLoop, FrameLoopConfig, FrameStats, FrameStatsAccumulator};
pub use particles::{Particle, ParticleSystem, SpawnReport};
