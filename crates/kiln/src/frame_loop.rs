//! # KILN Frame Loop
//!
//! One frame:
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. SIMULATE                                                         │
//! │    ├─ Integrate live particles (pool)                               │
//! │    └─ Release expired particles (pool slots return to free list)    │
//! │                                                                     │
//! │ 2. SPAWN                                                            │
//! │    └─ Fill free slots, report what did not fit                      │
//! │                                                                     │
//! │ 3. HUD                                                              │
//! │    ├─ Build overlay text in the frame arena (frame strings)         │
//! │    └─ Present each line                                             │
//! │                                                                     │
//! │ 4. END FRAME                                                        │
//! │    └─ Release the frame arena: every string from step 3 is gone     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::time::{Duration, Instant};

use kiln_core::{
    ConfigError, FrameString, LinearAllocator, MemoryConfig, MemoryError, MemoryResult,
    StringArena,
};
use serde::{Deserialize, Serialize};

use crate::error::FrameLoopResult;
use crate::particles::{ParticleSystem, SpawnReport};

/// Maximum allowed frame time before warning.
pub const MAX_FRAME_TIME: Duration = Duration::from_millis(33);

/// Where new particles appear.
const EMITTER_ORIGIN: [f32; 3] = [0.0, 0.0, 0.0];

/// Configuration for the frame loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameLoopConfig {
    /// Allocator sizes.
    pub memory: MemoryConfig,
    /// Target frames per second; sets the fixed time step.
    pub target_fps: u32,
    /// Particles requested every frame.
    pub spawn_per_frame: u32,
    /// Upper bound of a particle's lifetime in seconds.
    pub particle_lifetime: f32,
    /// Seed for deterministic spawning.
    pub seed: u64,
    /// Warn about frames slower than [`MAX_FRAME_TIME`].
    pub enable_timing_logs: bool,
}

impl Default for FrameLoopConfig {
    fn default() -> Self {
        Self {
            memory: MemoryConfig::default(),
            target_fps: 60,
            spawn_per_frame: 64,
            particle_lifetime: 2.0,
            seed: 0x4B49_4C4E,
            enable_timing_logs: true,
        }
    }
}

impl FrameLoopConfig {
    /// Parses and validates a TOML document. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed input, [`ConfigError::Invalid`] on
    /// out-of-range values.
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
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks every value.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.memory.validate()?;
        if self.target_fps == 0 {
            return Err(ConfigError::Invalid("target_fps must be non-zero".into()));
        }
        if !(self.particle_lifetime.is_finite() && self.particle_lifetime > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "particle_lifetime must be positive, got {}",
                self.particle_lifetime
            )));
        }
        Ok(())
    }

    /// Fixed simulation step in seconds.
    #[must_use]
    pub fn time_step(&self) -> f32 {
        1.0 / self.target_fps as f32
    }
}

/// What happened in one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame number.
    pub frame: u64,
    /// Total frame time in microseconds.
    pub total_us: u64,
    /// Particles spawned.
    pub spawned: u32,
    /// Spawn requests rejected by the full pool.
    pub rejected: u32,
    /// Particles that expired.
    pub expired: usize,
    /// Particles alive at the end of the frame.
    pub live_particles: usize,
    /// HUD lines presented.
    pub hud_lines: usize,
    /// HUD lines skipped because the frame arena was full.
    pub hud_lines_dropped: usize,
    /// Frame arena bytes used before the release.
    pub arena_used: usize,
}

/// The frame loop orchestrator.
///
/// Owns the particle pool and the frame arena, and releases the arena at the
/// end of every frame.
pub struct FrameLoop {
    /// Per-frame scratch memory.
    arena: LinearAllocator,
    /// Pool-backed particles.
    particles: ParticleSystem,
    /// Configuration.
    config: FrameLoopConfig,
    /// Frame counter.
    frame_count: u64,
    /// Accumulated frame statistics.
    stats_accumulator: FrameStatsAccumulator,
}

impl FrameLoop {
    /// Creates a frame loop with every buffer reserved upfront.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or an allocator cannot be
    /// built.
    pub fn new(config: FrameLoopConfig) -> FrameLoopResult<Self> {
        config.validate()?;
        let arena = LinearAllocator::new(config.memory.frame_arena_bytes)?;
        let particles = ParticleSystem::new(
            config.memory.pool_capacity,
            config.particle_lifetime,
            config.seed,
        )?;

        tracing::info!(
            arena_bytes = config.memory.frame_arena_bytes,
            pool_capacity = config.memory.pool_capacity,
            target_fps = config.target_fps,
            "frame loop ready"
        );

        Ok(Self {
            arena,
            particles,
            config,
            frame_count: 0,
            stats_accumulator: FrameStatsAccumulator::new(),
        })
    }

    /// Runs one frame at the fixed time step, discarding the HUD text.
    ///
    /// # Errors
    ///
    /// See [`step_with`](Self::step_with).
    pub fn step(&mut self) -> FrameLoopResult<FrameStats> {
        self.step_with(|_| {})
    }

    /// Runs one frame at the fixed time step and hands every HUD line to
    /// `present` before the frame arena is released.
    ///
    /// # Errors
    ///
    /// Fails only on handle corruption; a full pool or arena is reported in
    /// the returned stats instead.
    pub fn step_with(&mut self, mut present: impl FnMut(&str)) -> FrameLoopResult<FrameStats> {
        let start = Instant::now();
        let delta_time = self.config.time_step();

        let expired = self.particles.update(delta_time)?;
        let SpawnReport { spawned, rejected } = self
            .particles
            .spawn(EMITTER_ORIGIN, self.config.spawn_per_frame)?;

        let frame = self.frame_count;
        let particles = &self.particles;
        let previous = self.stats_accumulator.last;
        let (hud_lines, hud_lines_dropped, arena_used) = self.arena.cycle(|arena| {
            let strings = StringArena::new(arena);
            let mut presented = 0;
            let mut dropped = 0;
            for line in build_hud(strings, frame, particles, previous) {
                match line {
                    Ok(text) => {
                        present(text.as_str());
                        presented += 1;
                    }
                    Err(MemoryError::ArenaExhausted { requested, remaining, .. }) => {
                        tracing::warn!(frame, requested, remaining, "HUD line dropped: frame arena full");
                        dropped += 1;
                    }
                    Err(other) => tracing::warn!(frame, error = %other, "HUD line dropped"),
                }
            }
            (presented, dropped, arena.used())
        });
        if self.config.memory.log_releases {
            tracing::debug!(frame, arena_used, "frame arena released");
        }

        let elapsed = start.elapsed();
        let stats = FrameStats {
            frame,
            total_us: u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            spawned,
            rejected,
            expired,
            live_particles: self.particles.live_count(),
            hud_lines,
            hud_lines_dropped,
            arena_used,
        };
        self.end_frame(stats, elapsed);
        Ok(stats)
    }

    /// Runs `frames` frames back to back.
    ///
    /// # Errors
    ///
    /// Stops at the first failing frame.
    pub fn run(&mut self, frames: u64) -> FrameLoopResult<&FrameStatsAccumulator> {
        for _ in 0..frames {
            self.step()?;
        }
        Ok(&self.stats_accumulator)
    }

    fn end_frame(&mut self, stats: FrameStats, elapsed: Duration) {
        self.frame_count += 1;
        self.stats_accumulator.record(stats);

        // Once per simulated second.
        if self.frame_count % u64::from(self.config.target_fps) == 0 {
            tracing::info!(
                frame = stats.frame,
                live_particles = stats.live_particles,
                peak_arena_used = self.stats_accumulator.peak_arena_used,
                avg_frame_ms = self.stats_accumulator.avg_frame_ms(),
                "frame summary"
            );
        }

        if self.config.enable_timing_logs && elapsed > MAX_FRAME_TIME {
            tracing::warn!(
                frame = stats.frame,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = MAX_FRAME_TIME.as_secs_f64() * 1000.0,
                "frame exceeded budget"
            );
        }
        if stats.rejected > 0 {
            tracing::debug!(frame = stats.frame, rejected = stats.rejected, "particle pool full");
        }
    }

    /// Returns the current frame count.
    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Returns the accumulated statistics.
    #[must_use]
    pub const fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats_accumulator
    }

    /// Returns the frame arena, idle between frames.
    #[must_use]
    pub const fn arena(&self) -> &LinearAllocator {
        &self.arena
    }

    /// Returns the particle system.
    #[must_use]
    pub const fn particles(&self) -> &ParticleSystem {
        &self.particles
    }
}

/// Builds the overlay lines for one frame.
fn build_hud<'a>(
    strings: StringArena<'a>,
    frame: u64,
    particles: &ParticleSystem,
    previous: Option<FrameStats>,
) -> [MemoryResult<FrameString<'a>>; 3] {
    let title = strings
        .format(format_args!("frame {frame}"))
        .and_then(|counter| strings.concat("KILN | ", &counter));
    let pool = strings.format(format_args!(
        "particles {}/{}",
        particles.live_count(),
        particles.capacity()
    ));
    let arena = match previous {
        Some(last) => strings.format(format_args!(
            "arena {}/{} B (last frame)",
            last.arena_used,
            strings.allocator().capacity()
        )),
        None => strings.make_string("arena -"),
    };
    [title, pool, arena]
}

/// Accumulator for frame statistics.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Total frames recorded.
    pub frames_recorded: u64,
    /// Sum of total frame times.
    pub total_us_sum: u64,
    /// Min frame time.
    pub min_frame_us: u64,
    /// Max frame time.
    pub max_frame_us: u64,
    /// Particles spawned over all frames.
    pub spawned: u64,
    /// Spawn requests rejected over all frames.
    pub rejected: u64,
    /// Highest frame arena usage seen.
    pub peak_arena_used: usize,
    /// HUD lines dropped over all frames.
    pub hud_lines_dropped: u64,
    /// Stats of the most recent frame.
    pub last: Option<FrameStats>,
}

impl FrameStatsAccumulator {
    /// Creates a new accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames_recorded: 0,
            total_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            spawned: 0,
            rejected: 0,
            peak_arena_used: 0,
            hud_lines_dropped: 0,
            last: None,
        }
    }

    /// Records a frame's statistics.
    pub fn record(&mut self, stats: FrameStats) {
        self.frames_recorded += 1;
        self.total_us_sum = self.total_us_sum.saturating_add(stats.total_us);
        self.min_frame_us = self.min_frame_us.min(stats.total_us);
        self.max_frame_us = self.max_frame_us.max(stats.total_us);
        self.spawned += u64::from(stats.spawned);
        self.rejected += u64::from(stats.rejected);
        self.peak_arena_used = self.peak_arena_used.max(stats.arena_used);
        self.hud_lines_dropped += stats.hud_lines_dropped as u64;
        self.last = Some(stats);
    }

    /// Returns average frame time in milliseconds.
    #[must_use]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Prints a summary of the statistics.
    pub fn print_summary(&self) {
        println!("╔══════════════════════════════════════════════════════════════════╗");
        println!("║                    FRAME STATISTICS SUMMARY                      ║");
        println!("╚══════════════════════════════════════════════════════════════════╝");
        println!();
        println!("┌─ TIMING ─────────────────────────────────────────────────────────┐");
        println!("│ Frames Recorded:    {}", self.frames_recorded);
        println!("│ Average Frame:      {:.3} ms", self.avg_frame_ms());
        if self.frames_recorded > 0 {
            println!("│ Min Frame:          {:.3} ms", self.min_frame_us as f64 / 1000.0);
            println!("│ Max Frame:          {:.3} ms", self.max_frame_us as f64 / 1000.0);
        }
        println!("└──────────────────────────────────────────────────────────────────┘");
        println!();
        println!("┌─ MEMORY ─────────────────────────────────────────────────────────┐");
        println!("│ Particles Spawned:  {}", self.spawned);
        println!("│ Pool Rejections:    {}", self.rejected);
        println!("│ Peak Arena Use:     {} B", self.peak_arena_used);
        println!("│ HUD Lines Dropped:  {}", self.hud_lines_dropped);
        println!("└──────────────────────────────────────────────────────────────────┘");
    }
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
