//! # Particle System
//!
//! Short-lived particles stored in a fixed [`PoolAllocator`]. Spawning and
//! expiring never touch the heap; the pool capacity is the particle budget.

use kiln_core::{MemoryResult, PoolAllocator, PoolHandle};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Gravity applied every update, in units per second squared.
pub const GRAVITY: f32 = -9.81;

/// A single simulated particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    /// World position.
    pub position: [f32; 3],
    /// Velocity in units per second.
    pub velocity: [f32; 3],
    /// Seconds since spawn.
    pub age: f32,
    /// Seconds the particle lives.
    pub lifetime: f32,
}

impl Particle {
    /// Returns true once the particle has outlived its lifetime.
    #[inline]
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.age >= self.lifetime
    }

    fn integrate(&mut self, delta_time: f32) {
        self.velocity[1] += GRAVITY * delta_time;
        for axis in 0..3 {
            self.position[axis] += self.velocity[axis] * delta_time;
        }
        self.age += delta_time;
    }
}

/// Outcome of one spawn request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpawnReport {
    /// Particles created.
    pub spawned: u32,
    /// Particles dropped because the pool was full.
    pub rejected: u32,
}

/// Pool-backed particle emitter.
pub struct ParticleSystem {
    pool: PoolAllocator<Particle>,
    /// Reused every update to collect handles to release.
    expired: Vec<PoolHandle<Particle>>,
    rng: ChaCha8Rng,
    lifetime: f32,
}

impl ParticleSystem {
    /// Creates an emitter with room for `capacity` live particles.
    ///
    /// `seed` makes spawn velocities deterministic.
    ///
    /// # Errors
    ///
    /// Fails if the pool cannot be built.
    pub fn new(capacity: usize, lifetime: f32, seed: u64) -> MemoryResult<Self> {
        Ok(Self {
            pool: PoolAllocator::new(capacity)?,
            expired: Vec::with_capacity(capacity),
            rng: ChaCha8Rng::seed_from_u64(seed),
            lifetime,
        })
    }

    /// Number of live particles.
    #[inline]
    #[must_use]
    pub const fn live_count(&self) -> usize {
        self.pool.live_count()
    }

    /// Maximum number of live particles.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Read access to the backing pool.
    #[must_use]
    pub const fn pool(&self) -> &PoolAllocator<Particle> {
        &self.pool
    }

    /// Spawns up to `count` particles at `origin`.
    ///
    /// Stops at the first full slot; the remainder is reported as rejected.
    ///
    /// # Errors
    ///
    /// Propagates pool errors other than exhaustion.
    pub fn spawn(&mut self, origin: [f32; 3], count: u32) -> MemoryResult<SpawnReport> {
        let mut report = SpawnReport::default();
        for _ in 0..count {
            if !self.pool.has_free() {
                report.rejected = count - report.spawned;
                break;
            }
            let lifetime = self.lifetime * self.rng.gen_range(0.5..=1.0);
            let velocity = [
                self.rng.gen_range(-1.0..=1.0),
                self.rng.gen_range(2.0..=6.0),
                self.rng.gen_range(-1.0..=1.0),
            ];
            self.pool.create(Particle {
                position: origin,
                velocity,
                age: 0.0,
                lifetime,
            })?;
            report.spawned += 1;
        }
        Ok(report)
    }

    /// Advances every particle and releases the expired ones.
    ///
    /// Returns how many particles expired.
    ///
    /// # Errors
    ///
    /// Propagates a rejected release, which would mean a corrupted handle.
    pub fn update(&mut self, delta_time: f32) -> MemoryResult<usize> {
        self.expired.clear();
        for (handle, particle) in self.pool.iter_mut() {
            particle.integrate(delta_time);
            if particle.is_expired() {
                self.expired.push(handle);
            }
        }
        for &handle in &self.expired {
            self.pool.release(handle)?;
        }
        Ok(self.expired.len())
    }
}
