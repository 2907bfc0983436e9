//! World of particles: registry, force aggregator and controls
//!
//! A world owns one coarse lock (the registry mutex, see [`crate::registry`]),
//! one aggregator thread that recomputes forces roughly every tick, and a
//! bounded rayon pool ticking every particle's motion task.
//! Worlds share nothing with each other.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use glam::DVec2;
use particle_physics::{Barrier, ParticleSnapshot, ParticleState, MIN_MASS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::context::{GraphicsHandle, RenderingContext};
use crate::error::Result;
use crate::params::{WorldConfig, WorldParams};
use crate::particle::{MotionTask, Particle};
use crate::registry::{ParticleId, Registry};
use crate::scheduler::{Scheduler, TaskHandle};

/// Distance between the two members of a spawned charged pair, per axis
const PAIR_SPREAD: f64 = 100.0;

/// Extra random lifetime given to each member of a spawned pair
const PAIR_LIFETIME_JITTER: f64 = 2.0;

/// State shared between the world handle, the aggregator and motion tasks
pub(crate) struct WorldShared {
    registry: Mutex<Registry>,
    pub params: WorldParams,
    pub config: WorldConfig,
    context: Arc<dyn RenderingContext>,
}

impl WorldShared {
    /// Take the world lock
    pub fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Containment box, read from the context. Callers integrating particles
    /// hold the world lock while reading it.
    pub fn barrier(&self) -> Barrier {
        self.context.barrier()
    }

    /// Deregister a particle. Must be called with the world lock held.
    ///
    /// Returns `false` (and stays silent) if the particle was already gone.
    pub fn remove_locked(&self, registry: &mut Registry, id: ParticleId) -> bool {
        if registry.remove(id).is_none() {
            return false;
        }
        log::debug!("Removed particle {} ({} left)", id, registry.len());
        self.context.on_particle_count_changed(registry.len());
        true
    }

    fn calculate_interactions(&self) {
        let mut registry = self.lock();
        registry.calculate_interactions(thread::yield_now);
    }
}

/// A bounded 2D world of interacting charged particles
///
/// Dropping the world stops the aggregator, kills every live particle and
/// waits for the motion tasks to drain.
pub struct World {
    aggregator: Option<JoinHandle<()>>,
    /// Dropped to stop the aggregator
    stop: Option<Sender<()>>,
    scheduler: Scheduler,
    shared: Arc<WorldShared>,
}

impl World {
    /// Start a world with an OS-seeded random source
    pub fn new(config: WorldConfig, context: Arc<dyn RenderingContext>) -> Result<Self> {
        Self::with_rng(config, context, StdRng::from_os_rng())
    }

    /// Start a world drawing initial velocities and radii from `rng`
    pub fn with_rng(
        config: WorldConfig,
        context: Arc<dyn RenderingContext>,
        rng: StdRng,
    ) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(WorldShared {
            registry: Mutex::new(Registry::new(rng)),
            params: WorldParams::new(&config),
            config,
            context,
        });

        let scheduler = Scheduler::new(
            "particle-motion",
            shared.config.workers,
            shared.config.tick,
        )?;

        let (stop, stopped) = bounded(0);
        let aggregator_shared = Arc::clone(&shared);
        let aggregator = thread::Builder::new()
            .name("world-aggregator".into())
            .spawn(move || run_aggregator(&aggregator_shared, &stopped))?;

        log::info!(
            "World started (tick {:?}, time scale {:.2})",
            shared.config.tick,
            shared.params.time_scale()
        );

        Ok(Self {
            aggregator: Some(aggregator),
            stop: Some(stop),
            scheduler,
            shared,
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.shared.config
    }

    /// Add a particle and start its motion task
    ///
    /// A non-positive `radius` picks a random one; `lifetime` may be
    /// `f64::INFINITY` for an immortal particle.
    pub fn add_particle(
        &self,
        mass: f64,
        charge: f64,
        position: DVec2,
        radius: f64,
        lifetime: f64,
    ) -> Particle {
        let mut registry = self.shared.lock();
        self.insert_locked(&mut registry, mass, charge, position, radius, lifetime)
    }

    /// Register a particle and start its motion task in one critical
    /// section. Must be called with the world lock held.
    fn insert_locked(
        &self,
        registry: &mut Registry,
        mass: f64,
        charge: f64,
        position: DVec2,
        radius: f64,
        lifetime: f64,
    ) -> Particle {
        let mass = if mass.is_finite() && mass > 0.0 {
            mass
        } else {
            log::warn!("particle mass {} clamped to {}", mass, MIN_MASS);
            MIN_MASS
        };

        let speed = self.shared.config.initial_speed;
        let velocity = DVec2::new(
            registry.rng.random_range(-speed..speed),
            registry.rng.random_range(-speed..speed),
        );
        let radius = if radius > 0.0 {
            radius
        } else {
            let base = self.shared.config.min_radius;
            base + (base - radius) * registry.rng.random::<f64>()
        };

        let state = ParticleState::new(mass, charge, radius, position, velocity);
        let world = Arc::downgrade(&self.shared);
        let entry = registry.insert(state, lifetime, |id| {
            self.scheduler
                .spawn(Box::new(MotionTask::new(id, world.clone())))
        });
        let particle = Particle::new(entry.id, world, entry.task.clone());
        log::debug!(
            "Added particle {} (m={}, q={}, r={:.1}, T={:.1}) at ({:.1}, {:.1})",
            particle.id(),
            mass,
            charge,
            radius,
            lifetime,
            position.x,
            position.y
        );
        self.shared.context.on_particle_count_changed(registry.len());
        particle
    }

    /// Register a +1/-1 unit-mass pair near a random anchor inside `area`
    fn insert_pair_locked(
        &self,
        registry: &mut Registry,
        area: &Barrier,
        lifetime: f64,
    ) {
        let anchor = DVec2::new(
            area.x_beg + (area.width() - PAIR_SPREAD).max(0.0) * registry.rng.random::<f64>(),
            area.y_beg + (area.height() - PAIR_SPREAD).max(0.0) * registry.rng.random::<f64>(),
        );

        let offset = DVec2::new(registry.rng.random(), registry.rng.random()) * PAIR_SPREAD;
        let jitter = PAIR_LIFETIME_JITTER * registry.rng.random::<f64>();
        self.insert_locked(registry, 1.0, 1.0, anchor + offset, 0.0, lifetime + jitter);

        let offset = DVec2::new(registry.rng.random(), registry.rng.random()) * PAIR_SPREAD;
        let jitter = PAIR_LIFETIME_JITTER * registry.rng.random::<f64>();
        self.insert_locked(registry, 1.0, -1.0, anchor - offset, 0.0, lifetime + jitter);
    }

    /// Remove a particle right away. Returns `false` if it was not live.
    pub fn remove_particle(&self, id: ParticleId) -> bool {
        let (removed, task) = {
            let mut registry = self.shared.lock();
            let task = registry.get(id).map(|e| e.task.clone());
            (self.shared.remove_locked(&mut registry, id), task)
        };
        // let the motion task notice and finish
        if let Some(task) = task {
            task.wake();
        }
        removed
    }

    pub fn particle_count(&self) -> usize {
        self.shared.lock().len()
    }

    /// Handle for a live particle
    pub fn particle(&self, id: ParticleId) -> Option<Particle> {
        let task = self.shared.lock().get(id)?.task.clone();
        Some(Particle::new(id, Arc::downgrade(&self.shared), task))
    }

    /// Handles for every live particle
    pub fn particles(&self) -> Vec<Particle> {
        let registry = self.shared.lock();
        registry
            .iter()
            .map(|e| Particle::new(e.id, Arc::downgrade(&self.shared), e.task.clone()))
            .collect()
    }

    /// Kill a particle. See [`Particle::kill`].
    pub fn kill(&self, id: ParticleId) {
        let task = self.shared.lock().get_mut(id).map(|e| {
            e.lifetime = 0.0;
            e.killed = true;
            e.task.clone()
        });
        if let Some(task) = task {
            log::debug!("Killing particle {} (task {})", id, task.id());
            task.wake();
        }
    }

    /// Kill every live particle. Returns how many were signalled.
    pub fn kill_all(&self) -> usize {
        let tasks: Vec<TaskHandle> = {
            let mut registry = self.shared.lock();
            registry
                .iter_mut()
                .map(|e| {
                    e.lifetime = 0.0;
                    e.killed = true;
                    e.task.clone()
                })
                .collect()
        };
        for task in &tasks {
            task.wake();
        }
        if !tasks.is_empty() {
            log::debug!("Killed {} particles", tasks.len());
        }
        tasks.len()
    }

    /// Copy of every live particle, ordered by id
    pub fn snapshot(&self) -> Vec<ParticleSnapshot> {
        let mut snapshots: Vec<_> = self.shared.lock().iter().map(|e| e.snapshot()).collect();
        snapshots.sort_by_key(|s| s.id);
        snapshots
    }

    /// Human-readable table of every particle's kinematic state
    pub fn dump(&self) -> String {
        let snapshots = self.snapshot();
        let mut out = format!(
            "{:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}\n",
            "lifetime", "xPos", "yPos", "vx", "vy", "ax", "ay"
        );
        for s in &snapshots {
            let _ = writeln!(
                out,
                "{:8.1} {:8.1} {:8.1} {:8.1} {:8.1} {:8.1} {:8.1}",
                s.lifetime,
                s.position[0],
                s.position[1],
                s.velocity[0],
                s.velocity[1],
                s.acceleration[0],
                s.acceleration[1]
            );
        }
        let _ = writeln!(out, "Total {} particles", snapshots.len());
        log::debug!("World dump:\n{}", out);
        out
    }

    /// Stop every particle
    pub fn reset_velocities(&self) {
        for entry in self.shared.lock().iter_mut() {
            entry.state.reset_velocity();
        }
    }

    /// Turn every particle's velocity perpendicular to its acceleration
    pub fn make_centripetal_velocities(&self) {
        for entry in self.shared.lock().iter_mut() {
            entry.state.make_centripetal_velocity();
        }
    }

    /// One force pass on the calling thread, same as the aggregator's
    pub fn calculate_interactions(&self) {
        self.shared.calculate_interactions();
    }

    pub fn time_scale(&self) -> f64 {
        self.shared.params.time_scale()
    }

    /// Adjust the time scale, clamped to the configured bounds
    pub fn inc_time_scale(&self, delta: f64) -> f64 {
        let scale = self.shared.params.inc_time_scale(delta);
        log::debug!("Time scale {:.2}", scale);
        scale
    }

    pub fn is_paused(&self) -> bool {
        self.shared.params.is_paused()
    }

    pub fn set_paused(&self, paused: bool) {
        self.shared.params.set_paused(paused);
    }

    /// Freeze or resume force computation and integration
    pub fn toggle_paused(&self) -> bool {
        let paused = self.shared.params.toggle_paused();
        log::info!("World {}", if paused { "paused" } else { "resumed" });
        paused
    }

    pub fn is_running(&self) -> bool {
        self.shared.params.is_running()
    }

    pub fn barrier(&self) -> Barrier {
        self.shared.barrier()
    }

    pub fn graphics_handle(&self) -> Option<GraphicsHandle> {
        self.shared.context.graphics_handle()
    }

    /// Spawn `count` oppositely charged pairs somewhere inside `area`
    ///
    /// Does nothing if the world already holds `max_particles` or more.
    /// Each particle lives `lifetime` plus up to two random seconds. Returns
    /// the number of pairs spawned.
    pub fn spawn_charged_pairs(
        &self,
        count: usize,
        lifetime: f64,
        area: Barrier,
        max_particles: usize,
    ) -> usize {
        let mut registry = self.shared.lock();
        if registry.len() >= max_particles {
            return 0;
        }
        for _ in 0..count {
            self.insert_pair_locked(&mut registry, &area, lifetime);
        }
        count
    }

    /// Seed an empty world
    ///
    /// Adds an immortal heavy neutral mass left of the barrier's centre, an
    /// immortal lighter satellite at the centre, and one immortal charged
    /// pair. Returns the heavy mass, or `None` if the world was not empty.
    pub fn populate_if_empty(&self) -> Option<Particle> {
        let barrier = self.shared.barrier();
        let center = barrier.center();

        let mut registry = self.shared.lock();
        if !registry.is_empty() {
            return None;
        }
        let heavy = self.insert_locked(
            &mut registry,
            1e12,
            0.0,
            center - DVec2::new(200.0, 0.0),
            25.0,
            f64::INFINITY,
        );
        self.insert_locked(&mut registry, 1e11, 0.0, center, 20.0, f64::INFINITY);
        self.insert_pair_locked(&mut registry, &barrier, f64::INFINITY);
        Some(heavy)
    }

    /// Stop and join the aggregator. Particles keep moving until they
    /// expire or are killed. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shared.params.stop() {
            drop(self.stop.take());
        }
        if let Some(aggregator) = self.aggregator.take() {
            if aggregator.join().is_err() {
                log::error!("force aggregator panicked");
            }
        }
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.shutdown();
        self.kill_all();
        self.scheduler.close();
        log::info!("World stopped");
    }
}

fn run_aggregator(shared: &WorldShared, stopped: &Receiver<()>) {
    log::info!("Force aggregator started");
    let ticker = tick(shared.config.tick);
    let mut passes: u64 = 0;
    loop {
        select! {
            recv(stopped) -> _ => break,
            recv(ticker) -> _ => {}
        }
        if shared.params.is_paused() {
            continue;
        }
        shared.calculate_interactions();
        passes += 1;
        if passes % 1000 == 0 {
            log::trace!("{} force passes", passes);
        }
    }
    log::info!("Force aggregator stopped after {} passes", passes);
}
