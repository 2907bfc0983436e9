//! Particle handles and the per-particle motion task

use std::sync::Weak;
use std::time::Instant;

use glam::DVec2;
use particle_physics::ParticleSnapshot;

use crate::registry::{Entry, ParticleId};
use crate::scheduler::{Task, TaskHandle, Tick};
use crate::world::WorldShared;

/// Advances one particle: every tick integrates its motion over the
/// wall-clock time since the previous tick (scaled by the world's time
/// scale), ages it, and deregisters it once its lifetime runs out.
pub(crate) struct MotionTask {
    id: ParticleId,
    world: Weak<WorldShared>,
    last_tick: Instant,
}

impl MotionTask {
    pub fn new(id: ParticleId, world: Weak<WorldShared>) -> Self {
        Self {
            id,
            world,
            last_tick: Instant::now(),
        }
    }
}

impl Task for MotionTask {
    fn tick(&mut self) -> Tick {
        let Some(world) = self.world.upgrade() else {
            return Tick::Done;
        };

        let now = Instant::now();
        let dt = world.params.time_scale() * now.duration_since(self.last_tick).as_secs_f64();
        self.last_tick = now;
        let paused = world.params.is_paused();

        let mut registry = world.lock();
        let Some(entry) = registry.get_mut(self.id) else {
            // removed by someone else; nothing left to deregister
            return Tick::Done;
        };

        if !paused {
            entry.state.integrate(dt, &world.barrier());
        }
        entry.lifetime -= dt;
        if entry.lifetime >= 0.0 && !entry.killed {
            return Tick::Sleep;
        }

        world.remove_locked(&mut registry, self.id);
        Tick::Done
    }
}

/// Handle to a particle living in a [`World`](crate::World)
///
/// Cheap to clone. Holds no strong reference to the world: once the
/// particle is dead or the world is gone, reads return `None` and mutators
/// do nothing.
#[derive(Debug, Clone)]
pub struct Particle {
    id: ParticleId,
    world: Weak<WorldShared>,
    task: TaskHandle,
}

impl Particle {
    pub(crate) fn new(id: ParticleId, world: Weak<WorldShared>, task: TaskHandle) -> Self {
        Self { id, world, task }
    }

    pub fn id(&self) -> ParticleId {
        self.id
    }

    fn read<R>(&self, f: impl FnOnce(&Entry) -> R) -> Option<R> {
        let world = self.world.upgrade()?;
        let registry = world.lock();
        registry.get(self.id).map(f)
    }

    fn modify<R>(&self, f: impl FnOnce(&mut Entry) -> R) -> Option<R> {
        let world = self.world.upgrade()?;
        let mut registry = world.lock();
        registry.get_mut(self.id).map(f)
    }

    /// Whether the particle is still registered in its world
    pub fn is_alive(&self) -> bool {
        self.read(|_| ()).is_some()
    }

    pub fn position(&self) -> Option<DVec2> {
        self.read(|e| e.state.position)
    }

    pub fn velocity(&self) -> Option<DVec2> {
        self.read(|e| e.state.velocity)
    }

    pub fn acceleration(&self) -> Option<DVec2> {
        self.read(|e| e.state.acceleration)
    }

    pub fn kinetic_energy(&self) -> Option<f64> {
        self.read(|e| e.state.kinetic_energy())
    }

    pub fn mass(&self) -> Option<f64> {
        self.read(|e| e.state.mass)
    }

    pub fn charge(&self) -> Option<f64> {
        self.read(|e| e.state.charge)
    }

    pub fn radius(&self) -> Option<f64> {
        self.read(|e| e.state.radius)
    }

    /// Remaining simulated seconds
    pub fn lifetime(&self) -> Option<f64> {
        self.read(|e| e.lifetime)
    }

    pub fn snapshot(&self) -> Option<ParticleSnapshot> {
        self.read(Entry::snapshot)
    }

    /// Displace the particle by `(dx, dy)` and stop it
    pub fn move_by(&self, dx: f64, dy: f64) {
        self.modify(|e| e.state.move_by(DVec2::new(dx, dy)));
    }

    /// Zero the lifetime and wake the motion task, which deregisters the
    /// particle on its next tick. Idempotent; killing a dead particle is a
    /// no-op.
    pub fn kill(&self) {
        let killed = self
            .modify(|e| {
                e.lifetime = 0.0;
                e.killed = true;
            })
            .is_some();
        if killed {
            log::debug!("Killing particle {} (task {})", self.id, self.task.id());
            self.task.wake();
        }
    }
}
