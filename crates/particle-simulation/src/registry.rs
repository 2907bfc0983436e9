//! The set of live particles of one world
//!
//! The registry holds the complete kinematic state of every live particle,
//! so a `&mut Registry` is the only way to touch that state. The world keeps
//! its registry behind a single mutex; that mutex is the one coarse lock of
//! the simulation and serialises:
//!
//! - structural changes (insert/remove),
//! - the aggregator's force pass,
//! - each particle's integration step and lifetime update,
//! - batch mutators (velocity reset, centripetal velocities, kill-all),
//! - renderer reads (snapshots, accessors) and the barrier read that
//!   accompanies an integration step.

use std::collections::HashMap;
use std::fmt;

use particle_physics::{ParticleSnapshot, ParticleState};
use rand::rngs::StdRng;

use crate::scheduler::TaskHandle;

/// Identity of a particle, unique within its world for the world's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleId(pub u64);

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub(crate) struct Entry {
    pub id: ParticleId,
    pub state: ParticleState,
    /// Remaining simulated seconds; the particle is dead once negative
    pub lifetime: f64,
    pub killed: bool,
    /// Motion task, started together with the registration
    pub task: TaskHandle,
}

impl Entry {
    pub fn snapshot(&self) -> ParticleSnapshot {
        ParticleSnapshot::new(self.id.0, &self.state, self.lifetime)
    }
}

pub(crate) struct Registry {
    entries: Vec<Entry>,
    index: HashMap<ParticleId, usize>,
    next_id: u64,
    /// Source for random initial velocities and radii
    pub rng: StdRng,
}

impl Registry {
    pub fn new(rng: StdRng) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            next_id: 0,
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a new particle under a fresh identity; `start` launches its
    /// motion task
    pub fn insert(
        &mut self,
        state: ParticleState,
        lifetime: f64,
        start: impl FnOnce(ParticleId) -> TaskHandle,
    ) -> &Entry {
        let id = ParticleId(self.next_id);
        self.next_id += 1;
        let task = start(id);
        let slot = self.entries.len();
        self.index.insert(id, slot);
        self.entries.push(Entry {
            id,
            state,
            lifetime,
            killed: false,
            task,
        });
        &self.entries[slot]
    }

    /// Remove a particle. `None` if it was not registered.
    pub fn remove(&mut self, id: ParticleId) -> Option<Entry> {
        let slot = self.index.remove(&id)?;
        let entry = self.entries.swap_remove(slot);
        if let Some(moved) = self.entries.get(slot) {
            self.index.insert(moved.id, slot);
        }
        Some(entry)
    }

    pub fn get(&self, id: ParticleId) -> Option<&Entry> {
        self.index.get(&id).and_then(|&slot| self.entries.get(slot))
    }

    pub fn get_mut(&mut self, id: ParticleId) -> Option<&mut Entry> {
        let slot = *self.index.get(&id)?;
        self.entries.get_mut(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entry> {
        self.entries.iter_mut()
    }

    /// One full force pass: reset, sum pairwise contributions from every
    /// other particle, then apply. Calls `between` after each particle.
    pub fn calculate_interactions(&mut self, mut between: impl FnMut()) {
        for i in 0..self.entries.len() {
            let (before, rest) = self.entries.split_at_mut(i);
            let Some((p, after)) = rest.split_first_mut() else {
                break;
            };

            p.state.reset_force();
            for q in before.iter().chain(after.iter()) {
                p.state.add_force_from(&q.state);
            }
            p.state.apply_force();

            between();
        }
    }
}
