//! # Particle Simulation Engine
//!
//! Concurrent world of charged particles: every particle advances on its own
//! timer while one aggregator per world keeps recomputing pairwise forces,
//! all serialised by a single world lock.

pub mod context;
pub mod error;
pub mod params;
pub mod particle;
pub mod registry;
pub mod scheduler;
pub mod world;

pub use context::*;
pub use error::*;
pub use params::*;
pub use particle::Particle;
pub use registry::ParticleId;
pub use world::World;
