//! # Particle Physics
//!
//! Point-mass, point-charge particles in a bounded 2D world: the force model
//! (Coulomb + gravity + drag with a near-field clamp), explicit Euler
//! integration and the inelastic containment box.

pub mod barrier;
pub mod constants;
pub mod forces;
pub mod particle;

pub use barrier::*;
pub use constants::*;
pub use forces::*;
pub use particle::*;
