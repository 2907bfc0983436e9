//! Physical constants for the world of particles
//!
//! These are not SI values. They are tuned so that a few hundred unit-mass,
//! unit-charge particles in a window-sized box produce lively motion at
//! ~200 Hz integration rates. Charge interactions dominate gravity by many
//! orders of magnitude, which keeps charged pairs visually dominant.

/// Coulomb constant
pub const K_E: f64 = 5e6;

/// Gravitational constant
/// Only becomes noticeable for very heavy bodies (masses around 1e11 and up)
pub const K_G: f64 = 1e-5;

/// Drag-force constant, applied only above [`MAX_V_SQ`]
pub const K_DRAG: f64 = 1e-4;

/// Minimum squared separation used by the force model
///
/// Acts as a short-range repulsive cutoff: particles closer than
/// `sqrt(MIN_R_SQ)` feel the force they would feel at that distance.
pub const MIN_R_SQ: f64 = 91.0;

/// Squared speed above which drag acts
pub const MAX_V_SQ: f64 = 4e4;

/// Inelastic collision coefficient for the containment box
pub const RESTITUTION: f64 = 0.5;

/// Half-width of the uniform per-axis range for random initial velocities
pub const INITIAL_SPEED: f64 = 100.0;

/// Base radius used when a particle is created without an explicit radius
pub const MIN_RADIUS: f64 = 10.0;

/// Mass given to a particle created with a non-positive mass (the unit mass
/// of spawned pairs)
pub const MIN_MASS: f64 = 1.0;

/// Default simulated-time to wall-clock-time ratio
pub const DEFAULT_TIME_SCALE: f64 = 0.5;

/// Lower bound of the time scale
pub const MIN_TIME_SCALE: f64 = 0.1;

/// Upper bound of the time scale
pub const MAX_TIME_SCALE: f64 = 2.0;
