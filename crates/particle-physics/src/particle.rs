//! Particle kinematic state and read-only snapshots

use bytemuck::{Pod, Zeroable};
use glam::DVec2;

use crate::barrier::{contain, Barrier};
use crate::forces::{drag_acceleration, total_force};

/// Sign of the electric charge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}

impl Polarity {
    pub fn of(charge: f64) -> Self {
        if charge > 0.0 {
            Polarity::Positive
        } else if charge < 0.0 {
            Polarity::Negative
        } else {
            Polarity::Neutral
        }
    }
}

/// Physical state of one point-mass, point-charge particle
///
/// `mass`, `charge` and `radius` are fixed at creation. Everything else is
/// advanced by explicit Euler steps and by the force pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleState {
    pub mass: f64,
    pub charge: f64,
    pub radius: f64,

    pub position: DVec2,
    pub velocity: DVec2,
    pub acceleration: DVec2,
    /// Force accumulated during the current force pass
    pub force: DVec2,

    /// Cached `velocity.length_squared()`
    pub v_sq: f64,
    /// Cached `acceleration.length_squared()`
    pub a_sq: f64,
}

impl ParticleState {
    pub fn new(mass: f64, charge: f64, radius: f64, position: DVec2, velocity: DVec2) -> Self {
        Self {
            mass,
            charge,
            radius,
            position,
            velocity,
            acceleration: DVec2::ZERO,
            force: DVec2::ZERO,
            v_sq: velocity.length_squared(),
            a_sq: 0.0,
        }
    }

    pub fn at_rest(mass: f64, charge: f64, radius: f64, position: DVec2) -> Self {
        Self::new(mass, charge, radius, position, DVec2::ZERO)
    }

    pub fn polarity(&self) -> Polarity {
        Polarity::of(self.charge)
    }

    /// Kinetic energy, ½·m·v²
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.v_sq
    }

    /// Zero the accumulated force so it can be summed up again
    pub fn reset_force(&mut self) {
        self.force = DVec2::ZERO;
    }

    /// Accumulate the force `other` exerts on this particle
    pub fn add_force_from(&mut self, other: &ParticleState) {
        self.force += total_force(self, other);
    }

    /// Turn the accumulated force into acceleration
    ///
    /// Very fast particles also get a drag term so the discretised
    /// integration cannot pump energy into them without bound.
    pub fn apply_force(&mut self) {
        self.acceleration = self.force / self.mass;
        self.acceleration += drag_acceleration(self.velocity, self.v_sq);
        self.a_sq = self.acceleration.length_squared();
    }

    /// One explicit Euler step of `dt` simulated seconds, then containment
    pub fn integrate(&mut self, dt: f64, barrier: &Barrier) {
        self.position += self.velocity * dt;
        self.velocity += self.acceleration * dt;
        self.v_sq = self.velocity.length_squared();

        let (position, velocity) = contain(self.position, self.velocity, barrier);
        self.position = position;
        self.velocity = velocity;
    }

    pub fn reset_velocity(&mut self) {
        self.velocity = DVec2::ZERO;
        self.v_sq = 0.0;
    }

    /// Point velocity perpendicular to the current acceleration
    pub fn make_centripetal_velocity(&mut self) {
        self.velocity = self.acceleration.perp();
        self.v_sq = self.velocity.length_squared();
    }

    /// Displace the particle, bypassing the dynamics, and stop it
    pub fn move_by(&mut self, delta: DVec2) {
        self.position += delta;
        self.reset_velocity();
    }
}

/// Plain-data copy of a particle, safe to hand to a renderer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ParticleSnapshot {
    pub id: u64,
    pub mass: f64,
    pub charge: f64,
    pub radius: f64,
    /// Remaining simulated seconds (may be `f64::INFINITY`)
    pub lifetime: f64,
    pub position: [f64; 2],
    pub velocity: [f64; 2],
    pub acceleration: [f64; 2],
    pub kinetic_energy: f64,
}

impl ParticleSnapshot {
    pub fn new(id: u64, state: &ParticleState, lifetime: f64) -> Self {
        Self {
            id,
            mass: state.mass,
            charge: state.charge,
            radius: state.radius,
            lifetime,
            position: state.position.to_array(),
            velocity: state.velocity.to_array(),
            acceleration: state.acceleration.to_array(),
            kinetic_energy: state.kinetic_energy(),
        }
    }

    pub fn polarity(&self) -> Polarity {
        Polarity::of(self.charge)
    }

    /// Opacity for rendering: particles fade out during their last second
    pub fn fade(&self) -> f64 {
        self.lifetime.clamp(0.0, 1.0)
    }
}
