//! Pairwise and single-particle forces
//!
//! Electrostatic (Coulomb) and gravitational forces between two particles,
//! plus the speed-dependent drag that keeps explicit Euler integration from
//! running away. All functions are pure; the caller is responsible for
//! holding whatever lock protects the particles it reads.

use glam::DVec2;

use crate::constants::*;
use crate::particle::ParticleState;

/// Squared distance from `p` to `q`, clamped to [`MIN_R_SQ`], and the unit
/// direction from `p` toward `q`
///
/// Coincident particles have no defined direction and get `DVec2::ZERO`,
/// which makes every pairwise force between them vanish instead of blowing up.
pub fn separation(p: &ParticleState, q: &ParticleState) -> (f64, DVec2) {
    let r_vec = q.position - p.position;
    let r_sq = r_vec.length_squared().max(MIN_R_SQ);
    (r_sq, r_vec.normalize_or_zero())
}

/// Signed Coulomb magnitude along the `p -> q` direction
/// F = -k_e * q1 * q2 / r²
///
/// Negative values push `p` away from `q` (like charges repel).
pub fn electrostatic_magnitude(charge_p: f64, charge_q: f64, r_sq: f64) -> f64 {
    -K_E * charge_p * charge_q / r_sq
}

/// Gravitational magnitude along the `p -> q` direction (always attractive)
/// F = k_G * m1 * m2 / r²
pub fn gravitational_magnitude(mass_p: f64, mass_q: f64, r_sq: f64) -> f64 {
    K_G * mass_p * mass_q / r_sq
}

/// Electrostatic force acting on `p` due to `q`
pub fn electrostatic_force(p: &ParticleState, q: &ParticleState) -> DVec2 {
    let (r_sq, dir) = separation(p, q);
    dir * electrostatic_magnitude(p.charge, q.charge, r_sq)
}

/// Gravitational force acting on `p` due to `q`
pub fn gravitational_force(p: &ParticleState, q: &ParticleState) -> DVec2 {
    let (r_sq, dir) = separation(p, q);
    dir * gravitational_magnitude(p.mass, q.mass, r_sq)
}

/// Total force acting on `p` due to `q`
pub fn total_force(p: &ParticleState, q: &ParticleState) -> DVec2 {
    let (r_sq, dir) = separation(p, q);
    dir * (electrostatic_magnitude(p.charge, q.charge, r_sq)
        + gravitational_magnitude(p.mass, q.mass, r_sq))
}

/// Drag acceleration opposing `velocity`
///
/// Magnitude is `K_DRAG * v²`; zero at or below [`MAX_V_SQ`].
pub fn drag_acceleration(velocity: DVec2, v_sq: f64) -> DVec2 {
    if v_sq <= MAX_V_SQ {
        return DVec2::ZERO;
    }
    -K_DRAG * v_sq * velocity / v_sq.sqrt()
}
