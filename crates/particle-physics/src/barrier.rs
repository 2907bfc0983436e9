//! Infinite potential barrier (a 2D box) keeping particles inside the world

use glam::DVec2;

use crate::constants::RESTITUTION;

/// Rectangular containment region, given as `(x_beg, y_beg)`-`(x_end, y_end)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Barrier {
    pub x_beg: f64,
    pub y_beg: f64,
    pub x_end: f64,
    pub y_end: f64,
}

impl Barrier {
    pub fn new(x_beg: f64, y_beg: f64, x_end: f64, y_end: f64) -> Self {
        Self {
            x_beg,
            y_beg,
            x_end,
            y_end,
        }
    }

    /// Barrier of the given size with its origin at `(0, 0)`
    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// Same box shrunk by `margin` on every side
    pub fn inset(&self, margin: f64) -> Self {
        Self::new(
            self.x_beg + margin,
            self.y_beg + margin,
            self.x_end - margin,
            self.y_end - margin,
        )
    }

    pub fn width(&self) -> f64 {
        self.x_end - self.x_beg
    }

    pub fn height(&self) -> f64 {
        self.y_end - self.y_beg
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new(
            (self.x_beg + self.x_end) * 0.5,
            (self.y_beg + self.y_end) * 0.5,
        )
    }

    pub fn contains(&self, position: DVec2) -> bool {
        position.x >= self.x_beg
            && position.x <= self.x_end
            && position.y >= self.y_beg
            && position.y <= self.y_end
    }
}

/// Clamp a position into the barrier, reflecting velocity on every axis
/// that was crossed
///
/// Each axis is handled independently. A reflected velocity component is
/// scaled by [`RESTITUTION`] to model the energy lost on the bounce.
pub fn contain(position: DVec2, velocity: DVec2, barrier: &Barrier) -> (DVec2, DVec2) {
    let (x, vx) = contain_axis(position.x, velocity.x, barrier.x_beg, barrier.x_end);
    let (y, vy) = contain_axis(position.y, velocity.y, barrier.y_beg, barrier.y_end);
    (DVec2::new(x, y), DVec2::new(vx, vy))
}

fn contain_axis(pos: f64, vel: f64, beg: f64, end: f64) -> (f64, f64) {
    if pos < beg {
        (beg, -RESTITUTION * vel)
    } else if pos > end {
        (end, -RESTITUTION * vel)
    } else {
        (pos, vel)
    }
}
