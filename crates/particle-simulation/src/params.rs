//! World configuration and runtime parameters

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use particle_physics::{
    DEFAULT_TIME_SCALE, INITIAL_SPEED, MAX_TIME_SCALE, MIN_RADIUS, MIN_TIME_SCALE,
};

use crate::error::{Result, SimulationError};

/// Upper bound for the default worker pool size
const DEFAULT_MAX_WORKERS: usize = 8;

/// Static configuration of a world, fixed at construction
#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    /// Sleep quantum of the aggregator and of every motion task
    pub tick: Duration,
    /// Number of OS threads running particle motion tasks
    pub workers: usize,
    /// Initial time scale
    pub time_scale: f64,
    pub min_time_scale: f64,
    pub max_time_scale: f64,
    /// Random initial velocities are uniform in `[-initial_speed, initial_speed)` per axis
    pub initial_speed: f64,
    /// Base of the random radius range used when no radius is given
    pub min_radius: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .clamp(1, DEFAULT_MAX_WORKERS);

        Self {
            tick: Duration::from_millis(5), // ~200 Hz
            workers,
            time_scale: DEFAULT_TIME_SCALE,
            min_time_scale: MIN_TIME_SCALE,
            max_time_scale: MAX_TIME_SCALE,
            initial_speed: INITIAL_SPEED,
            min_radius: MIN_RADIUS,
        }
    }
}

impl WorldConfig {
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale;
        self
    }

    pub fn with_initial_speed(mut self, initial_speed: f64) -> Self {
        self.initial_speed = initial_speed;
        self
    }

    pub fn with_min_radius(mut self, min_radius: f64) -> Self {
        self.min_radius = min_radius;
        self
    }

    /// Check the configuration
    ///
    /// An out-of-range `time_scale` is not an error; it gets clamped when the
    /// world starts.
    pub fn validate(&self) -> Result<()> {
        if self.tick.is_zero() {
            return Err(SimulationError::InvalidConfig(
                "tick must be non-zero".into(),
            ));
        }
        if self.workers == 0 {
            return Err(SimulationError::InvalidConfig(
                "at least one worker thread is required".into(),
            ));
        }
        if !(self.min_time_scale.is_finite() && self.max_time_scale.is_finite())
            || self.min_time_scale <= 0.0
            || self.min_time_scale > self.max_time_scale
        {
            return Err(SimulationError::InvalidConfig(format!(
                "time scale bounds [{}, {}] are not a positive range",
                self.min_time_scale, self.max_time_scale
            )));
        }
        if self.min_time_scale < MIN_TIME_SCALE || self.max_time_scale > MAX_TIME_SCALE {
            return Err(SimulationError::InvalidConfig(format!(
                "time scale bounds [{}, {}] exceed [{}, {}]",
                self.min_time_scale, self.max_time_scale, MIN_TIME_SCALE, MAX_TIME_SCALE
            )));
        }
        if !(self.initial_speed.is_finite() && self.initial_speed > 0.0) {
            return Err(SimulationError::InvalidConfig(format!(
                "initial speed must be positive, got {}",
                self.initial_speed
            )));
        }
        if !(self.min_radius.is_finite() && self.min_radius > 0.0) {
            return Err(SimulationError::InvalidConfig(format!(
                "minimum radius must be positive, got {}",
                self.min_radius
            )));
        }
        Ok(())
    }
}

/// Runtime knobs shared by the aggregator, every motion task and the
/// input collaborator. Lock-free; read on every tick.
#[derive(Debug)]
pub struct WorldParams {
    time_scale: AtomicU64,
    min_time_scale: f64,
    max_time_scale: f64,
    paused: AtomicBool,
    running: AtomicBool,
}

impl WorldParams {
    pub fn new(config: &WorldConfig) -> Self {
        let time_scale = config
            .time_scale
            .clamp(config.min_time_scale, config.max_time_scale);
        if time_scale != config.time_scale {
            log::warn!(
                "time scale {} clamped to {}",
                config.time_scale,
                time_scale
            );
        }
        Self {
            time_scale: AtomicU64::new(time_scale.to_bits()),
            min_time_scale: config.min_time_scale,
            max_time_scale: config.max_time_scale,
            paused: AtomicBool::new(false),
            running: AtomicBool::new(true),
        }
    }

    /// Simulated-time to wall-clock-time ratio
    pub fn time_scale(&self) -> f64 {
        f64::from_bits(self.time_scale.load(Ordering::Relaxed))
    }

    /// Adjust the time scale by `delta`, clamped to the configured bounds.
    /// Returns the new value.
    pub fn inc_time_scale(&self, delta: f64) -> f64 {
        let (min, max) = (self.min_time_scale, self.max_time_scale);
        let clamp = |bits: u64| {
            let next = f64::from_bits(bits) + delta;
            // NaN deltas leave the scale alone
            let next = if next.is_nan() {
                f64::from_bits(bits)
            } else {
                next.clamp(min, max)
            };
            next.to_bits()
        };
        let previous = self
            .time_scale
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| Some(clamp(bits)))
            .unwrap_or_else(|bits| bits);
        f64::from_bits(clamp(previous))
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    /// Flip the paused flag, returning the new state
    pub fn toggle_paused(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clear the running flag. Returns `true` if it was set.
    pub(crate) fn stop(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }
}
