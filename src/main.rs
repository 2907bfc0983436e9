//! World of Particles
//!
//! Headless driver: runs one world inside a fixed box, keeps it populated
//! with charged pairs and reports what happens through the logger.
//! `RUST_LOG=debug` shows every particle added or removed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use particle_physics::Barrier;
use particle_simulation::{RenderingContext, World, WorldConfig};
use rand::Rng;

const WIDTH: f64 = 1024.0;
const HEIGHT: f64 = 768.0;
/// Gap between the window edge and the barrier
const MARGIN: f64 = 15.0;
/// No pairs are spawned once the world holds this many particles
const MAX_PARTICLES: usize = 100;
const DEFAULT_RUN_SECONDS: u64 = 20;

/// Stand-in for a window: fixed size, remembers the particle count
struct HeadlessContext {
    barrier: Mutex<Barrier>,
    count: AtomicUsize,
}

impl HeadlessContext {
    fn new(width: f64, height: f64) -> Self {
        Self {
            barrier: Mutex::new(Barrier::from_size(width, height).inset(MARGIN)),
            count: AtomicUsize::new(0),
        }
    }

    fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl RenderingContext for HeadlessContext {
    fn on_particle_count_changed(&self, count: usize) {
        self.count.store(count, Ordering::Relaxed);
        log::debug!("N = {} particles", count);
    }

    fn barrier(&self) -> Barrier {
        *self.barrier.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn main() -> particle_simulation::Result<()> {
    // Initialize logger (RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let run_for = std::env::var("PARTICLES_RUN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(DEFAULT_RUN_SECONDS));

    log::info!("Starting world of particles for {:?}...", run_for);

    let context = Arc::new(HeadlessContext::new(WIDTH, HEIGHT));
    let mut world = World::new(WorldConfig::default(), context.clone())?;
    let area = world.barrier();

    let mut rng = rand::rng();
    let mut heavy = None;
    let start = Instant::now();
    let mut second = 0u64;

    while start.elapsed() < run_for {
        thread::sleep(Duration::from_secs(1));
        second += 1;

        // never leave the world empty
        if let Some(mass) = world.populate_if_empty() {
            log::info!("✓ Seeded empty world");
            heavy = Some(mass);
        }

        // a short-lived pair every second, a burst every five
        world.spawn_charged_pairs(1, 15.0 + rng.random::<f64>() * 10.0, area, MAX_PARTICLES);
        if second % 5 == 0 {
            world.spawn_charged_pairs(5, 7.5 + rng.random::<f64>() * 5.0, area, MAX_PARTICLES);
        }

        // drag the heavy mass around a little
        if let Some(mass) = &heavy {
            let dx = if second % 2 == 0 { 10.0 } else { -10.0 };
            mass.move_by(dx, 0.0);
        }

        if second == 10 {
            world.make_centripetal_velocities();
            log::info!("Velocities made centripetal");
        }

        let total_energy: f64 = world.snapshot().iter().map(|s| s.kinetic_energy).sum();
        log::info!(
            "t={:>3}s  N={:>3}  E_k={:.3e}  time scale {:.1}",
            second,
            context.count(),
            total_energy,
            world.time_scale()
        );
    }

    log::info!("Final state:\n{}", world.dump());
    world.shutdown();
    Ok(())
}
