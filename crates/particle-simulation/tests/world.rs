use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use glam::DVec2;
use particle_physics::{Barrier, MIN_MASS};
use particle_simulation::{ParticleId, RenderingContext, World, WorldConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Context with a fixed box that records every count notification
struct RecordingContext {
    barrier: Barrier,
    counts: Mutex<Vec<usize>>,
}

impl RecordingContext {
    fn new(barrier: Barrier) -> Arc<Self> {
        Arc::new(Self {
            barrier,
            counts: Mutex::new(Vec::new()),
        })
    }

    fn counts(&self) -> Vec<usize> {
        self.counts.lock().unwrap().clone()
    }

    /// (insertions, removals) implied by the notification sequence
    fn transitions(&self) -> (usize, usize) {
        let counts = self.counts();
        let mut previous = 0;
        let (mut up, mut down) = (0, 0);
        for count in counts {
            assert_eq!(
                count.abs_diff(previous),
                1,
                "count jumped from {previous} to {count}"
            );
            if count > previous {
                up += 1;
            } else {
                down += 1;
            }
            previous = count;
        }
        (up, down)
    }
}

impl RenderingContext for RecordingContext {
    fn on_particle_count_changed(&self, count: usize) {
        self.counts.lock().unwrap().push(count);
    }

    fn barrier(&self) -> Barrier {
        self.barrier
    }
}

fn square() -> Barrier {
    Barrier::new(0.0, 0.0, 1000.0, 1000.0)
}

fn world_with(config: WorldConfig, seed: u64) -> (World, Arc<RecordingContext>) {
    let context = RecordingContext::new(square());
    let world = World::with_rng(config, context.clone(), StdRng::seed_from_u64(seed))
        .expect("world starts");
    (world, context)
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn single_neutral_particle_expires_once() {
    let (world, context) = world_with(WorldConfig::default().with_time_scale(1.0), 1);
    assert_eq!(world.time_scale(), 1.0);
    assert!(!world.is_paused());

    let particle = world.add_particle(1.0, 0.0, DVec2::new(500.0, 500.0), 10.0, 2.0);
    assert_eq!(world.particle_count(), 1);
    assert_eq!(particle.radius(), Some(10.0));

    thread::sleep(Duration::from_millis(500));
    assert!(particle.is_alive());
    let position = particle.position().unwrap();
    assert!(square().contains(position));
    assert_eq!(particle.acceleration(), Some(DVec2::ZERO));

    assert!(wait_until(Duration::from_secs(10), || world.particle_count() == 0));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(context.counts(), vec![1, 0]);
    assert!(!particle.is_alive());
    assert_eq!(particle.position(), None);
}

#[test]
fn every_particle_is_removed_exactly_once() {
    let (world, context) = world_with(WorldConfig::default().with_time_scale(2.0), 2);
    let n = 20;
    for i in 0..n {
        let lifetime = 0.05 + 0.02 * i as f64;
        let charge = if i % 2 == 0 { 1.0 } else { -1.0 };
        world.add_particle(
            1.0,
            charge,
            DVec2::new(100.0 + 40.0 * i as f64, 500.0),
            0.0,
            lifetime,
        );
    }

    assert!(wait_until(Duration::from_secs(10), || world.particle_count() == 0));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(context.transitions(), (n, n));
    assert_eq!(context.counts().last(), Some(&0));
}

#[test]
fn kill_is_idempotent() {
    let (world, context) = world_with(WorldConfig::default(), 3);
    let particle = world.add_particle(1.0, 1.0, DVec2::new(300.0, 300.0), 12.0, f64::INFINITY);
    let id = particle.id();

    particle.kill();
    particle.kill();
    assert!(wait_until(Duration::from_secs(5), || !particle.is_alive()));

    particle.kill();
    world.kill(id);
    assert!(!world.remove_particle(id));
    thread::sleep(Duration::from_millis(50));

    assert_eq!(context.counts(), vec![1, 0]);
}

#[test]
fn kill_interrupts_motion_sleep() {
    let config = WorldConfig::default().with_tick(Duration::from_secs(2));
    let (world, _context) = world_with(config, 4);
    let particle = world.add_particle(1.0, 0.0, DVec2::new(10.0, 10.0), 5.0, f64::INFINITY);

    let start = Instant::now();
    particle.kill();
    assert!(wait_until(Duration::from_secs(5), || world.particle_count() == 0));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn external_remove_races_with_expiry() {
    let (world, context) = world_with(WorldConfig::default(), 5);
    let particle = world.add_particle(1.0, 0.0, DVec2::new(500.0, 500.0), 5.0, 0.2);

    assert!(world.remove_particle(particle.id()));
    assert!(!world.remove_particle(particle.id()));
    particle.kill();
    thread::sleep(Duration::from_millis(600));

    assert_eq!(context.counts(), vec![1, 0]);
}

#[test]
fn concurrent_spawn_and_kill_keep_registry_consistent() {
    let (world, context) = world_with(WorldConfig::default().with_workers(4), 6);
    let spawners = 4;
    let per_spawner = 40;

    thread::scope(|scope| {
        for s in 0..spawners {
            let world = &world;
            scope.spawn(move || {
                for i in 0..per_spawner {
                    let lifetime = if i % 3 == 0 { 0.05 } else { f64::INFINITY };
                    let charge = if (s + i) % 2 == 0 { 1.0 } else { -1.0 };
                    let particle = world.add_particle(
                        1.0,
                        charge,
                        DVec2::new(50.0 + 20.0 * i as f64, 100.0 + 200.0 * s as f64),
                        0.0,
                        lifetime,
                    );
                    if i % 2 == 0 {
                        particle.kill();
                    }
                    if i % 5 == 0 {
                        world.remove_particle(particle.id());
                    }
                }
            });
        }

        scope.spawn(|| {
            for _ in 0..50 {
                let snapshot = world.snapshot();
                let mut ids: Vec<u64> = snapshot.iter().map(|s| s.id).collect();
                ids.dedup();
                assert_eq!(ids.len(), snapshot.len(), "duplicate particle in registry");
                thread::sleep(Duration::from_millis(2));
            }
        });
    });

    let total = spawners * per_spawner;
    assert!(world.particles().len() <= total);

    world.kill_all();
    assert!(wait_until(Duration::from_secs(10), || world.particle_count() == 0));
    thread::sleep(Duration::from_millis(50));

    assert_eq!(context.transitions(), (total, total));
}

#[test]
fn kill_reaches_particles_from_a_running_batch_spawn() {
    let (world, context) = world_with(WorldConfig::default(), 18);
    let area = square();
    let batches = 20;
    let pairs = 10;
    let done = AtomicBool::new(false);
    let mut killed = HashSet::new();

    thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..batches {
                world.spawn_charged_pairs(pairs, f64::INFINITY, area, usize::MAX);
            }
            done.store(true, Ordering::SeqCst);
        });

        while !done.load(Ordering::SeqCst) || killed.is_empty() {
            let newest = world
                .snapshot()
                .iter()
                .map(|s| s.id)
                .filter(|id| !killed.contains(id))
                .max();
            if let Some(id) = newest {
                let id = ParticleId(id);
                assert!(world.particle(id).is_some(), "live particle {id} has no handle");
                world.kill(id);
                killed.insert(id.0);
            }
            thread::yield_now();
        }
    });

    let total = batches * pairs * 2;
    assert!(wait_until(Duration::from_secs(5), || {
        killed.iter().all(|&id| world.particle(ParticleId(id)).is_none())
    }));
    assert_eq!(world.particle_count(), total - killed.len());
    assert_eq!(world.particles().len(), total - killed.len());

    drop(world);
    assert_eq!(context.transitions(), (total, total));
}

#[test]
fn paused_world_does_not_integrate() {
    let (world, _context) = world_with(WorldConfig::default(), 7);
    world.set_paused(true);

    let particle = world.add_particle(1.0, 0.0, DVec2::new(500.0, 500.0), 10.0, f64::INFINITY);
    let before = particle.position().unwrap();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(particle.position(), Some(before));

    // lifetime keeps running while paused
    let mortal = world.add_particle(1.0, 0.0, DVec2::new(200.0, 200.0), 10.0, 0.05);
    assert!(wait_until(Duration::from_secs(5), || !mortal.is_alive()));

    assert!(!world.toggle_paused());
    assert!(wait_until(Duration::from_secs(5), || {
        particle.position() != Some(before)
    }));
}

#[test]
fn move_by_displaces_and_stops() {
    let (world, _context) = world_with(WorldConfig::default(), 8);
    world.set_paused(true);

    let particle = world.add_particle(1.0, 0.0, DVec2::new(500.0, 500.0), 10.0, f64::INFINITY);
    assert!(particle.kinetic_energy().unwrap() > 0.0);

    particle.move_by(0.0, -10.0);
    assert_eq!(particle.position(), Some(DVec2::new(500.0, 490.0)));
    assert_eq!(particle.velocity(), Some(DVec2::ZERO));
    assert_eq!(particle.kinetic_energy(), Some(0.0));
}

#[test]
fn batch_velocity_controls() {
    let (world, _context) = world_with(WorldConfig::default(), 9);
    world.set_paused(true);

    world.add_particle(1.0, 1.0, DVec2::new(400.0, 500.0), 10.0, f64::INFINITY);
    world.add_particle(1.0, -1.0, DVec2::new(600.0, 500.0), 10.0, f64::INFINITY);
    world.calculate_interactions();

    world.make_centripetal_velocities();
    for p in world.particles() {
        let (v, a) = (p.velocity().unwrap(), p.acceleration().unwrap());
        assert!(a.length() > 0.0);
        assert!(v.dot(a).abs() <= 1e-9 * a.length_squared());
    }

    world.reset_velocities();
    for p in world.particles() {
        assert_eq!(p.velocity(), Some(DVec2::ZERO));
    }
}

#[test]
fn random_radius_is_drawn_from_range() {
    let config = WorldConfig::default().with_min_radius(10.0);
    let (world, _context) = world_with(config, 10);
    world.set_paused(true);

    for _ in 0..20 {
        let p = world.add_particle(1.0, 0.0, DVec2::new(500.0, 500.0), 0.0, f64::INFINITY);
        let r = p.radius().unwrap();
        assert!((10.0..20.0).contains(&r), "radius {r}");
        let v = p.velocity().unwrap();
        assert!(v.x.abs() <= 100.0 && v.y.abs() <= 100.0);
    }
}

#[test]
fn non_positive_mass_falls_back_to_unit_mass() {
    let (world, _context) = world_with(WorldConfig::default(), 19);
    world.set_paused(true);

    let negative = world.add_particle(-5.0, 1.0, DVec2::new(300.0, 300.0), 10.0, f64::INFINITY);
    let nan = world.add_particle(f64::NAN, -1.0, DVec2::new(700.0, 700.0), 10.0, f64::INFINITY);
    assert_eq!(MIN_MASS, 1.0);
    assert_eq!(negative.mass(), Some(MIN_MASS));
    assert_eq!(nan.mass(), Some(MIN_MASS));

    world.set_paused(false);
    world.calculate_interactions();
    let a = negative.acceleration().unwrap();
    assert!(a.is_finite() && a.length() < 1e4, "acceleration {a}");
}

#[test]
fn time_scale_is_clamped() {
    let (world, _context) = world_with(WorldConfig::default(), 11);
    assert_eq!(world.time_scale(), 0.5);
    assert_eq!(world.inc_time_scale(5.0), 2.0);
    assert_eq!(world.inc_time_scale(-5.0), 0.1);
    assert!((world.inc_time_scale(0.1) - 0.2).abs() < 1e-12);
}

#[test]
fn charged_pairs_respect_the_particle_cap() {
    let (world, _context) = world_with(WorldConfig::default(), 12);
    world.set_paused(true);

    assert_eq!(world.spawn_charged_pairs(3, f64::INFINITY, square(), 100), 3);
    let snapshot = world.snapshot();
    assert_eq!(snapshot.len(), 6);
    assert_eq!(snapshot.iter().map(|s| s.charge).sum::<f64>(), 0.0);
    assert!(snapshot.iter().all(|s| s.mass == 1.0 && s.radius >= 10.0));

    assert_eq!(world.spawn_charged_pairs(3, 10.0, square(), 6), 0);
    assert_eq!(world.particle_count(), 6);
}

#[test]
fn populate_only_seeds_an_empty_world() {
    let (world, _context) = world_with(WorldConfig::default(), 13);
    world.set_paused(true);

    let heavy = world.populate_if_empty().expect("world was empty");
    assert_eq!(heavy.mass(), Some(1e12));
    assert_eq!(heavy.radius(), Some(25.0));
    assert_eq!(heavy.position(), Some(DVec2::new(300.0, 500.0)));
    assert_eq!(heavy.lifetime(), Some(f64::INFINITY));
    assert_eq!(world.particle_count(), 4);

    assert!(world.populate_if_empty().is_none());
    assert_eq!(world.particle_count(), 4);
}

#[test]
fn particles_stay_inside_the_barrier() {
    let (world, _context) = world_with(WorldConfig::default().with_time_scale(2.0), 14);
    world.spawn_charged_pairs(15, f64::INFINITY, square(), 100);
    thread::sleep(Duration::from_millis(300));

    for s in world.snapshot() {
        let position = DVec2::from_array(s.position);
        assert!(square().contains(position), "escaped: {position:?}");
        assert!(s.kinetic_energy.is_finite());
    }
}

#[test]
fn dump_lists_every_particle() {
    let (world, _context) = world_with(WorldConfig::default(), 15);
    world.set_paused(true);
    world.add_particle(1.0, 1.0, DVec2::new(100.0, 100.0), 10.0, 30.0);
    world.add_particle(1.0, -1.0, DVec2::new(200.0, 100.0), 10.0, 30.0);

    let dump = world.dump();
    let lines: Vec<&str> = dump.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].contains("lifetime") && lines[0].contains("ay"));
    assert_eq!(lines[3], "Total 2 particles");
}

#[test]
fn shutdown_stops_aggregator_but_not_particles() {
    let (mut world, _context) = world_with(WorldConfig::default(), 16);
    let particle = world.add_particle(1.0, 0.0, DVec2::new(500.0, 500.0), 10.0, f64::INFINITY);

    world.shutdown();
    world.shutdown();
    assert!(!world.is_running());

    let before = particle.position();
    assert!(wait_until(Duration::from_secs(5), || particle.position() != before));
    assert!(particle.is_alive());
}

#[test]
fn dropping_the_world_drains_immortal_particles() {
    let (world, context) = world_with(WorldConfig::default(), 17);
    let particle = world.add_particle(1.0, 0.0, DVec2::new(500.0, 500.0), 10.0, f64::INFINITY);
    world.add_particle(1.0, 1.0, DVec2::new(600.0, 500.0), 10.0, f64::INFINITY);

    drop(world);

    assert_eq!(context.counts().last(), Some(&0));
    assert!(!particle.is_alive());
    particle.kill();
    particle.move_by(1.0, 1.0);
}

#[test]
fn invalid_config_is_rejected() {
    let context = RecordingContext::new(square());
    let result = World::new(WorldConfig::default().with_workers(0), context);
    assert!(result.is_err());
}
