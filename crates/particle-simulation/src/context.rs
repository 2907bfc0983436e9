//! Interface to the rendering/UI collaborator that hosts a world

use particle_physics::Barrier;

/// Opaque token for whatever surface the renderer draws particles on.
/// The simulation only passes it through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphicsHandle(pub u64);

/// Services a world needs from its host.
///
/// `on_particle_count_changed` is invoked synchronously while the world's
/// registry lock is held, once per actual change of the live-particle count
/// and in the order the changes happened. Implementations must not call back
/// into the world from it.
pub trait RenderingContext: Send + Sync {
    /// New number of live particles after an add or remove
    fn on_particle_count_changed(&self, count: usize);

    /// Current containment box. May change between calls (window resize).
    fn barrier(&self) -> Barrier;

    fn graphics_handle(&self) -> Option<GraphicsHandle> {
        None
    }
}
