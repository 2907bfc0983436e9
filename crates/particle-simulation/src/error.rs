use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Errors raised while setting up a world.
///
/// A running world never reports errors: removals are idempotent, parameters
/// are clamped and cancellation is a normal way for a task to finish.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Configuration rejected by [`WorldConfig::validate`](crate::WorldConfig::validate).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The OS refused to start the aggregator or the scheduler clock.
    #[error("failed to spawn thread")]
    Spawn(#[from] std::io::Error),

    /// The motion worker pool could not be built.
    #[error("failed to build worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
