use crate::core::models::dataset::DatasetError;
use crate::core::models::sites::ShapeError;
use crate::core::models::water_model::ModelLoadError;
use thiserror::Error;

/// Failure reported by the physics engine for a single query.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineFailure {
    #[error("Positions have not been set")]
    PositionsNotSet,

    #[error("Periodic box vectors have not been set")]
    BoxNotSet,

    #[error("Expected {expected} positions, received {found}")]
    ParticleCountMismatch { expected: usize, found: usize },

    #[error("Particle coordinate is NaN or infinite (particle {particle})")]
    NonFiniteCoordinate { particle: usize },

    #[error("Particles {first} and {second} overlap")]
    ParticleOverlap { first: usize, second: usize },

    #[error("Unsupported periodic box: {0}")]
    UnsupportedBox(String),
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Engine evaluation failed for sample {index}: {source}")]
    SampleFailed {
        index: usize,
        #[source]
        source: EngineFailure,
    },

    #[error("Sample {index} has {found} positions, but the loaded model has {expected} atoms")]
    AtomCountMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("Virtual-site mask covers {found} atoms, but the engine has {expected}")]
    MaskMismatch { expected: usize, found: usize },

    #[error("Failed to set periodic box: {0}")]
    InvalidBox(#[source] EngineFailure),

    #[error("Failed to initialize engine context: {0}")]
    Initialization(#[source] EngineFailure),

    #[error("Temperature must be positive and finite, got {0}")]
    InvalidTemperature(f64),

    #[error("Batch evaluation left {} sample(s) without a result: {failed:?}", failed.len())]
    IncompleteBatch { failed: Vec<usize> },

    #[error("Energy oracle lock was poisoned by a panicking holder")]
    LockPoisoned,

    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

#[derive(Debug, Error)]
pub enum PotentialError {
    #[error("Expected positions of shape {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Expected an input of length {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Upstream gradient does not match the forward output: {0}")]
    CotangentMismatch(String),

    #[error("Cutoff threshold must be finite and non-negative, got {0}")]
    InvalidThreshold(f64),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}
