//! # Density Module
//!
//! Densities over rigid-water configurations sharing one contract, [`DensityModel`]:
//!
//! - [`base::BaseDensity`] - the analytic prior over [`State`](crate::core::models::state::State)s
//! - [`target::TargetDensity`] - the physics-grounded target over
//!   [`AugmentedData`](crate::core::models::augmented::AugmentedData), evaluated through the
//!   energy oracle and sampled from a reference dataset
//!
//! Potentials follow the energy convention: lower is more probable.

pub mod base;
pub mod target;

use crate::core::distributions::DistributionError;
use crate::core::models::dataset::DatasetError;
use crate::core::models::simulation_box::SimulationBoxError;
use crate::core::models::sites::ShapeError;
use crate::engine::error::{OracleError, PotentialError};
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DensityError {
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Reference data required: {0}")]
    MissingData(String),

    #[error("Reference data has {found} sites per frame, but the system has {expected}")]
    IncompatibleData { expected: usize, found: usize },

    #[error(transparent)]
    Distribution(#[from] DistributionError),

    #[error(transparent)]
    Potential(#[from] PotentialError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    SimulationBox(#[from] SimulationBoxError),

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// A sample together with the log-density (or log-determinant) reported for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed<T> {
    pub obj: T,
    pub ldj: f64,
}

impl<T> Transformed<T> {
    pub fn new(obj: T, ldj: f64) -> Self {
        Self { obj, ldj }
    }
}

pub trait DensityModel {
    type Sample;

    fn potential(&self, sample: &Self::Sample) -> Result<f64, DensityError>;

    fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Transformed<Self::Sample>, DensityError>;

    fn sample_batch<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        n: usize,
    ) -> Result<Vec<Transformed<Self::Sample>>, DensityError> {
        (0..n).map(|_| self.sample(rng)).collect()
    }
}

/// Uniform draw from `{+1, -1}`.
pub(crate) fn random_sign<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    if rng.gen_bool(0.5) { 1.0 } else { -1.0 }
}
