use super::error::OracleError;
use super::oracle::{BatchEvaluation, EnergyOracle, ErrorHandling, SharedOracle};
use crate::core::models::dataset::Dataset;
use crate::core::models::simulation_box::BoxVectors;
use crate::core::models::sites::SiteLayout;
use nalgebra::Vector3;
use std::sync::MutexGuard;
use tracing::{info, instrument};

/// Dense per-batch results.
///
/// Samples listed in `failed` carry a `NaN` energy and all-zero forces.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchArrays {
    pub energies: Vec<f64>,
    pub forces: Vec<Vec<Vector3<f64>>>,
    pub failed: Vec<usize>,
}

impl BatchArrays {
    fn from_evaluation(evaluation: BatchEvaluation, n_atoms: usize) -> Self {
        let failed = evaluation.failed_indices();
        let (energies, forces) = evaluation
            .slots
            .into_iter()
            .map(|slot| match slot {
                Some(e) => (e.energy, e.forces),
                None => (f64::NAN, vec![Vector3::zeros(); n_atoms]),
            })
            .unzip();
        Self {
            energies,
            forces,
            failed,
        }
    }
}

/// Runs whole batches through a shared oracle.
///
/// Each call holds the oracle lock for the entire batch, so samples of one batch are never
/// interleaved with another caller's.
#[derive(Debug, Clone)]
pub struct BatchEvaluator {
    oracle: SharedOracle,
    layout: SiteLayout,
}

impl BatchEvaluator {
    pub fn new(oracle: SharedOracle) -> Result<Self, OracleError> {
        let layout = Self::lock_oracle(&oracle)?.layout();
        Ok(Self { oracle, layout })
    }

    pub fn from_oracle(oracle: EnergyOracle) -> Self {
        let layout = oracle.layout();
        Self {
            oracle: oracle.into_shared(),
            layout,
        }
    }

    fn lock_oracle(oracle: &SharedOracle) -> Result<MutexGuard<'_, EnergyOracle>, OracleError> {
        oracle.lock().map_err(|_| OracleError::LockPoisoned)
    }

    pub fn oracle(&self) -> &SharedOracle {
        &self.oracle
    }

    pub fn layout(&self) -> SiteLayout {
        self.layout
    }

    pub fn evaluate<P: AsRef<[Vector3<f64>]>>(
        &self,
        positions: &[P],
        box_vectors: Option<&BoxVectors>,
        error_handling: Option<ErrorHandling>,
    ) -> Result<BatchEvaluation, OracleError> {
        Self::lock_oracle(&self.oracle)?.compute(positions, box_vectors, error_handling)
    }

    pub fn evaluate_arrays<P: AsRef<[Vector3<f64>]>>(
        &self,
        positions: &[P],
        box_vectors: Option<&BoxVectors>,
        error_handling: Option<ErrorHandling>,
    ) -> Result<BatchArrays, OracleError> {
        let evaluation = self.evaluate(positions, box_vectors, error_handling)?;
        Ok(BatchArrays::from_evaluation(evaluation, self.layout.n_atoms()))
    }

    /// Replaces the forces stored in `dataset` with oracle forces, evaluating every frame in
    /// its own box.
    #[instrument(skip_all, name = "recompute_forces", fields(frames = dataset.len()))]
    pub fn recompute_forces(&self, dataset: Dataset) -> Result<Dataset, OracleError> {
        info!("Recomputing dataset forces through the energy oracle.");
        let forces = {
            let mut oracle = Self::lock_oracle(&self.oracle)?;
            let mut forces = Vec::with_capacity(dataset.len());
            for (frame, positions) in dataset.all_positions().iter().enumerate() {
                let box_vectors = dataset.simulation_box(frame).map(|b| b.box_vectors());
                let evaluation = oracle
                    .compute(
                        std::slice::from_ref(positions),
                        box_vectors.as_ref(),
                        Some(ErrorHandling::Raise),
                    )
                    .map_err(|e| match e {
                        OracleError::SampleFailed { source, .. } => {
                            OracleError::SampleFailed { index: frame, source }
                        }
                        other => other,
                    })?;
                forces.extend(evaluation.into_complete()?.into_iter().map(|e| e.forces));
            }
            forces
        };
        let dataset = dataset.with_forces(forces)?;
        info!("Dataset forces recomputed.");
        Ok(dataset)
    }
}
