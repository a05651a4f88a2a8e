use super::context::{Engine, ReferenceEngine};
use super::error::{EngineFailure, OracleError};
use crate::core::models::simulation_box::{BoxVectors, SimulationBox};
use crate::core::models::sites::SiteLayout;
use crate::core::models::water_model::WaterModel;
use crate::core::specs::SystemSpecification;
use nalgebra::Vector3;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Molar gas constant in kJ/(mol·K).
pub const MOLAR_GAS_CONSTANT: f64 = 0.00831446261815324;

/// What the oracle does when the engine fails on one sample of a batch.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorHandling {
    /// Abort the batch and return the failure.
    Raise,
    /// Emit one warning for the sample and continue.
    #[default]
    LogWarning,
    /// Continue without a diagnostic.
    Silent,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown error handling policy '{0}' (expected 'raise', 'log-warning' or 'silent')")]
pub struct ParseErrorHandlingError(String);

impl FromStr for ErrorHandling {
    type Err = ParseErrorHandlingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "raise" => Ok(Self::Raise),
            "log-warning" | "warn" => Ok(Self::LogWarning),
            "silent" => Ok(Self::Silent),
            _ => Err(ParseErrorHandlingError(s.to_string())),
        }
    }
}

impl fmt::Display for ErrorHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Raise => "raise",
            Self::LogWarning => "log-warning",
            Self::Silent => "silent",
        };
        f.write_str(name)
    }
}

/// Energy and forces of one configuration, in units of kbT.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub energy: f64,
    pub forces: Vec<Vector3<f64>>,
}

/// Per-sample results of one batch, in input order.
///
/// A slot is `None` when the engine failed on that sample and the active policy chose to
/// continue.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEvaluation {
    pub slots: Vec<Option<Evaluation>>,
}

impl BatchEvaluation {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.is_none().then_some(i))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Unwraps every slot, failing if any sample has no result.
    pub fn into_complete(self) -> Result<Vec<Evaluation>, OracleError> {
        let failed = self.failed_indices();
        if !failed.is_empty() {
            return Err(OracleError::IncompleteBatch { failed });
        }
        Ok(self.slots.into_iter().flatten().collect())
    }
}

/// Single owner of a physics engine handle.
///
/// Converts raw engine output to dimensionless units (divides by kbT) and zeros the forces of
/// virtual sites. Every evaluation overwrites the engine's positions, so the oracle takes
/// `&mut self` and is shared only behind [`SharedOracle`].
pub struct EnergyOracle {
    engine: Box<dyn Engine>,
    layout: SiteLayout,
    virtual_site_mask: Vec<bool>,
    temperature: f64,
    kbt: f64,
    error_handling: ErrorHandling,
}

impl fmt::Debug for EnergyOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnergyOracle")
            .field("layout", &self.layout)
            .field("temperature", &self.temperature)
            .field("kbt", &self.kbt)
            .field("error_handling", &self.error_handling)
            .finish_non_exhaustive()
    }
}

pub type SharedOracle = Arc<Mutex<EnergyOracle>>;

impl EnergyOracle {
    pub fn new(
        engine: Box<dyn Engine>,
        layout: SiteLayout,
        virtual_site_mask: Vec<bool>,
        temperature: f64,
        error_handling: ErrorHandling,
    ) -> Result<Self, OracleError> {
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(OracleError::InvalidTemperature(temperature));
        }
        let expected = engine.num_particles();
        for found in [virtual_site_mask.len(), layout.n_atoms()] {
            if found != expected {
                return Err(OracleError::MaskMismatch { expected, found });
            }
        }
        Ok(Self {
            engine,
            layout,
            virtual_site_mask,
            temperature,
            kbt: MOLAR_GAS_CONSTANT * temperature,
            error_handling,
        })
    }

    /// Builds a [`ReferenceEngine`] for `model` and initializes it with the model's default
    /// box and positions.
    pub fn from_model(
        model: &WaterModel,
        temperature: f64,
        error_handling: ErrorHandling,
    ) -> Result<Self, OracleError> {
        let mut engine = ReferenceEngine::new(model);
        engine
            .set_periodic_box_vectors(model.box_vectors())
            .and_then(|_| engine.set_positions(model.positions()))
            .and_then(|_| engine.compute_virtual_sites())
            .map_err(OracleError::Initialization)?;
        Self::new(
            Box::new(engine),
            model.layout(),
            model.virtual_site_mask(),
            temperature,
            error_handling,
        )
    }

    /// Loads `{path}/model-{specs}.json` and builds an oracle at the system temperature.
    #[instrument(skip_all, name = "oracle_from_specs", fields(system = %specs))]
    pub fn from_specs(
        specs: &SystemSpecification,
        error_handling: ErrorHandling,
    ) -> Result<Self, OracleError> {
        let path = specs.model_path();
        info!(path = %path.display(), "Loading water model.");
        let model = WaterModel::load_from_json(&path)?;
        let oracle = Self::from_model(&model, specs.temperature, error_handling)?;
        info!(
            n_molecules = model.n_molecules(),
            n_sites = model.n_sites(),
            kbt = oracle.kbt,
            "Energy oracle ready."
        );
        Ok(oracle)
    }

    pub fn kbt(&self) -> f64 {
        self.kbt
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn layout(&self) -> SiteLayout {
        self.layout
    }

    pub fn n_atoms(&self) -> usize {
        self.layout.n_atoms()
    }

    pub fn virtual_site_mask(&self) -> &[bool] {
        &self.virtual_site_mask
    }

    pub fn error_handling(&self) -> ErrorHandling {
        self.error_handling
    }

    /// Sets a rectangular box spanning `simulation_box.size()`.
    pub fn set_box(&mut self, simulation_box: &SimulationBox) -> Result<(), OracleError> {
        self.set_box_vectors(&simulation_box.box_vectors())
    }

    pub fn set_box_vectors(&mut self, box_vectors: &BoxVectors) -> Result<(), OracleError> {
        self.engine
            .set_periodic_box_vectors(box_vectors)
            .map_err(OracleError::InvalidBox)
    }

    /// Evaluates a batch of configurations one after another.
    ///
    /// When `box_vectors` is given the engine box is set once before the first sample. A
    /// sample with the wrong number of atoms is rejected before anything is evaluated,
    /// whatever the policy.
    #[instrument(skip_all, name = "oracle_compute", fields(batch = positions.len()))]
    pub fn compute<P: AsRef<[Vector3<f64>]>>(
        &mut self,
        positions: &[P],
        box_vectors: Option<&BoxVectors>,
        error_handling: Option<ErrorHandling>,
    ) -> Result<BatchEvaluation, OracleError> {
        let expected = self.n_atoms();
        if let Some((index, sample)) = positions
            .iter()
            .enumerate()
            .find(|(_, p)| p.as_ref().len() != expected)
        {
            return Err(OracleError::AtomCountMismatch {
                index,
                expected,
                found: sample.as_ref().len(),
            });
        }
        if let Some(box_vectors) = box_vectors {
            self.set_box_vectors(box_vectors)?;
        }

        let policy = error_handling.unwrap_or(self.error_handling);
        let mut slots = Vec::with_capacity(positions.len());
        for (index, sample) in positions.iter().enumerate() {
            match self.evaluate(sample.as_ref()) {
                Ok(evaluation) => slots.push(Some(evaluation)),
                Err(source) => match policy {
                    ErrorHandling::Raise => {
                        return Err(OracleError::SampleFailed { index, source });
                    }
                    ErrorHandling::LogWarning => {
                        warn!(
                            sample = index,
                            error = %source,
                            "Engine evaluation failed; leaving the sample without a result."
                        );
                        slots.push(None);
                    }
                    ErrorHandling::Silent => slots.push(None),
                },
            }
        }

        let result = BatchEvaluation { slots };
        debug!(failed = result.failed_indices().len(), "Batch evaluated.");
        Ok(result)
    }

    fn evaluate(&mut self, positions: &[Vector3<f64>]) -> Result<Evaluation, EngineFailure> {
        self.engine.set_positions(positions)?;
        self.engine.compute_virtual_sites()?;
        let state = self.engine.state()?;
        if state.forces.len() != self.virtual_site_mask.len() {
            return Err(EngineFailure::ParticleCountMismatch {
                expected: self.virtual_site_mask.len(),
                found: state.forces.len(),
            });
        }
        let forces = state
            .forces
            .iter()
            .zip(&self.virtual_site_mask)
            .map(|(f, &is_virtual)| {
                if is_virtual {
                    Vector3::zeros()
                } else {
                    f / self.kbt
                }
            })
            .collect();
        Ok(Evaluation {
            energy: state.potential_energy / self.kbt,
            forces,
        })
    }

    pub fn into_shared(self) -> SharedOracle {
        Arc::new(Mutex::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{
        HarmonicEngine, WarningCounter, two_waters, two_waters_json, two_waters_model,
    };
    use nalgebra::Matrix3;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;
    use tracing_subscriber::layer::SubscriberExt;

    const TEMPERATURE: f64 = 300.0;

    fn harmonic_oracle(policy: ErrorHandling) -> EnergyOracle {
        let model = two_waters_model(0.3);
        let engine = HarmonicEngine::new(model.positions().to_vec(), 2.0);
        EnergyOracle::new(
            Box::new(engine),
            model.layout(),
            model.virtual_site_mask(),
            TEMPERATURE,
            policy,
        )
        .unwrap()
    }

    fn displaced(offset: f64) -> Vec<Vector3<f64>> {
        two_waters(0.3)
            .into_iter()
            .map(|p| p + Vector3::new(offset, 0.0, 0.0))
            .collect()
    }

    fn batch_with_failing_second_sample() -> Vec<Vec<Vector3<f64>>> {
        let mut failing = displaced(0.1);
        failing[2].z = f64::NAN;
        vec![displaced(0.1), failing, displaced(0.2)]
    }

    #[test]
    fn kbt_is_gas_constant_times_temperature() {
        let oracle = harmonic_oracle(ErrorHandling::Raise);
        assert!((oracle.kbt() - 2.494338785445972).abs() < 1e-12);
    }

    #[test]
    fn compute_divides_energy_and_forces_by_kbt() {
        let mut oracle = harmonic_oracle(ErrorHandling::Raise);
        let result = oracle.compute(&[displaced(0.1)], None, None).unwrap();
        let evaluation = result.into_complete().unwrap().remove(0);

        let raw_energy = 0.5 * 2.0 * 8.0 * 0.01;
        assert!((evaluation.energy - raw_energy / oracle.kbt()).abs() < 1e-12);
        assert!((evaluation.forces[0].x + 0.2 / oracle.kbt()).abs() < 1e-12);
    }

    #[test]
    fn forces_on_virtual_sites_are_exactly_zero() {
        let mut oracle = harmonic_oracle(ErrorHandling::Raise);
        let evaluation = oracle
            .compute(&[displaced(0.5)], None, None)
            .unwrap()
            .into_complete()
            .unwrap()
            .remove(0);
        for (force, &is_virtual) in evaluation.forces.iter().zip(oracle.virtual_site_mask()) {
            if is_virtual {
                assert_eq!(*force, Vector3::zeros());
            } else {
                assert!(force.norm() > 0.0);
            }
        }
    }

    #[test]
    fn raise_policy_aborts_batch_on_failing_sample() {
        let mut oracle = harmonic_oracle(ErrorHandling::Raise);
        let result = oracle.compute(&batch_with_failing_second_sample(), None, None);
        assert!(matches!(
            result,
            Err(OracleError::SampleFailed {
                index: 1,
                source: EngineFailure::NonFiniteCoordinate { particle: 2 }
            })
        ));
    }

    #[test]
    fn log_warning_policy_emits_one_warning_and_keeps_batch_length() {
        let counter = WarningCounter::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        let mut oracle = harmonic_oracle(ErrorHandling::Raise);

        let result = tracing::subscriber::with_default(subscriber, || {
            oracle.compute(
                &batch_with_failing_second_sample(),
                None,
                Some(ErrorHandling::LogWarning),
            )
        })
        .unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result.failed_indices(), vec![1]);
        assert!(result.slots[0].is_some() && result.slots[2].is_some());
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn silent_policy_emits_no_warning() {
        let counter = WarningCounter::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        let mut oracle = harmonic_oracle(ErrorHandling::Silent);

        let result = tracing::subscriber::with_default(subscriber, || {
            oracle.compute(&batch_with_failing_second_sample(), None, None)
        })
        .unwrap();

        assert_eq!(result.failed_indices(), vec![1]);
        assert_eq!(counter.count(), 0);
        assert!(matches!(
            result.into_complete(),
            Err(OracleError::IncompleteBatch { failed }) if failed == vec![1]
        ));
    }

    #[test]
    fn atom_count_mismatch_is_rejected_under_every_policy() {
        let mut oracle = harmonic_oracle(ErrorHandling::Silent);
        let short = vec![Vector3::zeros(); 5];
        let result = oracle.compute(&[displaced(0.0), short], None, None);
        assert!(matches!(
            result,
            Err(OracleError::AtomCountMismatch {
                index: 1,
                expected: 8,
                found: 5
            })
        ));
    }

    #[test]
    fn box_is_set_once_per_batch_and_virtual_sites_once_per_sample() {
        let model = two_waters_model(0.3);
        let engine = HarmonicEngine::new(model.positions().to_vec(), 2.0);
        let calls = engine.calls();
        let mut oracle = EnergyOracle::new(
            Box::new(engine),
            model.layout(),
            model.virtual_site_mask(),
            TEMPERATURE,
            ErrorHandling::Raise,
        )
        .unwrap();

        let vectors = Matrix3::from_diagonal_element(2.5);
        let batch = [displaced(0.0), displaced(0.1), displaced(0.2)];
        oracle.compute(&batch, Some(&vectors), None).unwrap();
        {
            let calls = calls.lock().unwrap();
            assert_eq!(calls.box_sets, vec![vectors]);
            assert_eq!(calls.virtual_site_calls, 3);
        }

        oracle.compute(&batch[..2], None, None).unwrap();
        let calls = calls.lock().unwrap();
        assert_eq!(calls.box_sets.len(), 1);
        assert_eq!(calls.virtual_site_calls, 5);
    }

    #[test]
    fn virtual_site_inputs_are_replaced_before_evaluation() {
        let mut oracle =
            EnergyOracle::from_model(&two_waters_model(0.3), TEMPERATURE, ErrorHandling::Raise)
                .unwrap();
        let placed = two_waters(0.3);
        let mut scrambled = placed.clone();
        scrambled[3] = Vector3::new(1.7, -0.4, 2.2);
        scrambled[7] = Vector3::zeros();

        let results = oracle
            .compute(&[placed, scrambled], None, None)
            .unwrap()
            .into_complete()
            .unwrap();
        assert!((results[0].energy - results[1].energy).abs() < 1e-9);
        for (a, b) in results[0].forces.iter().zip(&results[1].forces) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn reference_engine_rejects_box_smaller_than_twice_the_cutoff() {
        let mut oracle =
            EnergyOracle::from_model(&two_waters_model(0.3), TEMPERATURE, ErrorHandling::Raise)
                .unwrap();
        let small = SimulationBox::from_max(Vector3::new(1.0, 1.0, 1.0)).unwrap();
        assert!(matches!(
            oracle.set_box(&small),
            Err(OracleError::InvalidBox(EngineFailure::UnsupportedBox(_)))
        ));
    }

    #[test]
    fn new_rejects_invalid_temperature_and_mask() {
        let model = two_waters_model(0.3);
        let engine = || Box::new(HarmonicEngine::new(model.positions().to_vec(), 1.0));
        assert!(matches!(
            EnergyOracle::new(engine(), model.layout(), model.virtual_site_mask(), 0.0, ErrorHandling::Raise),
            Err(OracleError::InvalidTemperature(_))
        ));
        assert!(matches!(
            EnergyOracle::new(engine(), model.layout(), vec![false; 3], 300.0, ErrorHandling::Raise),
            Err(OracleError::MaskMismatch { expected: 8, found: 3 })
        ));
    }

    #[test]
    fn from_specs_loads_model_from_naming_convention() {
        let dir = tempdir().unwrap();
        let specs = SystemSpecification {
            path: PathBuf::from(dir.path()),
            ice_type: "Ih".to_string(),
            num_molecules: 2,
            temperature: 250.0,
            recompute_forces: false,
        };
        fs::write(specs.model_path(), two_waters_json(0.3)).unwrap();

        let mut oracle = EnergyOracle::from_specs(&specs, ErrorHandling::Raise).unwrap();
        assert_eq!(oracle.n_atoms(), 8);
        assert!((oracle.kbt() - MOLAR_GAS_CONSTANT * 250.0).abs() < 1e-15);
        let result = oracle.compute(&[two_waters(0.3)], None, None).unwrap();
        assert!(result.is_complete());
    }

    #[test]
    fn from_specs_reports_missing_model_file() {
        let dir = tempdir().unwrap();
        let specs = SystemSpecification {
            path: PathBuf::from(dir.path()),
            ice_type: "Ic".to_string(),
            num_molecules: 8,
            temperature: 200.0,
            recompute_forces: false,
        };
        assert!(matches!(
            EnergyOracle::from_specs(&specs, ErrorHandling::default()),
            Err(OracleError::ModelLoad(_))
        ));
    }

    #[test]
    fn error_handling_parses_and_displays_kebab_case() {
        for policy in [
            ErrorHandling::Raise,
            ErrorHandling::LogWarning,
            ErrorHandling::Silent,
        ] {
            assert_eq!(policy.to_string().parse::<ErrorHandling>(), Ok(policy));
        }
        assert_eq!(
            "LOG_WARNING".parse::<ErrorHandling>(),
            Ok(ErrorHandling::LogWarning)
        );
        assert!("ignore".parse::<ErrorHandling>().is_err());
        assert_eq!(ErrorHandling::default(), ErrorHandling::LogWarning);
    }
}
