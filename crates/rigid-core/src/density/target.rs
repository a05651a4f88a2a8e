use super::{DensityError, DensityModel, Transformed, random_sign};
use crate::core::distributions::normal::DiagonalNormal;
use crate::core::models::augmented::AugmentedData;
use crate::core::models::dataset::Dataset;
use crate::core::models::simulation_box::SimulationBox;
use crate::core::models::sites::{SiteLayout, SiteTensor};
use crate::core::specs::{SystemSpecification, TargetSpecification};
use crate::engine::autodiff::Potential;
use crate::engine::batch::BatchEvaluator;
use crate::engine::bridge::EnergyBridge;
use crate::engine::cutoff::CutoffPotential;
use crate::engine::error::PotentialError;
use crate::engine::oracle::{EnergyOracle, ErrorHandling};
use nalgebra::DVector;
use rand::Rng;
use tracing::{info, instrument};

/// Gradient of [`TargetDensity::potential`].
#[derive(Debug, Clone, PartialEq)]
pub struct TargetGradient {
    /// Shaped like the input positions. Virtual sites always carry zero.
    pub pos: SiteTensor,
    pub aux: Vec<f64>,
}

/// Physics-grounded density over [`AugmentedData`].
///
/// The potential adds the energy oracle's energy (in kbT) to the negative log-density of the
/// auxiliaries; with a cutoff threshold the energy is wrapped in a [`CutoffPotential`] anchored
/// at the first dataset frame.
///
/// Samples are drawn from the reference dataset. Their reported log-density is `0.0`: it is
/// the density with respect to the empirical measure of the dataset itself, not a normalized
/// density of the target.
#[derive(Debug, Clone)]
pub struct TargetDensity {
    aux_model: DiagonalNormal,
    bridge: EnergyBridge,
    data: Option<Dataset>,
    cutoff_threshold: Option<f64>,
}

impl TargetDensity {
    pub fn new(
        auxiliary_shape: usize,
        bridge: EnergyBridge,
        data: Option<Dataset>,
        cutoff_threshold: Option<f64>,
    ) -> Result<Self, DensityError> {
        if let Some(dataset) = &data {
            let expected = bridge.layout().n_atoms();
            if dataset.n_atoms() != expected {
                return Err(DensityError::IncompatibleData {
                    expected,
                    found: dataset.n_atoms(),
                });
            }
        }
        if let Some(threshold) = cutoff_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(PotentialError::InvalidThreshold(threshold).into());
            }
        }
        Ok(Self {
            aux_model: DiagonalNormal::standard(auxiliary_shape),
            bridge,
            data,
            cutoff_threshold,
        })
    }

    /// Builds the energy oracle from the system's model file and attaches `data`, refreshing
    /// its forces first when the system asks for it.
    #[instrument(skip_all, name = "target_density_from_specs", fields(system = %sys_specs))]
    pub fn from_specs(
        auxiliary_shape: usize,
        target_specs: &TargetSpecification,
        sys_specs: &SystemSpecification,
        data: Dataset,
        error_handling: ErrorHandling,
    ) -> Result<Self, DensityError> {
        let oracle = EnergyOracle::from_specs(sys_specs, error_handling)?;
        let evaluator = BatchEvaluator::from_oracle(oracle);
        let data = if sys_specs.recompute_forces {
            evaluator.recompute_forces(data)?
        } else {
            data
        };
        info!(
            frames = data.len(),
            cutoff = ?target_specs.cutoff_threshold,
            "Target density ready."
        );
        Self::new(
            auxiliary_shape,
            EnergyBridge::new(evaluator),
            Some(data),
            target_specs.cutoff_threshold,
        )
    }

    pub fn layout(&self) -> SiteLayout {
        self.bridge.layout()
    }

    pub fn data(&self) -> Option<&Dataset> {
        self.data.as_ref()
    }

    pub fn bridge(&self) -> &EnergyBridge {
        &self.bridge
    }

    /// Box of the first dataset frame.
    pub fn simulation_box(&self) -> Result<SimulationBox, DensityError> {
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| DensityError::MissingData("no dataset is attached".to_string()))?;
        let max = data
            .box_max(0)
            .ok_or_else(|| DensityError::MissingData("dataset has no frames".to_string()))?;
        Ok(SimulationBox::from_max(*max)?)
    }

    fn positions_of(&self, inp: &AugmentedData) -> Result<DVector<f64>, DensityError> {
        let expected = self.layout().shape();
        if inp.pos.shape() != expected {
            return Err(PotentialError::ShapeMismatch {
                expected: expected.to_vec(),
                found: inp.pos.shape().to_vec(),
            }
            .into());
        }
        Ok(inp.pos.to_dvector())
    }

    /// Energy term and its gradient with respect to the flattened positions.
    fn energy_and_grad(&self, inp: &AugmentedData) -> Result<(f64, DVector<f64>), DensityError> {
        let x = self.positions_of(inp)?;
        let energy = self.bridge.bind(Some(inp.simulation_box.size()));
        let result = match self.cutoff_threshold {
            None => energy.value_and_grad(&x)?,
            Some(threshold) => {
                let data = self.data.as_ref().ok_or_else(|| {
                    DensityError::MissingData("a cutoff threshold requires a dataset".to_string())
                })?;
                let reference = SiteTensor::new(vec![data.n_atoms()], data.reference().to_vec())?
                    .to_dvector();
                CutoffPotential::new(energy, reference, threshold)?.value_and_grad(&x)?
            }
        };
        Ok(result)
    }

    /// Potential together with its gradient with respect to positions and auxiliaries.
    pub fn potential_and_grad(
        &self,
        inp: &AugmentedData,
    ) -> Result<(f64, TargetGradient), DensityError> {
        let aux_log_prob = self.aux_model.log_prob_sum(&inp.aux)?;
        let aux_grad = self
            .aux_model
            .grad_log_prob(&inp.aux)?
            .into_iter()
            .map(|g| -g)
            .collect();
        let (energy, pos_grad) = self.energy_and_grad(inp)?;
        let pos = SiteTensor::from_flat(inp.pos.shape().to_vec(), pos_grad.as_slice())?;
        Ok((
            -aux_log_prob + energy,
            TargetGradient { pos, aux: aux_grad },
        ))
    }
}

impl DensityModel for TargetDensity {
    type Sample = AugmentedData;

    fn potential(&self, inp: &AugmentedData) -> Result<f64, DensityError> {
        let aux_log_prob = self.aux_model.log_prob_sum(&inp.aux)?;
        let (energy, _) = self.energy_and_grad(inp)?;
        Ok(-aux_log_prob + energy)
    }

    fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Transformed<AugmentedData>, DensityError> {
        let data = self.data.as_ref().ok_or_else(|| {
            DensityError::NotSupported(
                "sampling the target without a dataset is not implemented".to_string(),
            )
        })?;
        if data.is_empty() {
            return Err(DensityError::MissingData("dataset has no frames".to_string()));
        }
        let layout = self.layout();
        let index = rng.gen_range(0..data.len());

        let max = data
            .box_max(index)
            .ok_or_else(|| DensityError::MissingData(format!("frame {} has no box", index)))?;
        let simulation_box = SimulationBox::from_max(*max)?;
        let positions = data
            .positions(index)
            .ok_or_else(|| DensityError::MissingData(format!("frame {} is missing", index)))?;
        let pos = SiteTensor::configuration(layout, positions.to_vec())?;
        let force = data
            .force(index)
            .map(|f| SiteTensor::configuration(layout, f.to_vec()))
            .transpose()?;
        let aux = self.aux_model.sample(rng);
        let sign = (0..layout.n_molecules).map(|_| random_sign(rng)).collect();

        Ok(Transformed::new(
            AugmentedData {
                pos,
                aux,
                sign,
                simulation_box,
                force,
            },
            0.0,
        ))
    }
}
