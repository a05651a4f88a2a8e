use super::autodiff::{CustomVjp, Potential, check_dim};
use super::batch::BatchEvaluator;
use super::error::PotentialError;
use super::oracle::ErrorHandling;
use crate::core::models::sites::{SiteLayout, SiteTensor};
use nalgebra::{DVector, Matrix3, Vector3};

/// Energy of one configuration or of a batch, in units of kbT.
#[derive(Debug, Clone, PartialEq)]
pub enum EnergyValue {
    Scalar(f64),
    Batch(Vec<f64>),
}

impl EnergyValue {
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Self::Scalar(value) => std::slice::from_ref(value),
            Self::Batch(values) => values,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeInput {
    /// `(n_molecules, n_sites)` or `(batch, n_molecules, n_sites)` site positions.
    pub positions: SiteTensor,
    /// Edge lengths of a rectangular box; `None` keeps the box already set on the engine.
    pub box_size: Option<Vector3<f64>>,
    pub has_batch_dim: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeOutput {
    pub energy: EnergyValue,
    /// Forces shaped like the input positions.
    pub forces: SiteTensor,
    /// Batch indices the engine failed on. Their energy is `NaN` and their forces are zero.
    pub failed: Vec<usize>,
}

/// Differentiable view of the energy oracle.
///
/// The forward value is the batch-evaluated energy. The gradient with respect to positions is
/// the negated force scaled by the upstream cotangent. Every call overwrites the engine's
/// positions, and its box when a box size is given.
#[derive(Debug, Clone)]
pub struct EnergyBridge {
    evaluator: BatchEvaluator,
    error_handling: Option<ErrorHandling>,
}

impl EnergyBridge {
    pub fn new(evaluator: BatchEvaluator) -> Self {
        Self {
            evaluator,
            error_handling: None,
        }
    }

    /// Overrides the oracle's default policy for calls made through this bridge.
    pub fn with_error_handling(mut self, error_handling: ErrorHandling) -> Self {
        self.error_handling = Some(error_handling);
        self
    }

    pub fn layout(&self) -> SiteLayout {
        self.evaluator.layout()
    }

    fn check_shape(&self, positions: &SiteTensor, has_batch_dim: bool) -> Result<(), PotentialError> {
        let inner = self.layout().shape();
        let shape = positions.shape();
        let matches = if has_batch_dim {
            shape.len() == 3 && shape[1..] == inner
        } else {
            shape == inner
        };
        if !matches {
            let mut expected = inner.to_vec();
            if has_batch_dim {
                expected.insert(0, shape.first().copied().unwrap_or(0));
            }
            return Err(PotentialError::ShapeMismatch {
                expected,
                found: shape.to_vec(),
            });
        }
        Ok(())
    }

    pub fn energy_and_forces(
        &self,
        positions: &SiteTensor,
        box_size: Option<&Vector3<f64>>,
        has_batch_dim: bool,
    ) -> Result<BridgeOutput, PotentialError> {
        self.check_shape(positions, has_batch_dim)?;
        let configurations: Vec<&[Vector3<f64>]> = if has_batch_dim {
            positions.outer_chunks().collect()
        } else {
            vec![positions.as_slice()]
        };
        let box_vectors = box_size.map(Matrix3::from_diagonal);
        let arrays = self.evaluator.evaluate_arrays(
            &configurations,
            box_vectors.as_ref(),
            self.error_handling,
        )?;

        let forces = SiteTensor::new(positions.shape().to_vec(), arrays.forces.concat())?;
        let energy = if has_batch_dim {
            EnergyValue::Batch(arrays.energies)
        } else {
            EnergyValue::Scalar(arrays.energies.first().copied().unwrap_or(f64::NAN))
        };
        Ok(BridgeOutput {
            energy,
            forces,
            failed: arrays.failed,
        })
    }

    pub fn energy(
        &self,
        positions: &SiteTensor,
        box_size: Option<&Vector3<f64>>,
        has_batch_dim: bool,
    ) -> Result<EnergyValue, PotentialError> {
        self.energy_and_forces(positions, box_size, has_batch_dim)
            .map(|output| output.energy)
    }

    /// Fixes the box and exposes the bridge as a [`Potential`] over one flattened
    /// `(n_molecules, n_sites, 3)` configuration.
    pub fn bind(&self, box_size: Option<Vector3<f64>>) -> BridgePotential {
        BridgePotential {
            bridge: self.clone(),
            box_size,
        }
    }
}

impl CustomVjp for EnergyBridge {
    type Input = BridgeInput;
    type Output = EnergyValue;
    type Residual = SiteTensor;
    type Gradient = SiteTensor;

    fn forward(&self, input: &BridgeInput) -> Result<(EnergyValue, SiteTensor), PotentialError> {
        let output = self.energy_and_forces(
            &input.positions,
            input.box_size.as_ref(),
            input.has_batch_dim,
        )?;
        Ok((output.energy, output.forces))
    }

    fn backward(
        &self,
        forces: &SiteTensor,
        upstream: &EnergyValue,
    ) -> Result<SiteTensor, PotentialError> {
        let batched = forces.shape().len() == 3;
        match (upstream, batched) {
            (EnergyValue::Scalar(g), false) => Ok(forces.map(|f| -g * f)),
            (EnergyValue::Batch(gs), true) if gs.len() == forces.shape()[0] => {
                let data = forces
                    .outer_chunks()
                    .zip(gs)
                    .flat_map(|(block, g)| block.iter().map(move |f| -g * f))
                    .collect();
                Ok(SiteTensor::new(forces.shape().to_vec(), data)?)
            }
            _ => Err(PotentialError::CotangentMismatch(format!(
                "upstream of length {} does not match forces of shape {:?}",
                upstream.as_slice().len(),
                forces.shape()
            ))),
        }
    }
}

/// [`EnergyBridge`] with a fixed box, as a potential of one flattened configuration.
#[derive(Debug, Clone)]
pub struct BridgePotential {
    bridge: EnergyBridge,
    box_size: Option<Vector3<f64>>,
}

impl Potential for BridgePotential {
    fn dim(&self) -> usize {
        3 * self.bridge.layout().n_atoms()
    }

    fn value_and_grad(&self, x: &DVector<f64>) -> Result<(f64, DVector<f64>), PotentialError> {
        check_dim(self.dim(), x)?;
        let positions = SiteTensor::from_flat(self.bridge.layout().shape().to_vec(), x.as_slice())?;
        let output = self
            .bridge
            .energy_and_forces(&positions, self.box_size.as_ref(), false)?;
        let energy = output.energy.as_slice()[0];
        Ok((energy, -output.forces.to_dvector()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::autodiff::numerical_gradient;
    use crate::engine::oracle::EnergyOracle;
    use crate::engine::testing::{two_waters, two_waters_model};

    fn bridge() -> EnergyBridge {
        let oracle =
            EnergyOracle::from_model(&two_waters_model(0.3), 300.0, ErrorHandling::Raise)
                .unwrap();
        EnergyBridge::new(BatchEvaluator::from_oracle(oracle))
    }

    fn configuration(separation: f64) -> SiteTensor {
        SiteTensor::new(vec![2, 4], two_waters(separation)).unwrap()
    }

    fn batch() -> SiteTensor {
        SiteTensor::stack(&[configuration(0.29), configuration(0.33)]).unwrap()
    }

    #[test]
    fn unbatched_call_returns_scalar_energy() {
        let energy = bridge()
            .energy(&configuration(0.3), Some(&Vector3::new(3.0, 3.0, 3.0)), false)
            .unwrap();
        assert!(matches!(energy, EnergyValue::Scalar(e) if e.is_finite()));
    }

    #[test]
    fn batched_call_matches_unbatched_calls() {
        let bridge = bridge();
        let output = bridge.energy_and_forces(&batch(), None, true).unwrap();
        assert_eq!(output.forces.shape(), &[2, 2, 4]);

        for (i, separation) in [0.29, 0.33].into_iter().enumerate() {
            let single = bridge
                .energy_and_forces(&configuration(separation), None, false)
                .unwrap();
            assert_eq!(single.energy.as_slice()[0], output.energy.as_slice()[i]);
            assert_eq!(
                single.forces.as_slice(),
                output.forces.outer_chunks().nth(i).unwrap()
            );
        }
    }

    #[test]
    fn backward_is_negated_force_times_upstream() {
        let bridge = bridge();
        let input = BridgeInput {
            positions: batch(),
            box_size: None,
            has_batch_dim: true,
        };
        let (_, forces) = bridge.forward(&input).unwrap();
        let gradient = bridge
            .backward(&forces, &EnergyValue::Batch(vec![2.0, -1.0]))
            .unwrap();

        let mut blocks = gradient.outer_chunks().zip(forces.outer_chunks());
        let (g0, f0) = blocks.next().unwrap();
        let (g1, f1) = blocks.next().unwrap();
        for (g, f) in g0.iter().zip(f0) {
            assert_eq!(*g, -2.0 * f);
        }
        for (g, f) in g1.iter().zip(f1) {
            assert_eq!(*g, *f);
        }
    }

    #[test]
    fn bound_potential_gradient_matches_finite_differences() {
        let potential = bridge().bind(Some(Vector3::new(3.0, 3.0, 3.0)));
        let x = configuration(0.3).to_dvector();
        let (_, analytic) = potential.value_and_grad(&x).unwrap();
        let numeric = numerical_gradient(&potential, &x, 1e-6);
        let scale = analytic.amax().max(1.0);
        assert!(
            (&numeric - &analytic).amax() < 1e-4 * scale,
            "numeric {numeric}, analytic {analytic}"
        );
    }

    #[test]
    fn mismatched_cotangent_is_rejected() {
        let bridge = bridge();
        let (_, forces) = bridge
            .forward(&BridgeInput {
                positions: batch(),
                box_size: None,
                has_batch_dim: true,
            })
            .unwrap();
        assert!(matches!(
            bridge.backward(&forces, &EnergyValue::Scalar(1.0)),
            Err(PotentialError::CotangentMismatch(_))
        ));
        assert!(matches!(
            bridge.backward(&forces, &EnergyValue::Batch(vec![1.0; 3])),
            Err(PotentialError::CotangentMismatch(_))
        ));
    }

    #[test]
    fn wrong_shape_is_a_precondition_error() {
        let bridge = bridge();
        let wrong = SiteTensor::zeros(vec![2, 3]);
        assert!(matches!(
            bridge.energy(&wrong, None, false),
            Err(PotentialError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            bridge.energy(&configuration(0.3), None, true),
            Err(PotentialError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            bridge.energy(&batch(), None, false),
            Err(PotentialError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn failed_sample_surfaces_as_nan_with_zero_gradient() {
        let bridge = bridge().with_error_handling(ErrorHandling::Silent);
        let mut data = batch().into_vec();
        data[9].z = f64::NAN;
        let positions = SiteTensor::new(vec![2, 2, 4], data).unwrap();

        let output = bridge.energy_and_forces(&positions, None, true).unwrap();
        assert_eq!(output.failed, vec![1]);
        assert!(output.energy.as_slice()[1].is_nan());
        assert!(
            output
                .forces
                .outer_chunks()
                .nth(1)
                .unwrap()
                .iter()
                .all(|f| *f == Vector3::zeros())
        );
    }
}
