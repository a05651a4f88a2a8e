use super::{DensityError, DensityModel, Transformed, random_sign};
use crate::core::distributions::normal::DiagonalNormal;
use crate::core::distributions::von_mises_fisher::VonMisesFisher;
use crate::core::distributions::{DistributionError, logsumexp};
use crate::core::models::SPATIAL_DIM;
use crate::core::models::simulation_box::SimulationBox;
use crate::core::models::state::{InternalCoordinates, State};
use crate::core::specs::{BaseSpecification, SystemSpecification};
use nalgebra::{Vector3, Vector4};
use rand::Rng;
use tracing::{debug, instrument};

/// Analytic prior over [`State`]s.
///
/// Rotations follow a von Mises-Fisher distribution symmetrized over the quaternion double
/// cover; positions and auxiliaries follow independent normals. Internal coordinates are not
/// modeled and stay at the reference geometry.
#[derive(Debug, Clone)]
pub struct BaseDensity {
    rot_model: VonMisesFisher,
    pos_model: DiagonalNormal,
    aux_model: DiagonalNormal,
    simulation_box: SimulationBox,
}

impl BaseDensity {
    /// `pos_model` covers `(n_molecules, 3)` components in row-major order.
    pub fn new(
        simulation_box: SimulationBox,
        rot_model: VonMisesFisher,
        pos_model: DiagonalNormal,
        aux_model: DiagonalNormal,
    ) -> Result<Self, DensityError> {
        let expected = SPATIAL_DIM * rot_model.len();
        if pos_model.dim() != expected {
            return Err(DistributionError::DimensionMismatch {
                expected,
                found: pos_model.dim(),
            }
            .into());
        }
        Ok(Self {
            rot_model,
            pos_model,
            aux_model,
            simulation_box,
        })
    }

    /// Identity-centered rotations with the configured concentration, standard normal
    /// positions and auxiliaries.
    #[instrument(skip_all, name = "base_density_from_specs", fields(system = %system_specs))]
    pub fn from_specs(
        system_specs: &SystemSpecification,
        base_specs: &BaseSpecification,
        simulation_box: SimulationBox,
        auxiliary_shape: usize,
    ) -> Result<Self, DensityError> {
        let n = system_specs.num_molecules;
        let rot_model = VonMisesFisher::new(
            vec![Vector4::new(1.0, 0.0, 0.0, 0.0); n],
            vec![base_specs.rot_concentration; n],
        )?;
        debug!(
            n_molecules = n,
            concentration = base_specs.rot_concentration,
            auxiliary_shape,
            "Building base density."
        );
        Self::new(
            simulation_box,
            rot_model,
            DiagonalNormal::standard(SPATIAL_DIM * n),
            DiagonalNormal::standard(auxiliary_shape),
        )
    }

    pub fn num_molecules(&self) -> usize {
        self.rot_model.len()
    }

    pub fn simulation_box(&self) -> &SimulationBox {
        &self.simulation_box
    }

    /// Σ over molecules of `ln(p(q) + p(-q))`.
    fn rotation_log_prob(&self, rot: &[Vector4<f64>]) -> Result<f64, DensityError> {
        let forward = self.rot_model.log_prob_each(rot)?;
        let flipped: Vec<_> = rot.iter().map(|q| -q).collect();
        let backward = self.rot_model.log_prob_each(&flipped)?;
        Ok(forward
            .iter()
            .zip(&backward)
            .map(|(a, b)| logsumexp(&[*a, *b]))
            .sum())
    }
}

fn flatten(vectors: &[Vector3<f64>]) -> Vec<f64> {
    vectors.iter().flat_map(|v| [v.x, v.y, v.z]).collect()
}

impl DensityModel for BaseDensity {
    type Sample = State;

    fn potential(&self, state: &State) -> Result<f64, DensityError> {
        let rot = self.rotation_log_prob(&state.rot)?;
        let pos = self.pos_model.log_prob_sum(&flatten(&state.pos))?;
        let aux = self.aux_model.log_prob_sum(&state.aux)?;
        Ok(-(rot + aux + pos))
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Transformed<State>, DensityError> {
        let rot = self
            .rot_model
            .sample(rng)
            .into_iter()
            .map(|q| q * random_sign(rng))
            .collect();
        let pos = self
            .pos_model
            .sample(rng)
            .chunks_exact(SPATIAL_DIM)
            .map(Vector3::from_column_slice)
            .collect();
        let aux = self.aux_model.sample(rng);
        let state = State {
            rot,
            pos,
            ics: InternalCoordinates::reference(self.num_molecules()),
            aux,
            simulation_box: self.simulation_box,
        };
        let log_prob = self.potential(&state)?;
        Ok(Transformed::new(state, log_prob))
    }
}
