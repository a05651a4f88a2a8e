use super::error::EngineFailure;
use crate::core::forcefield::params::PairParams;
use crate::core::forcefield::potentials::{coulomb, lennard_jones_12_6};
use crate::core::models::simulation_box::BoxVectors;
use crate::core::models::sites::SiteLayout;
use crate::core::models::water_model::{VirtualSiteRule, WaterModel};
use nalgebra::Vector3;
use tracing::trace;

const MIN_DISTANCE: f64 = 1e-6;
const OFF_DIAGONAL_TOLERANCE: f64 = 1e-12;

/// Potential energy and per-particle forces in engine-native units
/// (kJ/mol and kJ/(mol·nm)).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    pub potential_energy: f64,
    pub forces: Vec<Vector3<f64>>,
}

/// A stateful physics engine context.
///
/// Every call mutates the context in place: positions and box vectors stay set until the next
/// call overwrites them. Implementations are queried, never traced through.
pub trait Engine: Send {
    fn num_particles(&self) -> usize;

    fn set_periodic_box_vectors(&mut self, vectors: &BoxVectors) -> Result<(), EngineFailure>;

    fn set_positions(&mut self, positions: &[Vector3<f64>]) -> Result<(), EngineFailure>;

    /// Recomputes virtual-site positions from the real sites currently set.
    fn compute_virtual_sites(&mut self) -> Result<(), EngineFailure>;

    fn state(&mut self) -> Result<EngineState, EngineFailure>;
}

/// In-process engine for rigid water models with an orthorhombic periodic box.
///
/// Intermolecular Lennard-Jones and Coulomb interactions are truncated at the model cutoff and
/// evaluated under the minimum-image convention. Forces acting on a virtual site are spread onto
/// its parent sites; the entry reported for the virtual site itself keeps the force that acted on
/// it before spreading.
#[derive(Debug, Clone)]
pub struct ReferenceEngine {
    layout: SiteLayout,
    pair_params: Vec<PairParams>,
    virtual_site: Option<VirtualSiteRule>,
    cutoff: f64,
    box_lengths: Option<Vector3<f64>>,
    positions: Option<Vec<Vector3<f64>>>,
}

impl ReferenceEngine {
    pub fn new(model: &WaterModel) -> Self {
        let sites = model.sites();
        let pair_params = sites
            .iter()
            .flat_map(|a| sites.iter().map(move |b| PairParams::combine(a, b)))
            .collect();
        Self {
            layout: model.layout(),
            pair_params,
            virtual_site: model.virtual_site().cloned(),
            cutoff: model.cutoff(),
            box_lengths: None,
            positions: None,
        }
    }

    #[inline]
    fn pair(&self, a: usize, b: usize) -> &PairParams {
        &self.pair_params[a * self.layout.n_sites + b]
    }

    #[inline]
    fn minimum_image(delta: Vector3<f64>, lengths: &Vector3<f64>) -> Vector3<f64> {
        delta.zip_map(lengths, |d, l| d - l * (d / l).round())
    }
}

impl Engine for ReferenceEngine {
    fn num_particles(&self) -> usize {
        self.layout.n_atoms()
    }

    fn set_periodic_box_vectors(&mut self, vectors: &BoxVectors) -> Result<(), EngineFailure> {
        let off_diagonal = (0..3)
            .flat_map(|i| (0..3).map(move |j| (i, j)))
            .filter(|(i, j)| i != j)
            .any(|(i, j)| vectors[(i, j)].abs() > OFF_DIAGONAL_TOLERANCE);
        if off_diagonal {
            return Err(EngineFailure::UnsupportedBox(
                "triclinic boxes are not supported".to_string(),
            ));
        }
        let lengths = vectors.diagonal();
        if lengths.iter().any(|&l| !l.is_finite() || l <= 0.0) {
            return Err(EngineFailure::UnsupportedBox(format!(
                "box lengths must be positive, got {:?}",
                lengths.as_slice()
            )));
        }
        let shortest = lengths.min();
        if self.cutoff > 0.5 * shortest {
            return Err(EngineFailure::UnsupportedBox(format!(
                "cutoff {} exceeds half the shortest box length {}",
                self.cutoff, shortest
            )));
        }
        self.box_lengths = Some(lengths);
        Ok(())
    }

    fn set_positions(&mut self, positions: &[Vector3<f64>]) -> Result<(), EngineFailure> {
        if positions.len() != self.num_particles() {
            return Err(EngineFailure::ParticleCountMismatch {
                expected: self.num_particles(),
                found: positions.len(),
            });
        }
        self.positions = Some(positions.to_vec());
        Ok(())
    }

    fn compute_virtual_sites(&mut self) -> Result<(), EngineFailure> {
        let n_sites = self.layout.n_sites;
        let positions = self
            .positions
            .as_mut()
            .ok_or(EngineFailure::PositionsNotSet)?;
        if let Some(rule) = &self.virtual_site {
            for molecule in positions.chunks_exact_mut(n_sites) {
                molecule[rule.site] = rule
                    .parents
                    .iter()
                    .zip(rule.weights)
                    .map(|(&p, w)| molecule[p] * w)
                    .sum();
            }
        }
        Ok(())
    }

    fn state(&mut self) -> Result<EngineState, EngineFailure> {
        let positions = self
            .positions
            .as_ref()
            .ok_or(EngineFailure::PositionsNotSet)?;
        let lengths = self.box_lengths.ok_or(EngineFailure::BoxNotSet)?;
        if let Some(particle) = positions
            .iter()
            .position(|p| p.iter().any(|c| !c.is_finite()))
        {
            return Err(EngineFailure::NonFiniteCoordinate { particle });
        }

        let n_sites = self.layout.n_sites;
        let n = positions.len();
        let mut energy = 0.0;
        let mut forces = vec![Vector3::zeros(); n];

        for i in 0..n {
            let (mol_i, site_i) = (i / n_sites, i % n_sites);
            for j in (i + 1)..n {
                let (mol_j, site_j) = (j / n_sites, j % n_sites);
                if mol_i == mol_j {
                    continue;
                }
                let params = self.pair(site_i, site_j);
                if params.is_inert() {
                    continue;
                }
                let delta = Self::minimum_image(positions[i] - positions[j], &lengths);
                let dist = delta.norm();
                if dist > self.cutoff {
                    continue;
                }
                if dist < MIN_DISTANCE {
                    return Err(EngineFailure::ParticleOverlap {
                        first: i,
                        second: j,
                    });
                }
                let term = lennard_jones_12_6(dist, params.sigma, params.epsilon)
                    + coulomb(dist, params.q1, params.q2);
                energy += term.energy;
                let force = delta * (-term.derivative / dist);
                forces[i] += force;
                forces[j] -= force;
            }
        }

        if let Some(rule) = &self.virtual_site {
            for molecule in forces.chunks_exact_mut(n_sites) {
                let on_site = molecule[rule.site];
                for (&parent, weight) in rule.parents.iter().zip(rule.weights) {
                    molecule[parent] += on_site * weight;
                }
            }
        }

        trace!(energy, "Reference engine evaluated state.");
        Ok(EngineState {
            potential_energy: energy,
            forces,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{two_waters, two_waters_model};
    use nalgebra::Matrix3;

    fn engine_with_box(length: f64) -> ReferenceEngine {
        let mut engine = ReferenceEngine::new(&two_waters_model(0.3));
        engine
            .set_periodic_box_vectors(&Matrix3::from_diagonal_element(length))
            .unwrap();
        engine
    }

    fn energy_at(engine: &mut ReferenceEngine, positions: &[Vector3<f64>]) -> f64 {
        engine.set_positions(positions).unwrap();
        engine.compute_virtual_sites().unwrap();
        engine.state().unwrap().potential_energy
    }

    #[test]
    fn compute_virtual_sites_places_site_at_weighted_average() {
        let mut engine = engine_with_box(3.0);
        let mut positions = two_waters(0.3);
        positions[3] = Vector3::new(9.0, 9.0, 9.0);
        engine.set_positions(&positions).unwrap();
        engine.compute_virtual_sites().unwrap();
        let placed = engine.positions.as_ref().unwrap()[3];
        let expected = positions[0] * 0.786646558 + positions[1] * 0.106676721 + positions[2] * 0.106676721;
        assert!((placed - expected).norm() < 1e-12);
    }

    #[test]
    fn interacting_waters_have_finite_energy_and_balanced_forces() {
        let mut engine = engine_with_box(3.0);
        engine.set_positions(&two_waters(0.3)).unwrap();
        engine.compute_virtual_sites().unwrap();
        let state = engine.state().unwrap();

        assert!(state.potential_energy.is_finite());
        assert!(state.potential_energy != 0.0);
        let net: Vector3<f64> = state
            .forces
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 4 != 3)
            .map(|(_, f)| *f)
            .sum();
        assert!(net.norm() < 1e-8);
    }

    #[test]
    fn forces_on_real_sites_are_negative_energy_gradient() {
        let mut engine = engine_with_box(3.0);
        let positions = two_waters(0.3);
        engine.set_positions(&positions).unwrap();
        engine.compute_virtual_sites().unwrap();
        let forces = engine.state().unwrap().forces;

        let h = 1e-6;
        for atom in [0, 1, 2, 4, 6] {
            for axis in 0..3 {
                let mut plus = positions.clone();
                let mut minus = positions.clone();
                plus[atom][axis] += h;
                minus[atom][axis] -= h;
                let numeric =
                    (energy_at(&mut engine, &plus) - energy_at(&mut engine, &minus)) / (2.0 * h);
                let analytic = -forces[atom][axis];
                assert!(
                    (numeric - analytic).abs() < 1e-4 * analytic.abs().max(1.0),
                    "atom {atom} axis {axis}: numeric {numeric}, analytic {analytic}"
                );
            }
        }
    }

    #[test]
    fn virtual_site_entry_keeps_raw_force() {
        let mut engine = engine_with_box(3.0);
        engine.set_positions(&two_waters(0.3)).unwrap();
        engine.compute_virtual_sites().unwrap();
        let state = engine.state().unwrap();
        assert!(state.forces[3].norm() > 0.0);
        assert!(state.forces[7].norm() > 0.0);
    }

    #[test]
    fn periodic_images_are_equivalent() {
        let mut engine = engine_with_box(3.0);
        let positions = two_waters(0.3);
        let shifted: Vec<_> = positions
            .iter()
            .enumerate()
            .map(|(i, p)| if i >= 4 { p + Vector3::new(3.0, 0.0, -3.0) } else { *p })
            .collect();
        let a = energy_at(&mut engine, &positions);
        let b = energy_at(&mut engine, &shifted);
        assert!((a - b).abs() < 1e-9 * a.abs().max(1.0));
    }

    #[test]
    fn molecules_beyond_cutoff_do_not_interact() {
        let mut engine = ReferenceEngine::new(&two_waters_model(1.2));
        engine
            .set_periodic_box_vectors(&Matrix3::from_diagonal_element(4.0))
            .unwrap();
        assert_eq!(energy_at(&mut engine, &two_waters(1.2)), 0.0);
    }

    #[test]
    fn state_requires_positions_and_box() {
        let mut engine = ReferenceEngine::new(&two_waters_model(0.3));
        assert_eq!(engine.state(), Err(EngineFailure::PositionsNotSet));
        engine.set_positions(&two_waters(0.3)).unwrap();
        assert_eq!(engine.state(), Err(EngineFailure::BoxNotSet));
    }

    #[test]
    fn non_finite_coordinate_is_reported() {
        let mut engine = engine_with_box(3.0);
        let mut positions = two_waters(0.3);
        positions[5].y = f64::NAN;
        engine.set_positions(&positions).unwrap();
        assert_eq!(
            engine.state(),
            Err(EngineFailure::NonFiniteCoordinate { particle: 5 })
        );
    }

    #[test]
    fn overlapping_molecules_are_reported() {
        let mut engine = engine_with_box(3.0);
        let mut positions = two_waters(0.3);
        for i in 4..8 {
            positions[i] = positions[i - 4];
        }
        engine.set_positions(&positions).unwrap();
        assert!(matches!(
            engine.state(),
            Err(EngineFailure::ParticleOverlap { .. })
        ));
    }

    #[test]
    fn wrong_particle_count_is_rejected() {
        let mut engine = engine_with_box(3.0);
        let result = engine.set_positions(&[Vector3::zeros(); 3]);
        assert_eq!(
            result,
            Err(EngineFailure::ParticleCountMismatch {
                expected: 8,
                found: 3
            })
        );
    }

    #[test]
    fn triclinic_and_undersized_boxes_are_rejected() {
        let mut engine = ReferenceEngine::new(&two_waters_model(0.3));
        let mut triclinic = Matrix3::from_diagonal_element(3.0);
        triclinic[(1, 0)] = 0.5;
        assert!(matches!(
            engine.set_periodic_box_vectors(&triclinic),
            Err(EngineFailure::UnsupportedBox(_))
        ));
        assert!(matches!(
            engine.set_periodic_box_vectors(&Matrix3::from_diagonal_element(1.0)),
            Err(EngineFailure::UnsupportedBox(_))
        ));
    }
}
