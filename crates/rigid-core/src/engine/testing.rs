use super::context::{Engine, EngineState};
use super::error::EngineFailure;
use crate::core::models::simulation_box::BoxVectors;
use crate::core::models::water_model::{WaterModel, reference_geometry, tip4p_ew};
use nalgebra::{Matrix3, Vector3};
use std::sync::{Arc, Mutex};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Two TIP4P/Ew molecules at the reference geometry, oxygens `separation` nm apart along x.
pub fn two_waters(separation: f64) -> Vec<Vector3<f64>> {
    let (_, rule) = tip4p_ew();
    [Vector3::zeros(), Vector3::new(separation, 0.0, 0.0)]
        .into_iter()
        .flat_map(|oxygen| {
            let [o, h1, h2] = reference_geometry(oxygen);
            let m = o * rule.weights[0] + h1 * rule.weights[1] + h2 * rule.weights[2];
            [o, h1, h2, m]
        })
        .collect()
}

pub fn two_waters_model(separation: f64) -> WaterModel {
    let (sites, rule) = tip4p_ew();
    WaterModel::new(
        2,
        sites,
        Some(rule),
        Matrix3::from_diagonal_element(3.0),
        two_waters(separation),
        0.9,
    )
    .unwrap()
}

/// JSON model description of [`two_waters_model`] with a 2 nm box.
pub fn two_waters_json(separation: f64) -> String {
    let positions: Vec<[f64; 3]> = two_waters(separation)
        .iter()
        .map(|p| [p.x, p.y, p.z])
        .collect();
    format!(
        r#"{{
            "n_molecules": 2,
            "sites": [
                {{"name": "O", "charge": 0.0, "sigma": 0.316435, "epsilon": 0.680946}},
                {{"name": "H1", "charge": 0.52422}},
                {{"name": "H2", "charge": 0.52422}},
                {{"name": "M", "charge": -1.04844}}
            ],
            "virtual_site": {{"site": 3, "parents": [0, 1, 2], "weights": [0.786646558, 0.106676721, 0.106676721]}},
            "box": [[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]],
            "positions": {}
        }}"#,
        serde_json::to_string(&positions).unwrap()
    )
}

/// Calls a [`HarmonicEngine`] received, shared with the test that built it.
#[derive(Debug, Default)]
pub struct EngineCalls {
    pub box_sets: Vec<BoxVectors>,
    pub virtual_site_calls: usize,
}

/// Engine with a harmonic well around fixed anchors.
///
/// Reports `0.5 * k * |x - anchor|^2` and `-k * (x - anchor)` for every particle, virtual sites
/// included, and fails on non-finite coordinates.
#[derive(Debug, Clone)]
pub struct HarmonicEngine {
    pub anchors: Vec<Vector3<f64>>,
    pub stiffness: f64,
    pub positions: Option<Vec<Vector3<f64>>>,
    calls: Arc<Mutex<EngineCalls>>,
}

impl HarmonicEngine {
    pub fn new(anchors: Vec<Vector3<f64>>, stiffness: f64) -> Self {
        Self {
            anchors,
            stiffness,
            positions: None,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<EngineCalls>> {
        Arc::clone(&self.calls)
    }
}

impl Engine for HarmonicEngine {
    fn num_particles(&self) -> usize {
        self.anchors.len()
    }

    fn set_periodic_box_vectors(&mut self, vectors: &BoxVectors) -> Result<(), EngineFailure> {
        self.calls.lock().unwrap().box_sets.push(*vectors);
        Ok(())
    }

    fn set_positions(&mut self, positions: &[Vector3<f64>]) -> Result<(), EngineFailure> {
        self.positions = Some(positions.to_vec());
        Ok(())
    }

    fn compute_virtual_sites(&mut self) -> Result<(), EngineFailure> {
        self.calls.lock().unwrap().virtual_site_calls += 1;
        Ok(())
    }

    fn state(&mut self) -> Result<EngineState, EngineFailure> {
        let positions = self
            .positions
            .as_ref()
            .ok_or(EngineFailure::PositionsNotSet)?;
        if let Some(particle) = positions
            .iter()
            .position(|p| p.iter().any(|c| !c.is_finite()))
        {
            return Err(EngineFailure::NonFiniteCoordinate { particle });
        }
        let displacements: Vec<_> = positions
            .iter()
            .zip(&self.anchors)
            .map(|(x, a)| x - a)
            .collect();
        Ok(EngineState {
            potential_energy: 0.5
                * self.stiffness
                * displacements.iter().map(|d| d.norm_squared()).sum::<f64>(),
            forces: displacements.iter().map(|d| -self.stiffness * d).collect(),
        })
    }
}

/// Counts `WARN` events emitted while installed as the default subscriber.
#[derive(Debug, Clone, Default)]
pub struct WarningCounter {
    count: Arc<Mutex<usize>>,
}

impl WarningCounter {
    pub fn count(&self) -> usize {
        *self.count.lock().unwrap()
    }
}

impl<S: Subscriber> Layer<S> for WarningCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            *self.count.lock().unwrap() += 1;
        }
    }
}
