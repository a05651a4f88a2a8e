use super::simulation_box::SimulationBox;
use nalgebra::{Vector3, Vector4};

/// Reference O-H bond length in nm.
pub const REFERENCE_OH_DISTANCE: f64 = 0.09572;
/// Reference H-O-H angle in radians.
pub const REFERENCE_HOH_ANGLE: f64 = 1.824218;

/// Internal coordinates of each rigid water molecule: both O-H distances and the H-O-H angle.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalCoordinates {
    pub d_oh1: Vec<f64>,
    pub d_oh2: Vec<f64>,
    pub a_hoh: Vec<f64>,
}

impl InternalCoordinates {
    /// Every molecule at the reference geometry.
    pub fn reference(n_molecules: usize) -> Self {
        Self {
            d_oh1: vec![REFERENCE_OH_DISTANCE; n_molecules],
            d_oh2: vec![REFERENCE_OH_DISTANCE; n_molecules],
            a_hoh: vec![REFERENCE_HOH_ANGLE; n_molecules],
        }
    }
}

/// A configuration in the prior's coordinates.
///
/// Rotations are unit quaternions stored scalar-first (`w, x, y, z`). A quaternion and its
/// negation describe the same physical rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub rot: Vec<Vector4<f64>>,
    pub pos: Vec<Vector3<f64>>,
    pub ics: InternalCoordinates,
    pub aux: Vec<f64>,
    pub simulation_box: SimulationBox,
}

impl State {
    pub fn num_molecules(&self) -> usize {
        self.rot.len()
    }

    /// Same state with the quaternion of `molecule` replaced by its negation.
    pub fn with_flipped_rotation(&self, molecule: usize) -> Self {
        let mut flipped = self.clone();
        if let Some(q) = flipped.rot.get_mut(molecule) {
            *q = -*q;
        }
        flipped
    }
}
