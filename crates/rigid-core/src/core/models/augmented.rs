use super::simulation_box::SimulationBox;
use super::sites::SiteTensor;

/// A configuration in the target's coordinates.
///
/// `pos` holds every site (including virtual sites) laid out as `(n_molecules, n_sites)`.
/// `sign` carries one `±1` entry per molecule and resolves the quaternion double cover when the
/// configuration is mapped back to rotations.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedData {
    pub pos: SiteTensor,
    pub aux: Vec<f64>,
    pub sign: Vec<f64>,
    pub simulation_box: SimulationBox,
    pub force: Option<SiteTensor>,
}
