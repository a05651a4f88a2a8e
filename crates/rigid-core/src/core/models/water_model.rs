use super::simulation_box::BoxVectors;
use super::sites::SiteLayout;
use super::state::{REFERENCE_HOH_ANGLE, REFERENCE_OH_DISTANCE};
use crate::core::forcefield::params::SiteParams;
use nalgebra::{Matrix3, Vector3};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const DEFAULT_CUTOFF: f64 = 0.9;

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("JSON parsing error for '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("Invalid water model description: {0}")]
    Invalid(String),
}

/// Position of a virtual site as a weighted average of three real sites of the same molecule.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VirtualSiteRule {
    pub site: usize,
    pub parents: [usize; 3],
    pub weights: [f64; 3],
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WaterModelFile {
    n_molecules: usize,
    sites: Vec<SiteParams>,
    #[serde(default)]
    virtual_site: Option<VirtualSiteRule>,
    #[serde(rename = "box")]
    box_vectors: [[f64; 3]; 3],
    positions: Vec<[f64; 3]>,
    #[serde(default = "default_cutoff")]
    cutoff: f64,
}

fn default_cutoff() -> f64 {
    DEFAULT_CUTOFF
}

/// Topology, parameters and default configuration of a rigid water system.
///
/// Every molecule shares the same site template; atom `i` belongs to molecule `i / n_sites`
/// and template site `i % n_sites`.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterModel {
    layout: SiteLayout,
    sites: Vec<SiteParams>,
    virtual_site: Option<VirtualSiteRule>,
    box_vectors: BoxVectors,
    positions: Vec<Vector3<f64>>,
    cutoff: f64,
}

impl WaterModel {
    pub fn new(
        n_molecules: usize,
        sites: Vec<SiteParams>,
        virtual_site: Option<VirtualSiteRule>,
        box_vectors: BoxVectors,
        positions: Vec<Vector3<f64>>,
        cutoff: f64,
    ) -> Result<Self, ModelLoadError> {
        let layout = SiteLayout::new(n_molecules, sites.len());
        if n_molecules == 0 || sites.is_empty() {
            return Err(ModelLoadError::Invalid(
                "a model needs at least one molecule and one site".to_string(),
            ));
        }
        if let Some(rule) = &virtual_site {
            let out_of_range = std::iter::once(rule.site)
                .chain(rule.parents)
                .any(|i| i >= layout.n_sites);
            if out_of_range || rule.parents.contains(&rule.site) {
                return Err(ModelLoadError::Invalid(format!(
                    "virtual site rule {:?} does not fit a {}-site template",
                    rule, layout.n_sites
                )));
            }
        }
        if positions.len() != layout.n_atoms() {
            return Err(ModelLoadError::Invalid(format!(
                "expected {} default positions, found {}",
                layout.n_atoms(),
                positions.len()
            )));
        }
        if !cutoff.is_finite() || cutoff <= 0.0 {
            return Err(ModelLoadError::Invalid(format!(
                "nonbonded cutoff must be positive, got {}",
                cutoff
            )));
        }
        Ok(Self {
            layout,
            sites,
            virtual_site,
            box_vectors,
            positions,
            cutoff,
        })
    }

    pub fn load_from_json(path: &Path) -> Result<Self, ModelLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ModelLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: WaterModelFile =
            serde_json::from_str(&content).map_err(|e| ModelLoadError::Json {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;
        Self::new(
            file.n_molecules,
            file.sites,
            file.virtual_site,
            Matrix3::from_row_slice(&file.box_vectors.concat()),
            file.positions.into_iter().map(Vector3::from).collect(),
            file.cutoff,
        )
    }

    pub fn layout(&self) -> SiteLayout {
        self.layout
    }

    pub fn n_atoms(&self) -> usize {
        self.layout.n_atoms()
    }

    pub fn n_molecules(&self) -> usize {
        self.layout.n_molecules
    }

    pub fn n_sites(&self) -> usize {
        self.layout.n_sites
    }

    pub fn sites(&self) -> &[SiteParams] {
        &self.sites
    }

    pub fn virtual_site(&self) -> Option<&VirtualSiteRule> {
        self.virtual_site.as_ref()
    }

    /// Per-atom flag, `true` where the atom is a virtual site.
    pub fn virtual_site_mask(&self) -> Vec<bool> {
        let vs = self.virtual_site.as_ref().map(|rule| rule.site);
        (0..self.n_atoms())
            .map(|i| Some(i % self.layout.n_sites) == vs)
            .collect()
    }

    pub fn box_vectors(&self) -> &BoxVectors {
        &self.box_vectors
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }
}

/// TIP4P/Ew site template (O, H1, H2, M) and the rule placing M.
pub fn tip4p_ew() -> (Vec<SiteParams>, VirtualSiteRule) {
    let site = |name: &str, charge: f64, sigma: f64, epsilon: f64| SiteParams {
        name: name.to_string(),
        charge,
        sigma,
        epsilon,
    };
    let sites = vec![
        site("O", 0.0, 0.316435, 0.680946),
        site("H1", 0.52422, 0.0, 0.0),
        site("H2", 0.52422, 0.0, 0.0),
        site("M", -1.04844, 0.0, 0.0),
    ];
    let rule = VirtualSiteRule {
        site: 3,
        parents: [0, 1, 2],
        weights: [0.786646558, 0.106676721, 0.106676721],
    };
    (sites, rule)
}

/// O, H1 and H2 positions of a molecule at the reference geometry, in the xy-plane.
pub fn reference_geometry(oxygen: Vector3<f64>) -> [Vector3<f64>; 3] {
    let half = 0.5 * REFERENCE_HOH_ANGLE;
    let h1 = Vector3::new(half.cos(), half.sin(), 0.0) * REFERENCE_OH_DISTANCE;
    let h2 = Vector3::new(half.cos(), -half.sin(), 0.0) * REFERENCE_OH_DISTANCE;
    [oxygen, oxygen + h1, oxygen + h2]
}
