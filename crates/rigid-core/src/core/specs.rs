use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Description of the physical system a density is defined over.
///
/// The `Display` form (`{ice_type}_T{temperature}_N{num_molecules}`) names the model and data
/// files that belong to the system.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SystemSpecification {
    pub path: PathBuf,
    pub ice_type: String,
    pub num_molecules: usize,
    /// Temperature in K.
    pub temperature: f64,
    #[serde(default)]
    pub recompute_forces: bool,
}

impl SystemSpecification {
    /// `{path}/model-{specs}.json`
    pub fn model_path(&self) -> PathBuf {
        self.path.join(format!("model-{}.json", self))
    }

    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = path.to_path_buf();
        self
    }
}

impl fmt::Display for SystemSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_T{}_N{}",
            self.ice_type, self.temperature, self.num_molecules
        )
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BaseSpecification {
    pub rot_concentration: f64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TargetSpecification {
    #[serde(default)]
    pub cutoff_threshold: Option<f64>,
}
