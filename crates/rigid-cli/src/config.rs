use rigid_flows::core::specs::{BaseSpecification, SystemSpecification, TargetSpecification};
use rigid_flows::engine::oracle::ErrorHandling;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read run file '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse run file '{path}': {source}", path = path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Contents of a run file.
///
/// A relative `system.path` is resolved against the directory holding the run file. The
/// temperature override only affects [`RunConfig::temperature`]; `system` keeps naming the
/// model file it was written for.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RunConfig {
    pub system: SystemSpecification,
    pub base: BaseSpecification,
    #[serde(default)]
    pub target: TargetSpecification,
    #[serde(default)]
    pub error_handling: ErrorHandling,
    #[serde(default)]
    pub auxiliary_shape: usize,
    #[serde(skip)]
    pub temperature_override: Option<f64>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading run configuration from {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::Toml {
            path: path.to_path_buf(),
            source: e,
        })?;
        if config.system.path.is_relative() {
            if let Some(dir) = path.parent() {
                let resolved = dir.join(&config.system.path);
                config.system = config.system.with_path(&resolved);
            }
        }
        Ok(config)
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        if temperature.is_some() {
            self.temperature_override = temperature;
        }
        self
    }

    /// Temperature (K) the oracle runs at.
    pub fn temperature(&self) -> f64 {
        self.temperature_override.unwrap_or(self.system.temperature)
    }

    pub fn with_error_handling(mut self, error_handling: Option<ErrorHandling>) -> Self {
        if let Some(policy) = error_handling {
            self.error_handling = policy;
        }
        self
    }
}
