use crate::config::ConfigError;
use rigid_flows::core::models::dataset::DatasetError;
use rigid_flows::core::models::simulation_box::SimulationBoxError;
use rigid_flows::core::models::sites::ShapeError;
use rigid_flows::core::models::water_model::ModelLoadError;
use rigid_flows::density::DensityError;
use rigid_flows::engine::error::{OracleError, PotentialError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Density(#[from] DensityError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Potential(#[from] PotentialError),

    #[error(transparent)]
    Model(#[from] ModelLoadError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    SimulationBox(#[from] SimulationBoxError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
