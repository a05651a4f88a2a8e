use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

/// Periodic box vectors, one vector per row.
pub type BoxVectors = Matrix3<f64>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationBoxError {
    #[error("Simulation box must have a strictly positive size along every axis, got {size:?}")]
    NonPositiveSize { size: [f64; 3] },
}

/// Axis-aligned simulation box spanned by a `min` and a `max` corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationBox {
    max: Vector3<f64>,
    min: Vector3<f64>,
}

impl SimulationBox {
    pub fn new(max: Vector3<f64>, min: Vector3<f64>) -> Result<Self, SimulationBoxError> {
        let size = max - min;
        if size.iter().any(|&s| !s.is_finite() || s <= 0.0) {
            return Err(SimulationBoxError::NonPositiveSize {
                size: [size.x, size.y, size.z],
            });
        }
        Ok(Self { max, min })
    }

    /// Box anchored at the origin.
    pub fn from_max(max: Vector3<f64>) -> Result<Self, SimulationBoxError> {
        Self::new(max, Vector3::zeros())
    }

    pub fn max(&self) -> &Vector3<f64> {
        &self.max
    }

    pub fn min(&self) -> &Vector3<f64> {
        &self.min
    }

    #[inline]
    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Diagonal box-vector matrix matching [`Self::size`].
    pub fn box_vectors(&self) -> BoxVectors {
        Matrix3::from_diagonal(&self.size())
    }
}
