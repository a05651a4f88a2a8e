use nalgebra::{DVector, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("Cannot arrange {len} site vectors into shape {shape:?}")]
    Incompatible { len: usize, shape: Vec<usize> },
    #[error("Flat coordinate buffer of length {len} is not a multiple of 3")]
    RaggedCoordinates { len: usize },
}

/// Number of molecules and sites per molecule of a rigid system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SiteLayout {
    pub n_molecules: usize,
    pub n_sites: usize,
}

impl SiteLayout {
    pub fn new(n_molecules: usize, n_sites: usize) -> Self {
        Self {
            n_molecules,
            n_sites,
        }
    }

    #[inline]
    pub fn n_atoms(&self) -> usize {
        self.n_molecules * self.n_sites
    }

    /// Shape of a single configuration, without the trailing spatial axis.
    pub fn shape(&self) -> [usize; 2] {
        [self.n_molecules, self.n_sites]
    }
}

/// Row-major array of 3-vectors with an arbitrary leading shape.
///
/// A single configuration has shape `(n_molecules, n_sites)`; a batch of them has shape
/// `(batch, n_molecules, n_sites)`. The trailing spatial axis of length 3 is implicit.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteTensor {
    shape: Vec<usize>,
    data: Vec<Vector3<f64>>,
}

impl SiteTensor {
    pub fn new(shape: Vec<usize>, data: Vec<Vector3<f64>>) -> Result<Self, ShapeError> {
        if shape.iter().product::<usize>() != data.len() {
            return Err(ShapeError::Incompatible {
                len: data.len(),
                shape,
            });
        }
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![Vector3::zeros(); len],
        }
    }

    /// A single configuration laid out as `(n_molecules, n_sites)`.
    pub fn configuration(
        layout: SiteLayout,
        data: Vec<Vector3<f64>>,
    ) -> Result<Self, ShapeError> {
        Self::new(layout.shape().to_vec(), data)
    }

    /// Stacks configurations of identical shape along a new leading batch axis.
    pub fn stack(configurations: &[SiteTensor]) -> Result<Self, ShapeError> {
        let inner = configurations
            .first()
            .map(|c| c.shape.clone())
            .unwrap_or_default();
        let mut data = Vec::with_capacity(configurations.len() * inner.iter().product::<usize>());
        for configuration in configurations {
            if configuration.shape != inner {
                return Err(ShapeError::Incompatible {
                    len: configuration.data.len(),
                    shape: inner,
                });
            }
            data.extend_from_slice(&configuration.data);
        }
        let mut shape = vec![configurations.len()];
        shape.extend(inner);
        Self::new(shape, data)
    }

    /// Rebuilds a tensor from interleaved `x, y, z` coordinates.
    pub fn from_flat(shape: Vec<usize>, flat: &[f64]) -> Result<Self, ShapeError> {
        if flat.len() % 3 != 0 {
            return Err(ShapeError::RaggedCoordinates { len: flat.len() });
        }
        let data = flat
            .chunks_exact(3)
            .map(|c| Vector3::new(c[0], c[1], c[2]))
            .collect();
        Self::new(shape, data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[Vector3<f64>] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<Vector3<f64>> {
        self.data
    }

    /// Splits along the leading axis into contiguous blocks.
    pub fn outer_chunks(&self) -> impl Iterator<Item = &[Vector3<f64>]> {
        let block = self.shape.iter().skip(1).product::<usize>().max(1);
        self.data.chunks(block)
    }

    pub fn to_flat(&self) -> Vec<f64> {
        self.data.iter().flat_map(|v| [v.x, v.y, v.z]).collect()
    }

    pub fn to_dvector(&self) -> DVector<f64> {
        DVector::from_vec(self.to_flat())
    }

    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(&Vector3<f64>) -> Vector3<f64>,
    {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().map(f).collect(),
        }
    }
}
