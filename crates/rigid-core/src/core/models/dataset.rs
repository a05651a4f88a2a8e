use super::simulation_box::{SimulationBox, SimulationBoxError};
use nalgebra::Vector3;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DatasetError {
    #[error("Dataset contains no frames")]
    Empty,
    #[error("Dataset has {positions} position frames but {boxes} box frames")]
    BoxCountMismatch { positions: usize, boxes: usize },
    #[error("Dataset has {positions} position frames but {forces} force frames")]
    ForceCountMismatch { positions: usize, forces: usize },
    #[error("Frame {frame} has {found} sites, expected {expected}")]
    AtomCountMismatch {
        frame: usize,
        expected: usize,
        found: usize,
    },
    #[error("Box of frame {frame} is invalid: {source}")]
    InvalidBox {
        frame: usize,
        #[source]
        source: SimulationBoxError,
    },
}

/// An in-memory trajectory of reference configurations.
///
/// Every frame stores all sites of the system in a flat `(atoms, 3)` layout together with the
/// `max` corner of its simulation box (anchored at the origin). Forces are optional and, when
/// present, cover every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pos: Vec<Vec<Vector3<f64>>>,
    boxes: Vec<Vector3<f64>>,
    force: Option<Vec<Vec<Vector3<f64>>>>,
}

impl Dataset {
    pub fn new(
        pos: Vec<Vec<Vector3<f64>>>,
        boxes: Vec<Vector3<f64>>,
        force: Option<Vec<Vec<Vector3<f64>>>>,
    ) -> Result<Self, DatasetError> {
        let n_atoms = pos.first().ok_or(DatasetError::Empty)?.len();
        if boxes.len() != pos.len() {
            return Err(DatasetError::BoxCountMismatch {
                positions: pos.len(),
                boxes: boxes.len(),
            });
        }
        Self::check_frames(&pos, n_atoms)?;
        for (frame, max) in boxes.iter().enumerate() {
            SimulationBox::from_max(*max)
                .map_err(|source| DatasetError::InvalidBox { frame, source })?;
        }
        if let Some(force) = &force {
            if force.len() != pos.len() {
                return Err(DatasetError::ForceCountMismatch {
                    positions: pos.len(),
                    forces: force.len(),
                });
            }
            Self::check_frames(force, n_atoms)?;
        }
        Ok(Self { pos, boxes, force })
    }

    fn check_frames(frames: &[Vec<Vector3<f64>>], expected: usize) -> Result<(), DatasetError> {
        match frames.iter().position(|f| f.len() != expected) {
            Some(frame) => Err(DatasetError::AtomCountMismatch {
                frame,
                expected,
                found: frames[frame].len(),
            }),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.pos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }

    pub fn n_atoms(&self) -> usize {
        self.pos.first().map_or(0, Vec::len)
    }

    pub fn positions(&self, frame: usize) -> Option<&[Vector3<f64>]> {
        self.pos.get(frame).map(Vec::as_slice)
    }

    pub fn all_positions(&self) -> &[Vec<Vector3<f64>>] {
        &self.pos
    }

    pub fn box_max(&self, frame: usize) -> Option<&Vector3<f64>> {
        self.boxes.get(frame)
    }

    pub fn simulation_box(&self, frame: usize) -> Option<SimulationBox> {
        self.boxes
            .get(frame)
            .and_then(|max| SimulationBox::from_max(*max).ok())
    }

    pub fn force(&self, frame: usize) -> Option<&[Vector3<f64>]> {
        self.force
            .as_ref()
            .and_then(|f| f.get(frame))
            .map(Vec::as_slice)
    }

    pub fn has_forces(&self) -> bool {
        self.force.is_some()
    }

    /// The first frame, used as the anchor of the cutoff surrogate.
    pub fn reference(&self) -> &[Vector3<f64>] {
        &self.pos[0]
    }

    /// Replaces the stored forces.
    pub fn with_forces(self, force: Vec<Vec<Vector3<f64>>>) -> Result<Self, DatasetError> {
        Self::new(self.pos, self.boxes, Some(force))
    }
}
