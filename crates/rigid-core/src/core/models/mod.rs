//! Immutable value records describing rigid-body configurations.
//!
//! Everything in here is created per sample and never mutated afterwards. The only
//! exception is [`dataset::Dataset::with_forces`], which consumes the dataset and returns
//! a new one.

pub mod augmented;
pub mod dataset;
pub mod simulation_box;
pub mod sites;
pub mod state;
pub mod water_model;

pub const SPATIAL_DIM: usize = 3;
