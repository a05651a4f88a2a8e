//! # Core Module
//!
//! Stateless building blocks shared by the engine and density layers.
//!
//! - **Value Records** ([`models`]) - Simulation boxes, prior states, augmented data samples,
//!   site tensors, datasets and the water model description loaded from disk
//! - **Specifications** ([`specs`]) - System, base and target specifications and the model path
//!   convention derived from them
//! - **Distributions** ([`distributions`]) - Diagonal normals and the von Mises-Fisher
//!   distribution over unit quaternions
//! - **Pair Potentials** ([`forcefield`]) - Lennard-Jones and Coulomb terms with analytic
//!   derivatives, plus per-site nonbonded parameters

pub mod distributions;
pub mod forcefield;
pub mod models;
pub mod specs;
