//! # rigid-flows
//!
//! Densities over configurations of rigid molecules (rigid water) for generative flow models,
//! together with the machinery that lets an opaque, side-effecting energy/force engine take
//! part in gradient-based pipelines.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer layout:
//!
//! - **[`core`]: The Foundation.** Stateless value records (`SimulationBox`, `State`,
//!   `AugmentedData`, `Dataset`), the water model description, system specifications, the
//!   probability distributions used by the prior, and the pair potentials of the reference engine.
//!
//! - **[`engine`]: The Stateful Bridge.** Owns the single mutable handle to the physics engine
//!   (`EnergyOracle`), iterates batches through it (`BatchEvaluator`), exposes the result as a
//!   manually differentiated function (`EnergyBridge`) and bounds its gradients (`CutoffPotential`).
//!
//! - **[`density`]: The Public API.** The `DensityModel` trait with the analytic prior
//!   (`BaseDensity`) and the physics-grounded target (`TargetDensity`).

pub mod core;
pub mod density;
pub mod engine;
