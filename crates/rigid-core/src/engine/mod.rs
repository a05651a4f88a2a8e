//! # Engine Module
//!
//! The stateful side of the library: everything that touches the physics engine.
//!
//! ## Layers
//!
//! - **Engine Boundary** ([`context`]) - The `Engine` trait describing the opaque, side-effecting
//!   physics engine, and `ReferenceEngine`, an in-process implementation for rigid water models
//! - **Oracle** ([`oracle`]) - `EnergyOracle`, the single owner of an engine handle, converting
//!   raw results to dimensionless units and applying the per-sample error policy
//! - **Batching** ([`batch`]) - `BatchEvaluator`, one serialized boundary crossing per batch
//! - **Differentiation** ([`autodiff`], [`bridge`], [`cutoff`]) - Manually defined
//!   forward/backward pairs: the energy bridge, whose gradient is the negated force, and the
//!   cutoff transform bounding gradient norms
//! - **Error Handling** ([`error`]) - Engine failures, oracle errors and potential errors
//!
//! ## Concurrency
//!
//! An engine handle holds positions and box state that every evaluation overwrites. The oracle
//! therefore requires `&mut self`, and shared ownership goes through [`oracle::SharedOracle`],
//! a mutex that serializes whole batches. Independent workers should own independent oracles.

pub mod autodiff;
pub mod batch;
pub mod bridge;
pub mod context;
pub mod cutoff;
pub mod error;
pub mod oracle;

#[cfg(test)]
pub(crate) mod testing;
