//! # Force Field Module
//!
//! Nonbonded pair terms used by the in-process reference engine. Every term returns both the
//! energy and its radial derivative so that forces can be assembled analytically.
//!
//! Units follow the usual molecular-simulation conventions: distances in nm, energies in
//! kJ/mol and charges in elementary charges.
//!
//! - [`params`] - Per-site nonbonded parameters and Lorentz-Berthelot mixing
//! - [`potentials`] - Lennard-Jones 12-6 and Coulomb pair terms

pub mod params;
pub mod potentials;
