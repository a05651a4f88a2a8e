//! Probability distributions used by the analytic prior.
//!
//! Only log-densities and sampling are provided; parameters are fixed at construction.

pub mod normal;
pub mod von_mises_fisher;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DistributionError {
    #[error("Invalid distribution parameter: {0}")]
    InvalidParameter(String),
    #[error("Dimension mismatch: distribution has {expected} components, input has {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Numerically stable `ln(Σ exp(xᵢ))`.
pub fn logsumexp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}
