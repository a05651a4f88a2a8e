use super::DistributionError;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Independent normal distributions, one per component.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagonalNormal {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl DiagonalNormal {
    pub fn new(means: Vec<f64>, stds: Vec<f64>) -> Result<Self, DistributionError> {
        if means.len() != stds.len() {
            return Err(DistributionError::DimensionMismatch {
                expected: means.len(),
                found: stds.len(),
            });
        }
        if let Some(bad) = stds.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(DistributionError::InvalidParameter(format!(
                "standard deviations must be positive and finite, got {}",
                bad
            )));
        }
        Ok(Self { means, stds })
    }

    pub fn standard(dim: usize) -> Self {
        Self {
            means: vec![0.0; dim],
            stds: vec![1.0; dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.means.len()
    }

    fn check_dim(&self, x: &[f64]) -> Result<(), DistributionError> {
        if x.len() != self.dim() {
            return Err(DistributionError::DimensionMismatch {
                expected: self.dim(),
                found: x.len(),
            });
        }
        Ok(())
    }

    /// Sum of the component log-densities.
    pub fn log_prob_sum(&self, x: &[f64]) -> Result<f64, DistributionError> {
        self.check_dim(x)?;
        Ok(x.iter()
            .zip(&self.means)
            .zip(&self.stds)
            .map(|((x, mu), sigma)| {
                let z = (x - mu) / sigma;
                -0.5 * z * z - sigma.ln() - LN_SQRT_2PI
            })
            .sum())
    }

    /// Gradient of [`Self::log_prob_sum`] with respect to `x`.
    pub fn grad_log_prob(&self, x: &[f64]) -> Result<Vec<f64>, DistributionError> {
        self.check_dim(x)?;
        Ok(x.iter()
            .zip(&self.means)
            .zip(&self.stds)
            .map(|((x, mu), sigma)| -(x - mu) / (sigma * sigma))
            .collect())
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        self.means
            .iter()
            .zip(&self.stds)
            .map(|(mu, sigma)| {
                let z: f64 = StandardNormal.sample(rng);
                mu + sigma * z
            })
            .collect()
    }
}
