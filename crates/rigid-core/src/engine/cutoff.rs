use super::autodiff::{CustomVjp, Potential, check_dim};
use super::error::PotentialError;
use nalgebra::DVector;
use tracing::trace;

const NORM_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutoffBranch {
    /// The wrapped potential, unchanged.
    Exact,
    /// The quadratic surrogate with its gradient rescaled to the threshold.
    Surrogate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CutoffEvaluation {
    pub value: f64,
    pub grad: DVector<f64>,
    pub branch: CutoffBranch,
    /// Norm of the wrapped potential's gradient at the evaluation point.
    pub grad_norm: f64,
}

/// Bounds the gradient of a potential by switching to a quadratic surrogate.
///
/// With `Q(x) = 0.5 * |x - x0|^2`, the wrapped potential returns `P(x)` and `∇P(x)` while
/// `|∇P(x)| <= t`, and `Q(x)` with `∇Q(x)` rescaled to norm `t` otherwise. The switch itself
/// is not differentiated, so value and gradient may jump where `|∇P(x)| = t`.
#[derive(Debug, Clone)]
pub struct CutoffPotential<P> {
    potential: P,
    reference: DVector<f64>,
    threshold: f64,
}

impl<P: Potential> CutoffPotential<P> {
    pub fn new(potential: P, reference: DVector<f64>, threshold: f64) -> Result<Self, PotentialError> {
        check_dim(potential.dim(), &reference)?;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(PotentialError::InvalidThreshold(threshold));
        }
        Ok(Self {
            potential,
            reference,
            threshold,
        })
    }

    pub fn inner(&self) -> &P {
        &self.potential
    }

    pub fn reference(&self) -> &DVector<f64> {
        &self.reference
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// `Q(x)` and `∇Q(x)`.
    pub fn surrogate(&self, x: &DVector<f64>) -> (f64, DVector<f64>) {
        let delta = x - &self.reference;
        (0.5 * delta.norm_squared(), delta)
    }

    pub fn evaluate(&self, x: &DVector<f64>) -> Result<CutoffEvaluation, PotentialError> {
        check_dim(self.dim(), x)?;
        let (value, grad) = self.potential.value_and_grad(x)?;
        let grad_norm = grad.norm();
        if grad_norm <= self.threshold {
            return Ok(CutoffEvaluation {
                value,
                grad,
                branch: CutoffBranch::Exact,
                grad_norm,
            });
        }

        let (surrogate_value, surrogate_grad) = self.surrogate(x);
        let surrogate_norm = surrogate_grad.norm().max(NORM_EPSILON);
        trace!(
            grad_norm,
            threshold = self.threshold,
            "Gradient above cutoff threshold; using surrogate."
        );
        Ok(CutoffEvaluation {
            value: surrogate_value,
            grad: surrogate_grad * (self.threshold / surrogate_norm),
            branch: CutoffBranch::Surrogate,
            grad_norm,
        })
    }
}

impl<P: Potential> Potential for CutoffPotential<P> {
    fn dim(&self) -> usize {
        self.potential.dim()
    }

    fn value_and_grad(&self, x: &DVector<f64>) -> Result<(f64, DVector<f64>), PotentialError> {
        self.evaluate(x).map(|e| (e.value, e.grad))
    }
}

impl<P: Potential> CustomVjp for CutoffPotential<P> {
    type Input = DVector<f64>;
    type Output = f64;
    type Residual = DVector<f64>;
    type Gradient = DVector<f64>;

    fn forward(&self, x: &DVector<f64>) -> Result<(f64, DVector<f64>), PotentialError> {
        self.value_and_grad(x)
    }

    fn backward(&self, grad: &DVector<f64>, upstream: &f64) -> Result<DVector<f64>, PotentialError> {
        Ok(grad * *upstream)
    }
}
