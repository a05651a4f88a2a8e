//! Manually defined derivatives.
//!
//! Nothing in this crate is traced by an automatic differentiation system. Operations that
//! participate in a gradient pipeline expose their derivative explicitly, either as a
//! [`Potential`] (value and gradient in one call, for chaining by hand) or as a
//! [`CustomVjp`] forward/backward pair.

use super::error::PotentialError;
use nalgebra::DVector;

/// A scalar function of a flat configuration vector with an analytic gradient.
pub trait Potential {
    fn dim(&self) -> usize;

    fn value(&self, x: &DVector<f64>) -> Result<f64, PotentialError> {
        self.value_and_grad(x).map(|(value, _)| value)
    }

    fn value_and_grad(&self, x: &DVector<f64>) -> Result<(f64, DVector<f64>), PotentialError>;
}

impl<P: Potential + ?Sized> Potential for &P {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn value(&self, x: &DVector<f64>) -> Result<f64, PotentialError> {
        (**self).value(x)
    }

    fn value_and_grad(&self, x: &DVector<f64>) -> Result<(f64, DVector<f64>), PotentialError> {
        (**self).value_and_grad(x)
    }
}

/// Checks that `x` has the length a potential expects.
pub fn check_dim(expected: usize, x: &DVector<f64>) -> Result<(), PotentialError> {
    if x.len() != expected {
        return Err(PotentialError::DimensionMismatch {
            expected,
            found: x.len(),
        });
    }
    Ok(())
}

/// A forward/backward pair with a custom vector-Jacobian product.
///
/// `forward` returns the output together with whatever the backward pass needs (the residual).
/// `backward` maps an upstream cotangent shaped like the output to a gradient shaped like the
/// input. The residual is the only channel between the two passes, so `backward` never reruns
/// the forward computation.
pub trait CustomVjp {
    type Input: ?Sized;
    type Output;
    type Residual;
    type Gradient;

    fn forward(&self, input: &Self::Input)
    -> Result<(Self::Output, Self::Residual), PotentialError>;

    fn backward(
        &self,
        residual: &Self::Residual,
        upstream: &Self::Output,
    ) -> Result<Self::Gradient, PotentialError>;

    /// Forward pass only.
    fn call(&self, input: &Self::Input) -> Result<Self::Output, PotentialError> {
        self.forward(input).map(|(output, _)| output)
    }

    /// Output and gradient for one upstream cotangent.
    fn vjp(
        &self,
        input: &Self::Input,
        upstream: &Self::Output,
    ) -> Result<(Self::Output, Self::Gradient), PotentialError> {
        let (output, residual) = self.forward(input)?;
        let gradient = self.backward(&residual, upstream)?;
        Ok((output, gradient))
    }
}

/// Central finite-difference gradient, for checking analytic derivatives in tests.
#[cfg(test)]
pub(crate) fn numerical_gradient<P: Potential>(potential: &P, x: &DVector<f64>, h: f64) -> DVector<f64> {
    let mut grad = DVector::zeros(x.len());
    for i in 0..x.len() {
        let mut plus = x.clone();
        let mut minus = x.clone();
        plus[i] += h;
        minus[i] -= h;
        grad[i] = (potential.value(&plus).unwrap() - potential.value(&minus).unwrap()) / (2.0 * h);
    }
    grad
}
