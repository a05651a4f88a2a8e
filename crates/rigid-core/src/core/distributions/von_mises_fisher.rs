//! von Mises-Fisher distribution on the unit 3-sphere, used for quaternion rotations.
//!
//! Sampling follows Wood (1994), "Simulation of the von Mises Fisher distribution": draw the
//! component along the mode by rejection, a uniform direction on the orthogonal 2-sphere, and
//! map the result onto the mode with a Householder reflection.

use super::DistributionError;
use nalgebra::{Vector3, Vector4};
use rand::Rng;
use rand_distr::{Beta, Distribution, UnitSphere};
use std::f64::consts::PI;

/// Sphere dimension `p - 1` for `p = 4`.
const SPHERE_DIM: f64 = 3.0;
const SMALL_CONCENTRATION: f64 = 1e-8;
const SERIES_LIMIT: f64 = 100.0;

/// Independent vMF distributions over `S³`, one per molecule.
#[derive(Debug, Clone)]
pub struct VonMisesFisher {
    modes: Vec<Vector4<f64>>,
    concentrations: Vec<f64>,
    log_normalizers: Vec<f64>,
    beta: Beta<f64>,
}

impl VonMisesFisher {
    pub fn new(
        modes: Vec<Vector4<f64>>,
        concentrations: Vec<f64>,
    ) -> Result<Self, DistributionError> {
        if modes.len() != concentrations.len() {
            return Err(DistributionError::DimensionMismatch {
                expected: modes.len(),
                found: concentrations.len(),
            });
        }
        if let Some(kappa) = concentrations
            .iter()
            .find(|k| !k.is_finite() || **k < 0.0)
        {
            return Err(DistributionError::InvalidParameter(format!(
                "concentration must be finite and non-negative, got {}",
                kappa
            )));
        }
        let modes = modes
            .into_iter()
            .map(|m| {
                m.try_normalize(f64::EPSILON).ok_or_else(|| {
                    DistributionError::InvalidParameter("mode must be non-zero".to_string())
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let log_normalizers = concentrations.iter().map(|&k| log_normalizer(k)).collect();
        let beta = Beta::new(0.5 * SPHERE_DIM, 0.5 * SPHERE_DIM)
            .map_err(|e| DistributionError::InvalidParameter(e.to_string()))?;
        Ok(Self {
            modes,
            concentrations,
            log_normalizers,
            beta,
        })
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Log-density of `x` under the distribution of molecule `index`.
    #[inline]
    pub fn log_prob(&self, index: usize, x: &Vector4<f64>) -> f64 {
        self.log_normalizers[index] + self.concentrations[index] * self.modes[index].dot(x)
    }

    /// Per-molecule log-densities.
    pub fn log_prob_each(&self, xs: &[Vector4<f64>]) -> Result<Vec<f64>, DistributionError> {
        if xs.len() != self.len() {
            return Err(DistributionError::DimensionMismatch {
                expected: self.len(),
                found: xs.len(),
            });
        }
        Ok(xs
            .iter()
            .enumerate()
            .map(|(i, x)| self.log_prob(i, x))
            .collect())
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Vector4<f64>> {
        self.modes
            .iter()
            .zip(&self.concentrations)
            .map(|(mode, &kappa)| {
                let w = self.sample_mode_component(kappa, rng);
                let direction: [f64; 3] = UnitSphere.sample(rng);
                let v = Vector3::from(direction);
                let r = (1.0 - w * w).max(0.0).sqrt();
                let x = Vector4::new(w, r * v.x, r * v.y, r * v.z);
                reflect_onto(mode, &x)
            })
            .collect()
    }

    fn sample_mode_component<R: Rng + ?Sized>(&self, kappa: f64, rng: &mut R) -> f64 {
        let b = SPHERE_DIM / (2.0 * kappa + (4.0 * kappa * kappa + SPHERE_DIM * SPHERE_DIM).sqrt());
        let x0 = (1.0 - b) / (1.0 + b);
        let c = kappa * x0 + SPHERE_DIM * (1.0 - x0 * x0).ln();
        loop {
            let z = self.beta.sample(rng);
            let w = (1.0 - (1.0 + b) * z) / (1.0 - (1.0 - b) * z);
            let u: f64 = rng.r#gen();
            if kappa * w + SPHERE_DIM * (1.0 - x0 * w).ln() - c >= u.ln() {
                return w;
            }
        }
    }
}

/// Householder reflection taking `e₀ = (1, 0, 0, 0)` onto `mode`, applied to `x`.
fn reflect_onto(mode: &Vector4<f64>, x: &Vector4<f64>) -> Vector4<f64> {
    let u = Vector4::new(1.0, 0.0, 0.0, 0.0) - mode;
    let uu = u.norm_squared();
    if uu < 1e-12 {
        return *x;
    }
    x - u * (2.0 * u.dot(x) / uu)
}

/// `ln C₄(κ) = ln κ - 2 ln 2π - ln I₁(κ)`, with the uniform limit `-ln 2π²` at `κ → 0`.
fn log_normalizer(kappa: f64) -> f64 {
    if kappa < SMALL_CONCENTRATION {
        return -(2.0 * PI * PI).ln();
    }
    kappa.ln() - 2.0 * (2.0 * PI).ln() - log_bessel_i1(kappa)
}

/// `ln I₁(x)` for `x > 0`: power series up to [`SERIES_LIMIT`], Hankel expansion beyond.
fn log_bessel_i1(x: f64) -> f64 {
    if x <= SERIES_LIMIT {
        let half = 0.5 * x;
        let quarter_sq = half * half;
        let mut term = half;
        let mut sum = half;
        for k in 0..1000 {
            let k = k as f64;
            term *= quarter_sq / ((k + 1.0) * (k + 2.0));
            sum += term;
            if term < sum * 1e-17 {
                break;
            }
        }
        sum.ln()
    } else {
        let inv = 1.0 / x;
        let correction = 1.0
            - 3.0 / 8.0 * inv
            - 15.0 / 128.0 * inv * inv
            - 315.0 / 3072.0 * inv * inv * inv;
        x - 0.5 * (2.0 * PI * x).ln() + correction.ln()
    }
}
