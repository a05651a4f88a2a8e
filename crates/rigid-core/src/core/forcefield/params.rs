use serde::Deserialize;

/// Nonbonded parameters of one site of the molecule template.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SiteParams {
    pub name: String,
    pub charge: f64,
    /// Lennard-Jones diameter in nm.
    #[serde(default)]
    pub sigma: f64,
    /// Lennard-Jones well depth in kJ/mol.
    #[serde(default)]
    pub epsilon: f64,
}

/// Mixed parameters for one pair of site types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairParams {
    pub sigma: f64,
    pub epsilon: f64,
    pub q1: f64,
    pub q2: f64,
}

impl PairParams {
    /// Lorentz-Berthelot combination.
    pub fn combine(a: &SiteParams, b: &SiteParams) -> Self {
        Self {
            sigma: 0.5 * (a.sigma + b.sigma),
            epsilon: (a.epsilon * b.epsilon).sqrt(),
            q1: a.charge,
            q2: b.charge,
        }
    }

    #[inline]
    pub fn is_inert(&self) -> bool {
        self.epsilon == 0.0 && (self.q1 == 0.0 || self.q2 == 0.0)
    }
}
