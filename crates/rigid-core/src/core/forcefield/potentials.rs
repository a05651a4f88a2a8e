/// Coulomb prefactor in kJ·nm/(mol·e²).
pub const COULOMB_CONSTANT: f64 = 138.935458;

/// Value and radial derivative `dE/dr` of a pair term at one distance.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PairTerm {
    pub energy: f64,
    pub derivative: f64,
}

impl PairTerm {
    #[inline]
    pub fn new(energy: f64, derivative: f64) -> Self {
        Self { energy, derivative }
    }
}

impl std::ops::Add for PairTerm {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            energy: self.energy + rhs.energy,
            derivative: self.derivative + rhs.derivative,
        }
    }
}

#[inline]
pub fn lennard_jones_12_6(dist: f64, sigma: f64, epsilon: f64) -> PairTerm {
    if epsilon == 0.0 {
        return PairTerm::default();
    }
    let rho6 = (sigma / dist).powi(6);
    let rho12 = rho6 * rho6;
    let energy = 4.0 * epsilon * (rho12 - rho6);
    let derivative = 4.0 * epsilon * (-12.0 * rho12 + 6.0 * rho6) / dist;
    PairTerm::new(energy, derivative)
}

#[inline]
pub fn coulomb(dist: f64, q1: f64, q2: f64) -> PairTerm {
    if q1 == 0.0 || q2 == 0.0 {
        return PairTerm::default();
    }
    let energy = COULOMB_CONSTANT * q1 * q2 / dist;
    PairTerm::new(energy, -energy / dist)
}
