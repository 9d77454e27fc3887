//! Spherical (von Mises-Fisher-like) density on the unit sphere.
//!
//! Everything is evaluated in the log domain, so large `kappa` never
//! overflows:
//!
//! ```text
//! log f(x | m) = kappa * dot(x, m / ||m||)
//! ```
//!
//! The normalizer `C(kappa) = kappa / (4π sinh kappa)` depends only on
//! `kappa`, so it cancels between regions and is left out of per-token
//! masses. It matters for the new-region mass and for kappa estimation.

use std::f64::consts::{LN_2, PI};
use toporeg_core::{dot, inverse_norm, Vec3};

/// `ln(4π)`
pub fn ln_four_pi() -> f64 {
    (4.0 * PI).ln()
}

/// `ln(sinh(x) / x)`, stable for all `x >= 0` and zero at the origin.
pub fn log_sinh_over_x(x: f64) -> f64 {
    if x < 1e-4 {
        // sinh(x)/x = 1 + x^2/6 + O(x^4)
        return x * x / 6.0;
    }
    // sinh(x) = e^x (1 - e^{-2x}) / 2
    x + (-(-2.0 * x).exp_m1()).ln() - LN_2 - x.ln()
}

/// `ln C(kappa)` for the vMF density on the 2-sphere.
pub fn log_normalizer(kappa: f64) -> f64 {
    -ln_four_pi() - log_sinh_over_x(kappa)
}

/// Density evaluator for a fixed concentration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalDensity {
    kappa: f64,
}

impl SphericalDensity {
    pub fn new(kappa: f64) -> Self {
        Self { kappa }
    }

    pub fn kappa(&self) -> f64 {
        self.kappa
    }

    /// Unnormalized log density of `x` under a region whose coordinate sum is
    /// `mean` and whose reciprocal norm the caller has already computed.
    ///
    /// A zero mean (`inverse_norm == 0`) has no preferred direction and gives 0.
    #[inline]
    pub fn log_density_with(&self, x: &Vec3, mean: &Vec3, inverse_norm: f64) -> f64 {
        self.kappa * dot(x, mean) * inverse_norm
    }

    /// Unnormalized log density, normalizing `mean` on the fly.
    pub fn log_density(&self, x: &Vec3, mean: &Vec3) -> f64 {
        self.log_density_with(x, mean, inverse_norm(mean))
    }

    /// Unnormalized density `exp(kappa * cos)`.
    pub fn density(&self, x: &Vec3, mean: &Vec3) -> f64 {
        self.log_density(x, mean).exp()
    }

    /// `ln crpalpha_mod`, the total new-region mass on the scale of the
    /// unnormalized densities.
    ///
    /// A new region has no mean yet, so a candidate's predictive density is
    /// uniform, `1/(4π)`. Dividing by `C(kappa)` puts it on the same footing
    /// as `exp(kappa * cos)`, which gives `crpalpha * sinh(kappa)/kappa`.
    /// Zero `crpalpha` yields `-inf`.
    pub fn log_new_region_mass(&self, crpalpha: f64) -> f64 {
        if crpalpha <= 0.0 {
            return f64::NEG_INFINITY;
        }
        crpalpha.ln() + log_sinh_over_x(self.kappa)
    }
}
