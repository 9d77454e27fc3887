//! Metropolis-Hastings updates for the global concentration `kappa`.
//!
//! Given the current region assignments, the toponym coordinates of region
//! `l` contribute
//!
//! ```text
//! sum_i [ln C(kappa) + kappa * dot(x_i, m_l / ||m_l||)] = n_l ln C(kappa) + kappa ||m_l||
//! ```
//!
//! because `m_l` is the sum of those coordinates. A Gaussian random walk
//! proposes new values; non-positive proposals are rejected outright.

use crate::density::log_normalizer;
use crate::region::RegionStore;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use toporeg_core::norm;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KappaEstimator {
    proposal_sd: f64,
}

impl KappaEstimator {
    pub fn new(proposal_sd: f64) -> Self {
        Self { proposal_sd }
    }

    /// Log likelihood of every assigned toponym coordinate under `kappa`.
    pub fn log_likelihood(kappa: f64, store: &RegionStore) -> f64 {
        let log_c = log_normalizer(kappa);
        store
            .live_regions()
            .filter(|&r| store.toponym_total(r) > 0)
            .map(|r| f64::from(store.toponym_total(r)) * log_c + kappa * norm(store.mean(r)))
            .sum()
    }

    /// One Metropolis-Hastings step. Returns the new value of `kappa`.
    pub fn step<R: Rng + ?Sized>(&self, kappa: f64, store: &RegionStore, rng: &mut R) -> f64 {
        let proposal = match Normal::new(kappa, self.proposal_sd) {
            Ok(normal) => normal.sample(rng),
            Err(_) => return kappa,
        };
        if !(proposal > 0.0) {
            return kappa;
        }
        let log_ratio = Self::log_likelihood(proposal, store) - Self::log_likelihood(kappa, store);
        if log_ratio >= 0.0 || rng.gen::<f64>().ln() < log_ratio {
            proposal
        } else {
            kappa
        }
    }
}
