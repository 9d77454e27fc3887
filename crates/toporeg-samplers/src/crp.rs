//! Chinese Restaurant Process seating.
//!
//! During initialization every live region carries unit mass and a new
//! region carries `crpalpha`. The draw returns an index in `[0, live]`;
//! `live` itself means "open a new region", and the caller instantiates it.

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrpAllocator {
    concentration: f64,
}

impl CrpAllocator {
    pub fn new(concentration: f64) -> Self {
        Self { concentration }
    }

    pub fn concentration(&self) -> f64 {
        self.concentration
    }

    /// Seats one customer among `live` tables of unit mass.
    ///
    /// The first customer (`live == 0`) always opens table 0 and consumes no
    /// randomness.
    pub fn seat<R: Rng + ?Sized>(&self, live: usize, rng: &mut R) -> usize {
        if live == 0 {
            return 0;
        }
        let existing = live as f64;
        let threshold = rng.gen::<f64>() * (existing + self.concentration);
        if threshold < existing {
            (threshold as usize).min(live - 1)
        } else {
            live
        }
    }

    /// Probability that the next customer opens a new table.
    pub fn new_table_probability(&self, live: usize) -> f64 {
        if live == 0 {
            return 1.0;
        }
        self.concentration / (live as f64 + self.concentration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::RngKey;

    #[test]
    fn test_first_customer_opens_zero() {
        let crp = CrpAllocator::new(5.0);
        let mut rng = RngKey::new(9).to_rng();
        assert_eq!(crp.seat(0, &mut rng), 0);
        assert_eq!(crp.new_table_probability(0), 1.0);
    }

    #[test]
    fn test_zero_concentration_never_opens() {
        let crp = CrpAllocator::new(0.0);
        let mut rng = RngKey::new(1).to_rng();
        for live in 1..6 {
            for _ in 0..500 {
                assert!(crp.seat(live, &mut rng) < live);
            }
        }
    }

    #[test]
    fn test_new_table_frequency() {
        let crp = CrpAllocator::new(2.0);
        let mut rng = RngKey::new(4).to_rng();
        let n = 20_000;
        let opened = (0..n).filter(|_| crp.seat(2, &mut rng) == 2).count();
        let freq = opened as f64 / n as f64;
        assert!((freq - crp.new_table_probability(2)).abs() < 0.02, "frequency {freq}");
    }
}
