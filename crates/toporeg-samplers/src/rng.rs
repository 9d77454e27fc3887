//! Seed keys for reproducible runs.
//!
//! Every random draw of a run descends from one `u64` seed. Keys split
//! deterministically with ChaCha8, so initialization and sampling can own
//! independent streams while the whole run stays reproducible.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// An RNG key for deterministic random number generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RngKey(pub u64);

impl RngKey {
    pub fn new(seed: u64) -> Self {
        RngKey(seed)
    }

    /// Split this key into `n` independent keys.
    pub fn split(self, n: usize) -> Vec<RngKey> {
        match n {
            0 => Vec::new(),
            1 => vec![self],
            _ => {
                let mut rng = ChaCha8Rng::seed_from_u64(self.0);
                (0..n).map(|_| RngKey(rng.next_u64())).collect()
            }
        }
    }

    /// Split into exactly two keys.
    pub fn split_two(self) -> (RngKey, RngKey) {
        let mut rng = ChaCha8Rng::seed_from_u64(self.0);
        (RngKey(rng.next_u64()), RngKey(rng.next_u64()))
    }

    /// The generator owned by this key.
    pub fn to_rng(self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.0)
    }

    pub fn seed(&self) -> u64 {
        self.0
    }
}
