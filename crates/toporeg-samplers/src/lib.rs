//! # toporeg-samplers
//!
//! Sampling building blocks for the toporeg region model:
//!
//! - **Categorical draws**: log-domain tempering plus inverse-CDF sampling via [`sample_index`]
//! - **CRP Allocator**: the "new table" decision of the Chinese Restaurant Process via [`CrpAllocator`]
//! - **Annealer**: temperature schedule and sample collection via [`SimulatedAnnealer`]
//! - **Decoder**: argmax selection over a tempered distribution via [`MaximumPosteriorDecoder`]
//!
//! ## RNG Key System
//!
//! Deterministic RNG key management:
//!
//! ```rust
//! use toporeg_samplers::RngKey;
//!
//! let key = RngKey::new(42);
//! let (init_key, sweep_key) = key.split_two();
//! let _rng = sweep_key.to_rng();
//! ```
//!
//! ## Annealing Schedule
//!
//! ```rust
//! use toporeg_samplers::{AnnealingSchedule, Annealer, SimulatedAnnealer};
//!
//! let schedule = AnnealingSchedule::new(2.0, 1.0, 0.5, 3, 4, 2);
//! assert_eq!(schedule.temperature_steps(), 3);
//! assert_eq!(schedule.total_sweeps(), 3 * 3 + 4 * 2);
//!
//! let mut annealer = SimulatedAnnealer::new(schedule).unwrap();
//! let mut sweeps = 0;
//! while annealer.next_iter() {
//!     sweeps += 1;
//! }
//! assert_eq!(sweeps, 17);
//! ```

pub mod annealer;
pub mod categorical;
pub mod crp;
pub mod rng;
pub mod schedule;

pub use annealer::*;
pub use categorical::*;
pub use crp::*;
pub use rng::*;
pub use schedule::*;
