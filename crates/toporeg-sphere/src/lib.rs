#![allow(clippy::needless_range_loop)]

//! # toporeg-sphere
//!
//! Region-topic model with a Chinese Restaurant Process prior over an
//! unbounded set of regions on the unit sphere, fit by collapsed Gibbs
//! sampling.
//!
//! ## Features
//!
//! - **Spherical Density**: log-domain concentration model, stable for large `kappa`
//! - **Region Store**: flat region-major count tables with id recycling and growth
//! - **Gibbs Sampler**: joint `(region, candidate)` draws for toponyms, region draws for words
//! - **Annealing**: tempered burn-in and posterior averaging through [`Annealer`](toporeg_samplers::Annealer)
//! - **Kappa Estimation**: optional Metropolis-Hastings update of the concentration
//! - **File Adapters**: plain or gz token and coordinate files, JSON posterior output
//!
//! ## Quick Start
//!
//! ```rust
//! use toporeg_core::{CoordinateLexicon, Corpus, geographic_to_cartesian};
//! use toporeg_samplers::{AnnealingSchedule, SimulatedAnnealer};
//! use toporeg_sphere::{DecodeMode, ModelConfig, SphericalRegionModel};
//!
//! // word 0 is a toponym with two candidates, word 1 an ordinary word
//! let corpus = Corpus::new(
//!     vec![0, 1, 0, 1],
//!     vec![0, 0, 1, 1],
//!     vec![true, false, true, false],
//!     vec![false; 4],
//! )
//! .unwrap();
//! let lexicon = CoordinateLexicon::from_cartesian(vec![vec![
//!     geographic_to_cartesian(-89.65, 39.80),
//!     geographic_to_cartesian(-72.59, 42.10),
//! ]]);
//!
//! let config = ModelConfig::default().with_seed(7).with_expected_regions(8);
//! let mut model = SphericalRegionModel::new(&corpus, &lexicon, config).unwrap();
//! let mut annealer = SimulatedAnnealer::new(AnnealingSchedule::untempered(3, 2, 1)).unwrap();
//!
//! let summary = model.train(&mut annealer, None, ()).unwrap();
//! assert_eq!(summary.samples, 2);
//! model.check_consistency().unwrap();
//!
//! let decoded = model.decode(DecodeMode::MaxPosterior).unwrap();
//! assert!(decoded.iter().all(|a| a.region.is_some()));
//! ```

pub mod config;
pub mod density;
pub mod kappa;
pub mod loader;
pub mod model;
pub mod output;
pub mod region;

pub use config::*;
pub use density::*;
pub use kappa::*;
pub use loader::*;
pub use model::*;
pub use output::*;
pub use region::*;
