//! # toporeg-observers
//!
//! Observation utilities for the toporeg region model.
//!
//! Observers collect data during sampling without modifying the sampling
//! algorithm.
//!
//! ## SweepTrace
//!
//! Keep one [`SweepStats`] record per sweep:
//!
//! ```rust
//! use toporeg_observers::{SweepObserver, SweepStats, SweepTrace};
//!
//! let mut trace = SweepTrace::default();
//! trace.observe(&SweepStats { sweep: 1, live_regions: 3, ..Default::default() });
//! assert_eq!(trace.records().len(), 1);
//! ```
//!
//! ## PosteriorAccumulator
//!
//! Running sums of region tables over the collected sweeps. Like any moment
//! accumulator it stores sums; [`PosteriorAccumulator::average`] divides by
//! the number of samples.
#![allow(clippy::must_use_candidate)] // getters

pub mod observer;
pub mod posterior;

pub use observer::*;
pub use posterior::*;
