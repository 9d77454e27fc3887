//! Annealers drive the sweep loop.
//!
//! An [`Annealer`] announces sweeps one at a time, says which temperature a
//! sweep runs at, says whether the sweep's state should be recorded into the
//! posterior average, and turns log-masses into the weights the sampler draws
//! from.

use crate::categorical::{argmax, temper_log_weights};
use crate::schedule::AnnealingSchedule;
use toporeg_core::Result;
use tracing::{debug, info};

/// Interface between the Gibbs sampler and its temperature schedule.
pub trait Annealer {
    /// Advances to the next sweep. Returns `false` once the schedule is exhausted.
    fn next_iter(&mut self) -> bool;

    /// Temperature of the current sweep.
    fn temperature(&self) -> f64;

    /// True when the current sweep's final state belongs in the posterior average.
    fn is_collecting(&self) -> bool;

    /// True while the schedule is still lowering the temperature.
    fn is_burning_in(&self) -> bool;

    /// Sweeps announced so far.
    fn sweeps(&self) -> usize;

    /// Converts log-masses into drawing weights in place and returns their sum.
    fn anneal(&self, log_weights: &mut [f64]) -> f64 {
        temper_log_weights(log_weights, 1.0 / self.temperature())
    }
}

/// Position of a [`SimulatedAnnealer`] within its schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnealPhase {
    NotStarted,
    /// `sweep` is 1-based within temperature step `step`.
    BurnIn { step: usize, sweep: usize },
    /// `sweep` is 1-based within the sampling phase.
    Sampling { sweep: usize },
    Finished,
}

/// Tempered burn-in followed by posterior sampling at the target temperature.
///
/// With equal initial and target temperatures this is plain Gibbs sampling:
/// `anneal` reduces to normalizing the log-masses.
#[derive(Debug, Clone)]
pub struct SimulatedAnnealer {
    schedule: AnnealingSchedule,
    phase: AnnealPhase,
    sweeps: usize,
}

impl SimulatedAnnealer {
    pub fn new(schedule: AnnealingSchedule) -> Result<Self> {
        schedule.validate()?;
        Ok(Self {
            schedule,
            phase: AnnealPhase::NotStarted,
            sweeps: 0,
        })
    }

    pub fn schedule(&self) -> &AnnealingSchedule {
        &self.schedule
    }

    pub fn phase(&self) -> AnnealPhase {
        self.phase
    }

    fn start_burn_in(&self) -> Option<AnnealPhase> {
        (self.schedule.burn_in > 0).then_some(AnnealPhase::BurnIn { step: 0, sweep: 1 })
    }

    fn start_sampling(&self) -> AnnealPhase {
        if self.schedule.samples == 0 {
            return AnnealPhase::Finished;
        }
        info!(
            "Sampling phase: {} samples every {} sweeps at T={}",
            self.schedule.samples, self.schedule.lag, self.schedule.target_temperature
        );
        AnnealPhase::Sampling { sweep: 1 }
    }
}

impl Annealer for SimulatedAnnealer {
    fn next_iter(&mut self) -> bool {
        let steps = self.schedule.temperature_steps();
        self.phase = match self.phase {
            AnnealPhase::NotStarted => self
                .start_burn_in()
                .unwrap_or_else(|| self.start_sampling()),
            AnnealPhase::BurnIn { step, sweep } if sweep < self.schedule.burn_in => {
                AnnealPhase::BurnIn {
                    step,
                    sweep: sweep + 1,
                }
            }
            AnnealPhase::BurnIn { step, .. } if step + 1 < steps => {
                debug!(
                    "Temperature step {}/{}: T={}",
                    step + 2,
                    steps,
                    self.schedule.temperature_at(step + 1)
                );
                AnnealPhase::BurnIn {
                    step: step + 1,
                    sweep: 1,
                }
            }
            AnnealPhase::BurnIn { .. } => self.start_sampling(),
            AnnealPhase::Sampling { sweep } if sweep < self.schedule.sampling_sweeps() => {
                AnnealPhase::Sampling { sweep: sweep + 1 }
            }
            AnnealPhase::Sampling { .. } | AnnealPhase::Finished => AnnealPhase::Finished,
        };

        if self.phase == AnnealPhase::Finished {
            return false;
        }
        self.sweeps += 1;
        true
    }

    fn temperature(&self) -> f64 {
        match self.phase {
            AnnealPhase::NotStarted => self.schedule.initial_temperature,
            AnnealPhase::BurnIn { step, .. } => self.schedule.temperature_at(step),
            AnnealPhase::Sampling { .. } | AnnealPhase::Finished => {
                self.schedule.target_temperature
            }
        }
    }

    fn is_collecting(&self) -> bool {
        matches!(self.phase, AnnealPhase::Sampling { sweep } if sweep % self.schedule.lag == 0)
    }

    fn is_burning_in(&self) -> bool {
        matches!(self.phase, AnnealPhase::BurnIn { .. })
    }

    fn sweeps(&self) -> usize {
        self.sweeps
    }
}

/// One-pass annealer that puts all mass on the most probable outcome.
#[derive(Debug, Clone, Default)]
pub struct MaximumPosteriorDecoder {
    sweeps: usize,
}

impl MaximumPosteriorDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Annealer for MaximumPosteriorDecoder {
    fn next_iter(&mut self) -> bool {
        if self.sweeps > 0 {
            return false;
        }
        self.sweeps = 1;
        true
    }

    fn temperature(&self) -> f64 {
        1.0
    }

    fn is_collecting(&self) -> bool {
        false
    }

    fn is_burning_in(&self) -> bool {
        false
    }

    fn sweeps(&self) -> usize {
        self.sweeps
    }

    fn anneal(&self, log_weights: &mut [f64]) -> f64 {
        let best = argmax(log_weights).filter(|&i| log_weights[i] > f64::NEG_INFINITY);
        log_weights.iter_mut().for_each(|w| *w = 0.0);
        match best {
            Some(i) => {
                log_weights[i] = 1.0;
                1.0
            }
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(annealer: &mut SimulatedAnnealer) -> Vec<(f64, bool)> {
        let mut trace = Vec::new();
        while annealer.next_iter() {
            trace.push((annealer.temperature(), annealer.is_collecting()));
        }
        trace
    }

    #[test]
    fn test_untempered_schedule() {
        let mut a = SimulatedAnnealer::new(AnnealingSchedule::untempered(3, 2, 2)).unwrap();
        let trace = run(&mut a);
        assert_eq!(trace.len(), 3 + 4);
        assert!(trace.iter().all(|&(t, _)| t == 1.0));
        let collected: Vec<bool> = trace.iter().map(|&(_, c)| c).collect();
        assert_eq!(collected, vec![false, false, false, false, true, false, true]);
        assert_eq!(a.sweeps(), 7);
        assert!(!a.next_iter(), "finished annealer stays finished");
    }

    #[test]
    fn test_tempered_schedule_descends() {
        let mut a =
            SimulatedAnnealer::new(AnnealingSchedule::new(1.2, 1.0, 0.1, 2, 1, 1)).unwrap();
        let temps: Vec<f64> = run(&mut a).into_iter().map(|(t, _)| t).collect();
        assert_eq!(temps.len(), 3 * 2 + 1);
        assert!((temps[0] - 1.2).abs() < 1e-12);
        assert!((temps[2] - 1.1).abs() < 1e-12);
        assert_eq!(temps[4], 1.0);
        assert_eq!(temps[6], 1.0);
    }

    #[test]
    fn test_burn_in_flags() {
        let mut a = SimulatedAnnealer::new(AnnealingSchedule::untempered(1, 1, 1)).unwrap();
        assert!(a.next_iter());
        assert!(a.is_burning_in());
        assert!(a.next_iter());
        assert!(!a.is_burning_in());
        assert!(a.is_collecting());
    }

    #[test]
    fn test_no_burn_in_no_samples() {
        let mut a = SimulatedAnnealer::new(AnnealingSchedule::untempered(0, 0, 1)).unwrap();
        assert!(!a.next_iter());
        assert_eq!(a.phase(), AnnealPhase::Finished);
    }

    #[test]
    fn test_invalid_schedule_rejected() {
        assert!(SimulatedAnnealer::new(AnnealingSchedule::new(1.0, 2.0, 0.1, 1, 1, 1)).is_err());
    }

    #[test]
    fn test_decoder_is_one_hot() {
        let mut d = MaximumPosteriorDecoder::new();
        assert!(d.next_iter());
        assert!(!d.next_iter());
        let mut w = vec![-3.0, -1.0, f64::NEG_INFINITY, -2.0];
        assert_eq!(d.anneal(&mut w), 1.0);
        assert_eq!(w, vec![0.0, 1.0, 0.0, 0.0]);

        let mut dead = vec![f64::NEG_INFINITY; 2];
        assert_eq!(d.anneal(&mut dead), 0.0);
    }
}
