use serde::{Deserialize, Serialize};
use toporeg_core::{ModelError, Result};

/// Temperatures closer than this to the target snap onto it.
pub const TEMPERATURE_EPSILON: f64 = 1e-6;

/// Temperature schedule and posterior sampling plan.
///
/// The run lowers the temperature from `initial_temperature` to
/// `target_temperature` in steps of `temperature_decrement`, running
/// `burn_in` sweeps at each step. It then runs `samples * lag` sweeps at the
/// target temperature and records every `lag`-th one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnealingSchedule {
    pub initial_temperature: f64,
    pub target_temperature: f64,
    pub temperature_decrement: f64,
    /// Sweeps per temperature step.
    pub burn_in: usize,
    /// Number of posterior snapshots to average.
    pub samples: usize,
    /// Sweeps between snapshots.
    pub lag: usize,
}

impl Default for AnnealingSchedule {
    fn default() -> Self {
        Self {
            initial_temperature: 1.0,
            target_temperature: 1.0,
            temperature_decrement: 0.1,
            burn_in: 100,
            samples: 100,
            lag: 10,
        }
    }
}

impl AnnealingSchedule {
    pub fn new(
        initial_temperature: f64,
        target_temperature: f64,
        temperature_decrement: f64,
        burn_in: usize,
        samples: usize,
        lag: usize,
    ) -> Self {
        Self {
            initial_temperature,
            target_temperature,
            temperature_decrement,
            burn_in,
            samples,
            lag,
        }
    }

    /// Plain sampling at `T = 1`, no tempering.
    pub fn untempered(burn_in: usize, samples: usize, lag: usize) -> Self {
        Self::new(1.0, 1.0, 0.1, burn_in, samples, lag)
    }

    pub fn is_tempered(&self) -> bool {
        (self.initial_temperature - self.target_temperature).abs() > TEMPERATURE_EPSILON
    }

    /// Number of distinct temperatures visited during burn-in.
    pub fn temperature_steps(&self) -> usize {
        if !self.is_tempered() {
            return 1;
        }
        ((self.initial_temperature - self.target_temperature) / self.temperature_decrement).round()
            as usize
            + 1
    }

    /// Temperature of burn-in step `step`, snapped onto the target.
    pub fn temperature_at(&self, step: usize) -> f64 {
        let t = self.initial_temperature - step as f64 * self.temperature_decrement;
        if !self.is_tempered()
            || t < self.target_temperature
            || (t - self.target_temperature).abs() < TEMPERATURE_EPSILON
        {
            self.target_temperature
        } else {
            t
        }
    }

    pub fn burn_in_sweeps(&self) -> usize {
        self.temperature_steps() * self.burn_in
    }

    pub fn sampling_sweeps(&self) -> usize {
        self.samples * self.lag
    }

    pub fn total_sweeps(&self) -> usize {
        self.burn_in_sweeps() + self.sampling_sweeps()
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(ModelError::InvalidSchedule(msg));
        if !(self.target_temperature > 0.0 && self.target_temperature.is_finite()) {
            return bad(format!(
                "target temperature {} must be positive",
                self.target_temperature
            ));
        }
        if !self.initial_temperature.is_finite()
            || self.initial_temperature < self.target_temperature
        {
            return bad(format!(
                "initial temperature {} must be finite and at least the target {}",
                self.initial_temperature, self.target_temperature
            ));
        }
        if self.is_tempered()
            && !(self.temperature_decrement > 0.0 && self.temperature_decrement.is_finite())
        {
            return bad(format!(
                "temperature decrement {} must be positive when tempering",
                self.temperature_decrement
            ));
        }
        if self.samples > 0 && self.lag == 0 {
            return bad("lag must be at least 1 when collecting samples".to_string());
        }
        Ok(())
    }
}

/// Named schedule presets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunProfile {
    /// A handful of sweeps for wiring checks
    Smoke,
    /// Reference experiment defaults
    #[default]
    Standard,
    /// Tempered burn-in with a long sampling phase
    Thorough,
}

impl RunProfile {
    /// Parse a profile name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "smoke" | "quick" => Some(Self::Smoke),
            "standard" | "default" => Some(Self::Standard),
            "thorough" | "full" => Some(Self::Thorough),
            _ => None,
        }
    }
}

impl From<RunProfile> for AnnealingSchedule {
    fn from(profile: RunProfile) -> Self {
        match profile {
            RunProfile::Smoke => AnnealingSchedule::untempered(5, 2, 1),
            RunProfile::Standard => AnnealingSchedule::default(),
            RunProfile::Thorough => AnnealingSchedule::new(2.0, 1.0, 0.1, 50, 200, 10),
        }
    }
}
