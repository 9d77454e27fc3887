//! Configuration for the region model.
//!
//! [`ModelConfig`] carries everything a [`crate::SphericalRegionModel`] needs
//! besides its inputs; [`ExperimentConfig`] is the on-disk TOML layout that
//! also names the input files and the annealing schedule.
//!
//! # Example TOML
//!
//! ```toml
//! profile = "standard"
//! decode = "max-posterior"
//!
//! [paths]
//! tokens = "data/tokens.txt.gz"
//! coordinates = "data/coordinates.txt"
//!
//! [model]
//! alpha = 1.0
//! beta = 0.1
//! crpalpha = 20.0
//! kappa = 20.0
//! expected_regions = 100
//! seed = 1
//!
//! [annealing]
//! burn_in = 100
//! samples = 100
//! lag = 10
//! ```

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use toporeg_core::{HyperParameters, ModelError, PathConfigFile, Result};
use toporeg_samplers::{AnnealingSchedule, RunProfile};

/// How the terminal decode pass picks each token's region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecodeMode {
    /// Highest posterior-averaged probability
    #[default]
    MaxPosterior,
    /// One draw from the posterior-averaged distribution
    Sample,
}

impl DecodeMode {
    /// Parse a decode mode name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "max-posterior" | "max" | "map" | "argmax" => Some(Self::MaxPosterior),
            "sample" | "draw" => Some(Self::Sample),
            _ => None,
        }
    }
}

/// Settings of one sampling run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    #[serde(flatten)]
    pub hyper: HyperParameters,
    /// Initial region capacity (`expectedR`).
    pub expected_regions: usize,
    pub seed: u64,
    /// Re-estimate `kappa` by Metropolis-Hastings after each burn-in sweep.
    pub estimate_kappa: bool,
    /// Standard deviation of the kappa random-walk proposal.
    pub kappa_proposal_sd: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            hyper: HyperParameters::default(),
            expected_regions: 100,
            seed: 1,
            estimate_kappa: false,
            kappa_proposal_sd: 1.0,
        }
    }
}

impl ModelConfig {
    pub fn with_hyper(mut self, hyper: HyperParameters) -> Self {
        self.hyper = hyper;
        self
    }

    /// Set the CRP concentration.
    pub fn with_crpalpha(mut self, crpalpha: f64) -> Self {
        self.hyper.crpalpha = crpalpha;
        self
    }

    /// Set the spherical concentration.
    pub fn with_kappa(mut self, kappa: f64) -> Self {
        self.hyper.kappa = kappa;
        self
    }

    pub fn with_expected_regions(mut self, expected_regions: usize) -> Self {
        self.expected_regions = expected_regions;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable kappa estimation with the given proposal width.
    pub fn with_kappa_estimation(mut self, proposal_sd: f64) -> Self {
        self.estimate_kappa = true;
        self.kappa_proposal_sd = proposal_sd;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.hyper.validate()?;
        if self.expected_regions == 0 {
            return Err(ModelError::InvalidCapacity(self.expected_regions));
        }
        if self.estimate_kappa
            && !(self.kappa_proposal_sd > 0.0 && self.kappa_proposal_sd.is_finite())
        {
            return Err(ModelError::InvalidHyperparameter {
                name: "kappa_proposal_sd",
                value: self.kappa_proposal_sd,
                reason: "must be positive when estimating kappa",
            });
        }
        Ok(())
    }
}

/// Experiment file layout.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Schedule preset, applied when no `[annealing]` table is given.
    pub profile: Option<RunProfile>,
    pub decode: Option<DecodeMode>,
    pub paths: PathConfigFile,
    pub model: ModelConfig,
    pub annealing: Option<AnnealingSchedule>,
}

impl ExperimentConfig {
    pub fn from_toml_str(contents: &str) -> AnyResult<Self> {
        toml::from_str(contents).context("Failed to parse experiment config")
    }

    pub fn from_file(path: &Path) -> AnyResult<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_toml_str(&contents).with_context(|| format!("In config file {:?}", path))
    }

    pub fn to_toml_string(&self) -> AnyResult<String> {
        toml::to_string_pretty(self).context("Failed to serialize experiment config")
    }

    /// The explicit `[annealing]` table, else the profile preset.
    pub fn schedule(&self) -> AnnealingSchedule {
        self.annealing
            .unwrap_or_else(|| self.profile.unwrap_or_default().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_mode_from_name() {
        assert_eq!(DecodeMode::from_name("MAP"), Some(DecodeMode::MaxPosterior));
        assert_eq!(DecodeMode::from_name("sample"), Some(DecodeMode::Sample));
        assert_eq!(DecodeMode::from_name("mode"), None);
    }

    #[test]
    fn test_config_builder() {
        let config = ModelConfig::default()
            .with_crpalpha(0.0)
            .with_seed(99)
            .with_kappa_estimation(0.5);
        assert_eq!(config.hyper.crpalpha, 0.0);
        assert_eq!(config.seed, 99);
        assert!(config.estimate_kappa);
        assert!(config.validate().is_ok());
        assert!(ModelConfig::default().with_expected_regions(0).validate().is_err());
    }

    #[test]
    fn test_experiment_toml_with_defaults() {
        let config = ExperimentConfig::from_toml_str(
            r#"
            profile = "smoke"
            decode = "sample"

            [paths]
            tokens = "tokens.txt"

            [model]
            kappa = 35.0
            seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.model.hyper.kappa, 35.0);
        assert_eq!(config.model.hyper.alpha, 1.0, "missing keys take defaults");
        assert_eq!(config.model.seed, 7);
        assert_eq!(config.decode, Some(DecodeMode::Sample));
        assert_eq!(config.schedule(), AnnealingSchedule::from(RunProfile::Smoke));
        assert_eq!(config.paths.tokens.as_deref(), Some(Path::new("tokens.txt")));
    }

    #[test]
    fn test_annealing_table_beats_profile() {
        let config = ExperimentConfig::from_toml_str(
            r#"
            profile = "thorough"
            [annealing]
            burn_in = 3
            samples = 2
            lag = 1
            "#,
        )
        .unwrap();
        let schedule = config.schedule();
        assert_eq!(schedule.burn_in, 3);
        assert_eq!(schedule.initial_temperature, 1.0);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = ExperimentConfig::default();
        config.model.seed = 42;
        config.annealing = Some(AnnealingSchedule::untempered(1, 1, 1));
        let text = config.to_toml_string().unwrap();
        assert_eq!(ExperimentConfig::from_toml_str(&text).unwrap(), config);
    }
}
