//! Path and hyperparameter configuration for toporeg.
//!
//! Input and output paths can be configured via:
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`TOPOREG_TOKENS`, `TOPOREG_COORDINATES`, `TOPOREG_OUTPUT_DIR`)
//! 3. The `[paths]` table of a config file
//! 4. Default system directories
//!
//! # Example
//!
//! ```ignore
//! use toporeg_core::config::{PathArgs, PathConfig};
//!
//! let config = PathConfig::resolve(args.paths, file.paths)?;
//! let corpus_path = config.tokens()?;
//! ```

use crate::error::{ModelError, Result};
use clap::Args;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// CLI arguments for input/output paths.
#[derive(Args, Debug, Clone, Default)]
pub struct PathArgs {
    /// Token stream: one `word document toponym stopword` line per token (.gz accepted)
    #[arg(long, env = "TOPOREG_TOKENS")]
    pub tokens: Option<PathBuf>,

    /// Coordinate records: one `word lon lat [lon lat ...]` line per toponym (.gz accepted)
    #[arg(long, env = "TOPOREG_COORDINATES")]
    pub coordinates: Option<PathBuf>,

    /// Directory receiving assignments and posterior summaries
    #[arg(long, env = "TOPOREG_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Path to an experiment config file (TOML)
    #[arg(long, env = "TOPOREG_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,
}

/// `[paths]` table of the experiment config file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PathConfigFile {
    pub tokens: Option<PathBuf>,
    pub coordinates: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

/// Resolved paths for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PathConfig {
    tokens: Option<PathBuf>,
    coordinates: Option<PathBuf>,
    output_dir: PathBuf,
}

impl PathConfig {
    /// Merges CLI/env values over the config file, then defaults.
    pub fn resolve(args: PathArgs, file: PathConfigFile) -> Self {
        Self {
            tokens: args.tokens.or(file.tokens),
            coordinates: args.coordinates.or(file.coordinates),
            output_dir: args
                .output_dir
                .or(file.output_dir)
                .unwrap_or_else(Self::default_output_dir),
        }
    }

    /// Token stream path; required for a training run.
    pub fn tokens(&self) -> Result<&Path> {
        self.tokens
            .as_deref()
            .ok_or_else(|| missing_path("tokens"))
    }

    /// Coordinate records path; required for a training run.
    pub fn coordinates(&self) -> Result<&Path> {
        self.coordinates
            .as_deref()
            .ok_or_else(|| missing_path("coordinates"))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Default output directory based on OS conventions.
    fn default_output_dir() -> PathBuf {
        if let Some(dirs) = ProjectDirs::from("", "", "toporeg") {
            dirs.data_dir().join("output")
        } else {
            env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("output")
        }
    }
}

fn missing_path(name: &str) -> ModelError {
    ModelError::MissingInput(format!(
        "no {name} path given (use --{name}, TOPOREG_{} or the [paths] table)",
        name.to_uppercase()
    ))
}

/// Model hyperparameters.
///
/// - `alpha`: document-region smoothing
/// - `beta`: word-region smoothing (`betaW = beta * W`)
/// - `crpalpha`: CRP new-region concentration
/// - `kappa`: spherical concentration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HyperParameters {
    pub alpha: f64,
    pub beta: f64,
    pub crpalpha: f64,
    pub kappa: f64,
}

impl Default for HyperParameters {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 0.1,
            crpalpha: 20.0,
            kappa: 20.0,
        }
    }
}

impl HyperParameters {
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    pub fn with_crpalpha(mut self, crpalpha: f64) -> Self {
        self.crpalpha = crpalpha;
        self
    }

    pub fn with_kappa(mut self, kappa: f64) -> Self {
        self.kappa = kappa;
        self
    }

    /// `beta * W`, the word smoothing mass of one region.
    pub fn beta_w(&self, vocabulary_size: usize) -> f64 {
        self.beta * vocabulary_size as f64
    }

    /// Rejects values that would leave the sampler undefined.
    pub fn validate(&self) -> Result<()> {
        check("alpha", self.alpha, self.alpha > 0.0, "must be positive")?;
        check("beta", self.beta, self.beta > 0.0, "must be positive")?;
        check("crpalpha", self.crpalpha, self.crpalpha >= 0.0, "must be non-negative")?;
        check("kappa", self.kappa, self.kappa >= 0.0, "must be non-negative")?;
        Ok(())
    }
}

fn check(name: &'static str, value: f64, ok: bool, reason: &'static str) -> Result<()> {
    if !value.is_finite() {
        return Err(ModelError::InvalidHyperparameter {
            name,
            value,
            reason: "must be finite",
        });
    }
    if !ok {
        return Err(ModelError::InvalidHyperparameter {
            name,
            value,
            reason,
        });
    }
    Ok(())
}
