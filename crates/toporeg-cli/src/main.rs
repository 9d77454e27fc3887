//! Train the toponym region model and write its posterior.
//!
//! # Usage
//!
//! ```bash
//! # Inputs from flags
//! toporeg --tokens data/tokens.txt.gz --coordinates data/coordinates.txt \
//!   --output-dir out/ --profile standard
//!
//! # Everything from an experiment file, one override
//! TOPOREG_CONFIG_FILE=experiment.toml toporeg --crpalpha 5
//!
//! # Tempered burn-in with kappa estimation
//! toporeg --config-file experiment.toml \
//!   --initial-temperature 2.0 --temperature-decrement 0.1 --estimate-kappa
//! ```
//!
//! Writes `assignments.txt.gz` (one line per token) and `model.json`
//! (posterior region summaries and averaged tables) to the output directory.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use toporeg_core::{PathArgs, PathConfig};
use toporeg_observers::SweepTrace;
use toporeg_samplers::{AnnealingSchedule, RunProfile, SimulatedAnnealer};
use toporeg_sphere::{
    read_coordinates, read_tokens, write_assignments_file, write_output_json, DecodeMode,
    ExperimentConfig, SphericalRegionModel,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "toporeg")]
#[command(
    author,
    version,
    about = "Geolocate toponyms with a CRP region-topic Gibbs sampler"
)]
struct Args {
    #[command(flatten)]
    paths: PathArgs,

    /// Document-region smoothing
    #[arg(long)]
    alpha: Option<f64>,

    /// Word-region smoothing
    #[arg(long)]
    beta: Option<f64>,

    /// CRP new-region concentration
    #[arg(long)]
    crpalpha: Option<f64>,

    /// Spherical concentration
    #[arg(long)]
    kappa: Option<f64>,

    /// Initial region capacity
    #[arg(long)]
    expected_regions: Option<usize>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Schedule preset: smoke, standard, thorough
    #[arg(long)]
    profile: Option<String>,

    /// Sweeps per temperature step
    #[arg(long)]
    burn_in: Option<usize>,

    /// Posterior samples to collect
    #[arg(long)]
    samples: Option<usize>,

    /// Sweeps between collected samples
    #[arg(long)]
    lag: Option<usize>,

    #[arg(long)]
    initial_temperature: Option<f64>,

    #[arg(long)]
    target_temperature: Option<f64>,

    #[arg(long)]
    temperature_decrement: Option<f64>,

    /// Decode mode: max-posterior or sample
    #[arg(long)]
    decode: Option<String>,

    /// Re-estimate kappa during burn-in
    #[arg(long)]
    estimate_kappa: bool,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, default_value = "info")]
    log_level: Level,
}

impl Args {
    /// Experiment file (if any) with command-line overrides applied.
    fn experiment(&self) -> Result<ExperimentConfig> {
        let mut config = match &self.paths.config_file {
            Some(path) => ExperimentConfig::from_file(path)?,
            None => ExperimentConfig::default(),
        };

        let hyper = &mut config.model.hyper;
        hyper.alpha = self.alpha.unwrap_or(hyper.alpha);
        hyper.beta = self.beta.unwrap_or(hyper.beta);
        hyper.crpalpha = self.crpalpha.unwrap_or(hyper.crpalpha);
        hyper.kappa = self.kappa.unwrap_or(hyper.kappa);
        if let Some(expected) = self.expected_regions {
            config.model.expected_regions = expected;
        }
        if let Some(seed) = self.seed {
            config.model.seed = seed;
        }
        if self.estimate_kappa {
            config.model.estimate_kappa = true;
        }

        if let Some(name) = &self.profile {
            let profile = RunProfile::from_name(name)
                .with_context(|| format!("Unknown profile {:?}", name))?;
            config.profile = Some(profile);
            config.annealing = None;
        }
        if let Some(name) = &self.decode {
            let mode = DecodeMode::from_name(name)
                .with_context(|| format!("Unknown decode mode {:?}", name))?;
            config.decode = Some(mode);
        }

        let mut schedule = config.schedule();
        let before = schedule;
        schedule.burn_in = self.burn_in.unwrap_or(schedule.burn_in);
        schedule.samples = self.samples.unwrap_or(schedule.samples);
        schedule.lag = self.lag.unwrap_or(schedule.lag);
        schedule.initial_temperature = self
            .initial_temperature
            .unwrap_or(schedule.initial_temperature);
        schedule.target_temperature = self
            .target_temperature
            .unwrap_or(schedule.target_temperature);
        schedule.temperature_decrement = self
            .temperature_decrement
            .unwrap_or(schedule.temperature_decrement);
        if schedule != before {
            config.annealing = Some(schedule);
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let experiment = args.experiment()?;
    let paths = PathConfig::resolve(args.paths.clone(), experiment.paths.clone());
    let schedule: AnnealingSchedule = experiment.schedule();
    info!(
        "Schedule: T {} -> {} by {}, {} burn-in sweeps/step, {} samples every {} sweeps",
        schedule.initial_temperature,
        schedule.target_temperature,
        schedule.temperature_decrement,
        schedule.burn_in,
        schedule.samples,
        schedule.lag
    );

    let corpus = read_tokens(paths.tokens()?)?;
    let lexicon = read_coordinates(paths.coordinates()?)?;

    let mut model = SphericalRegionModel::new(&corpus, &lexicon, experiment.model)
        .context("Failed to set up the region model")?;
    let mut annealer = SimulatedAnnealer::new(schedule)?;
    let mut trace = SweepTrace::default();
    let summary = model.train(&mut annealer, None, &mut trace)?;
    model
        .check_consistency()
        .context("Region tables disagree with token assignments after training")?;

    info!(
        "{} sweeps in {:.1}s, peak {} live regions, {} token moves",
        summary.sweeps,
        summary.elapsed_secs,
        trace.peak_live_regions(),
        trace.total_moves()
    );

    let decoded = model.decode(experiment.decode.unwrap_or_default())?;
    let output = model.output(summary, decoded)?;

    let output_dir: PathBuf = paths.output_dir().to_path_buf();
    write_assignments_file(
        &output_dir.join("assignments.txt.gz"),
        &corpus,
        &output.assignments,
    )?;
    write_output_json(&output_dir.join("model.json"), &output)?;

    for (region, tokens) in output.region_sizes().iter().take(10) {
        info!("region {}: {} tokens", region, tokens);
    }
    Ok(())
}
