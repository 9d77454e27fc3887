//! Serializable results of a training run.

use crate::model::SphericalRegionModel;
use serde::{Deserialize, Serialize};
use toporeg_core::{cartesian_to_geographic, normalized, HyperParameters, Result, Vec3};
use toporeg_observers::PosteriorAverages;

/// Region and chosen candidate of one token; both empty for stopwords.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAssignment {
    pub region: Option<u32>,
    pub coordinate: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub sweeps: usize,
    /// Collected posterior samples.
    pub samples: usize,
    pub live_regions: usize,
    pub current_regions: usize,
    pub capacity: usize,
    pub kappa: f64,
    /// True when training ended on the cancel flag.
    pub stopped: bool,
    pub elapsed_secs: f64,
}

/// One region of the posterior-averaged tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub id: usize,
    pub tokens: f64,
    pub toponyms: f64,
    pub mean: Vec3,
    /// Degrees; absent for regions without toponyms.
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

impl RegionSummary {
    fn from_averages(averages: &PosteriorAverages, id: usize) -> Self {
        let mean = normalized(averages.mean(id)).unwrap_or([0.0; 3]);
        let location = cartesian_to_geographic(&mean);
        Self {
            id,
            tokens: averages.total(id),
            toponyms: averages.toponym_totals[id],
            mean,
            longitude: location.map(|(lon, _)| lon),
            latitude: location.map(|(_, lat)| lat),
        }
    }
}

/// Everything written to `model.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    pub summary: TrainingSummary,
    pub hyper: HyperParameters,
    /// Regions with posterior mass, by id.
    pub regions: Vec<RegionSummary>,
    pub posterior: PosteriorAverages,
    /// Decoded per-token assignments; written separately.
    #[serde(skip)]
    pub assignments: Vec<TokenAssignment>,
}

impl ModelOutput {
    pub fn from_model(
        model: &SphericalRegionModel<'_>,
        summary: TrainingSummary,
        assignments: Vec<TokenAssignment>,
    ) -> Result<Self> {
        let posterior = model.posterior_averages()?;
        let regions = (0..posterior.regions)
            .filter(|&r| posterior.total(r) > 0.0)
            .map(|r| RegionSummary::from_averages(&posterior, r))
            .collect();
        Ok(Self {
            summary,
            hyper: model.config().hyper,
            regions,
            posterior,
            assignments,
        })
    }

    /// Tokens decoded into each region id, for quick reporting.
    pub fn region_sizes(&self) -> Vec<(u32, usize)> {
        let mut sizes = std::collections::BTreeMap::new();
        for region in self.assignments.iter().filter_map(|a| a.region) {
            *sizes.entry(region).or_insert(0) += 1;
        }
        sizes.into_iter().collect()
    }
}
