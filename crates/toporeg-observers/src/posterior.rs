//! Posterior averaging of region tables.
//!
//! All tables are region-major: row `r` of the document table occupies
//! `r * documents .. (r + 1) * documents`, and likewise for words and
//! coordinate slots. Growing the region capacity therefore only appends rows.

use serde::{Deserialize, Serialize};
use toporeg_core::{normalized, Vec3};

/// Borrowed view of a region store's tables at one instant.
#[derive(Debug, Clone, Copy)]
pub struct RegionTables<'a> {
    pub capacity: usize,
    pub current_regions: usize,
    pub documents: usize,
    pub vocabulary: usize,
    pub coordinate_slots: usize,
    /// Tokens per region `[capacity]`.
    pub totals: &'a [u32],
    /// Toponym tokens per region `[capacity]`.
    pub toponym_totals: &'a [u32],
    /// `[capacity * documents]`
    pub document_counts: &'a [u32],
    /// `[capacity * vocabulary]`
    pub word_counts: &'a [u32],
    /// `[capacity * coordinate_slots]`
    pub coordinate_counts: &'a [u32],
    /// Unnormalized coordinate sums `[capacity]`.
    pub means: &'a [Vec3],
}

/// Running sums of region tables over collected sweeps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PosteriorAccumulator {
    samples: usize,
    capacity: usize,
    regions: usize,
    documents: usize,
    vocabulary: usize,
    coordinate_slots: usize,
    totals: Vec<f64>,
    toponym_totals: Vec<f64>,
    document_counts: Vec<f64>,
    word_counts: Vec<f64>,
    coordinate_counts: Vec<f64>,
    means: Vec<Vec3>,
}

impl PosteriorAccumulator {
    pub fn new(documents: usize, vocabulary: usize, coordinate_slots: usize) -> Self {
        Self {
            documents,
            vocabulary,
            coordinate_slots,
            ..Default::default()
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grows every sum table to `capacity` regions, zero-filling new rows.
    /// Smaller or equal capacities are a no-op.
    pub fn resize_regions(&mut self, capacity: usize) {
        if capacity <= self.capacity {
            return;
        }
        self.totals.resize(capacity, 0.0);
        self.toponym_totals.resize(capacity, 0.0);
        self.document_counts.resize(capacity * self.documents, 0.0);
        self.word_counts.resize(capacity * self.vocabulary, 0.0);
        self.coordinate_counts
            .resize(capacity * self.coordinate_slots, 0.0);
        self.means.resize(capacity, [0.0; 3]);
        self.capacity = capacity;
    }

    /// Adds one snapshot of the tables to the running sums.
    pub fn record(&mut self, tables: &RegionTables<'_>) {
        self.resize_regions(tables.capacity);
        accumulate(&mut self.totals, tables.totals);
        accumulate(&mut self.toponym_totals, tables.toponym_totals);
        accumulate(&mut self.document_counts, tables.document_counts);
        accumulate(&mut self.word_counts, tables.word_counts);
        accumulate(&mut self.coordinate_counts, tables.coordinate_counts);
        for (sum, m) in self.means.iter_mut().zip(tables.means) {
            sum[0] += m[0];
            sum[1] += m[1];
            sum[2] += m[2];
        }
        self.regions = self.regions.max(tables.current_regions);
        self.samples += 1;
    }

    /// Averages over the recorded samples, or `None` before the first one.
    pub fn average(&self) -> Option<PosteriorAverages> {
        if self.samples == 0 {
            return None;
        }
        let n = self.samples as f64;
        let r = self.regions;
        let scaled = |v: &[f64], stride: usize| -> Vec<f64> {
            v[..r * stride].iter().map(|x| x / n).collect()
        };

        Some(PosteriorAverages {
            samples: self.samples,
            regions: r,
            documents: self.documents,
            vocabulary: self.vocabulary,
            coordinate_slots: self.coordinate_slots,
            totals: scaled(&self.totals, 1),
            toponym_totals: scaled(&self.toponym_totals, 1),
            document_counts: scaled(&self.document_counts, self.documents),
            word_counts: scaled(&self.word_counts, self.vocabulary),
            coordinate_counts: scaled(&self.coordinate_counts, self.coordinate_slots),
            means: self.means[..r]
                .iter()
                .map(|m| normalized(m).unwrap_or([0.0; 3]))
                .collect(),
        })
    }

    /// Averages of a single snapshot, for decoding without collected samples.
    pub fn snapshot(tables: &RegionTables<'_>) -> Option<PosteriorAverages> {
        let mut acc = Self::new(tables.documents, tables.vocabulary, tables.coordinate_slots);
        acc.record(tables);
        acc.average()
    }
}

fn accumulate(sums: &mut [f64], counts: &[u32]) {
    for (s, &c) in sums.iter_mut().zip(counts) {
        *s += f64::from(c);
    }
}

/// Posterior-averaged region tables with unit means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorAverages {
    pub samples: usize,
    /// Number of region rows (`currentR` at its largest).
    pub regions: usize,
    pub documents: usize,
    pub vocabulary: usize,
    pub coordinate_slots: usize,
    pub totals: Vec<f64>,
    pub toponym_totals: Vec<f64>,
    pub document_counts: Vec<f64>,
    pub word_counts: Vec<f64>,
    pub coordinate_counts: Vec<f64>,
    /// Unit mean direction per region; zero for regions without toponyms.
    pub means: Vec<Vec3>,
}

impl PosteriorAverages {
    #[inline]
    pub fn total(&self, region: usize) -> f64 {
        self.totals[region]
    }

    /// Averaged count of non-toponym tokens in `region`.
    #[inline]
    pub fn word_total(&self, region: usize) -> f64 {
        self.totals[region] - self.toponym_totals[region]
    }

    #[inline]
    pub fn document_count(&self, region: usize, document: usize) -> f64 {
        self.document_counts[region * self.documents + document]
    }

    #[inline]
    pub fn word_count(&self, region: usize, word: usize) -> f64 {
        self.word_counts[region * self.vocabulary + word]
    }

    #[inline]
    pub fn coordinate_count(&self, region: usize, slot: usize) -> f64 {
        self.coordinate_counts[region * self.coordinate_slots + slot]
    }

    #[inline]
    pub fn mean(&self, region: usize) -> &Vec3 {
        &self.means[region]
    }
}
