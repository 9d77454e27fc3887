//! Coordinate lexicon: candidate points for every toponym word id.
//!
//! Candidates are stored in one flat buffer with an offset table, so a
//! `(word, candidate)` pair maps to a single global slot. Region tables use
//! that slot as the column index for toponym-coordinate counts.

use crate::error::{ModelError, Result};
use crate::geometry::{geographic_to_cartesian, Vec3};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Gazetteer marker for "no known location".
pub const NULL_LONGITUDE_SENTINEL: f64 = 9999.99;

/// A geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// True for the gazetteer sentinel and for NaN components.
    pub fn is_null(&self) -> bool {
        self.longitude.is_nan()
            || self.latitude.is_nan()
            || (self.longitude - NULL_LONGITUDE_SENTINEL).abs() < 1e-6
    }

    fn validate(&self, word_id: usize) -> Result<()> {
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ModelError::malformed(
                word_id,
                format!("longitude {} outside [-180, 180]", self.longitude),
            ));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ModelError::malformed(
                word_id,
                format!("latitude {} outside [-90, 90]", self.latitude),
            ));
        }
        Ok(())
    }
}

/// Read-only map from toponym word id to candidate unit vectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateLexicon {
    /// `offsets[w]..offsets[w + 1]` indexes `points` for word `w`.
    offsets: Vec<usize>,
    points: Vec<Vec3>,
    max_candidates: usize,
    filtered: usize,
}

impl CoordinateLexicon {
    /// Builds the lexicon from geographic records keyed by word id.
    ///
    /// Null-sentinel and NaN candidates are dropped; any other coordinate
    /// outside the valid range is a [`ModelError::MalformedCoordinate`].
    pub fn from_records(records: &IndexMap<u32, Vec<GeoPoint>>) -> Result<Self> {
        let words = records.keys().map(|&w| w as usize + 1).max().unwrap_or(0);
        let mut per_word: Vec<Vec<Vec3>> = vec![Vec::new(); words];
        let mut filtered = 0;

        for (&word, candidates) in records {
            let slot = &mut per_word[word as usize];
            slot.clear();
            for p in candidates {
                if p.is_null() {
                    filtered += 1;
                    continue;
                }
                p.validate(word as usize)?;
                slot.push(geographic_to_cartesian(p.longitude, p.latitude));
            }
        }

        if filtered > 0 {
            debug!("Dropped {} null coordinate candidates", filtered);
        }

        let mut lexicon = Self::from_cartesian(per_word);
        lexicon.filtered = filtered;
        Ok(lexicon)
    }

    /// Builds the lexicon directly from unit vectors, indexed by word id.
    pub fn from_cartesian(per_word: Vec<Vec<Vec3>>) -> Self {
        let mut offsets = Vec::with_capacity(per_word.len() + 1);
        let mut points = Vec::with_capacity(per_word.iter().map(Vec::len).sum());
        let mut max_candidates = 0;
        offsets.push(0);
        for candidates in per_word {
            max_candidates = max_candidates.max(candidates.len());
            points.extend(candidates);
            offsets.push(points.len());
        }
        Self {
            offsets,
            points,
            max_candidates,
            filtered: 0,
        }
    }

    /// Candidate points of `word`; empty for unknown words.
    #[inline]
    pub fn candidates(&self, word: usize) -> &[Vec3] {
        if word + 1 >= self.offsets.len() {
            return &[];
        }
        &self.points[self.offsets[word]..self.offsets[word + 1]]
    }

    #[inline]
    pub fn candidate_count(&self, word: usize) -> usize {
        self.candidates(word).len()
    }

    /// Global slot of the first candidate of `word`.
    #[inline]
    pub fn offset(&self, word: usize) -> usize {
        self.offsets
            .get(word)
            .copied()
            .unwrap_or(self.points.len())
    }

    /// Number of global candidate slots across all toponyms.
    pub fn total_candidates(&self) -> usize {
        self.points.len()
    }

    /// Largest candidate list (`maxCoord`).
    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    /// Number of word ids covered by the offset table.
    pub fn word_span(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// How many candidates were dropped as null coordinates.
    pub fn filtered_candidates(&self) -> usize {
        self.filtered
    }
}
