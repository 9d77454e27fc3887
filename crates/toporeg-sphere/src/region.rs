//! Region store: per-region sufficient statistics with slot recycling.
//!
//! Tables are flat and region-major, so growing the capacity appends
//! zero-filled rows and never moves existing data:
//!
//! | Table | Shape |
//! |-------|-------|
//! | totals, toponym totals, means | `[capacity]` |
//! | document counts | `[capacity * D]` |
//! | word counts | `[capacity * W]` |
//! | coordinate counts | `[capacity * C]`, `C` = global candidate slots |
//!
//! Region ids below `current_regions()` have been instantiated at least
//! once; the vacant ones among them sit in an ordered set and are reused
//! lowest-first by [`RegionStore::open_region`].

use std::collections::BTreeSet;
use toporeg_core::{axpy, norm, ModelError, Result, Vec3};
use toporeg_observers::RegionTables;

/// Capacity grows by this fraction, and expansion triggers once fewer than
/// `EXPANSION_FACTOR / (1 + EXPANSION_FACTOR)` of the slots remain free.
pub const EXPANSION_FACTOR: f64 = 0.25;

/// What one token adds to (or removes from) a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenContribution {
    pub word: usize,
    pub document: usize,
    /// Global candidate slot and its point, for toponyms.
    pub coordinate: Option<(usize, Vec3)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionStore {
    capacity: usize,
    current: usize,
    empty: BTreeSet<usize>,
    vacant: Vec<bool>,
    documents: usize,
    vocabulary: usize,
    coordinate_slots: usize,
    totals: Vec<u32>,
    toponym_totals: Vec<u32>,
    document_counts: Vec<u32>,
    word_counts: Vec<u32>,
    coordinate_counts: Vec<u32>,
    means: Vec<Vec3>,
}

impl RegionStore {
    pub fn new(
        capacity: usize,
        documents: usize,
        vocabulary: usize,
        coordinate_slots: usize,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(ModelError::InvalidCapacity(capacity));
        }
        Ok(Self {
            capacity,
            current: 0,
            empty: BTreeSet::new(),
            vacant: vec![false; capacity],
            documents,
            vocabulary,
            coordinate_slots,
            totals: vec![0; capacity],
            toponym_totals: vec![0; capacity],
            document_counts: vec![0; capacity * documents],
            word_counts: vec![0; capacity * vocabulary],
            coordinate_counts: vec![0; capacity * coordinate_slots],
            means: vec![[0.0; 3]; capacity],
        })
    }

    /// A store with the same layout and region ids but all tables zeroed.
    pub fn zeroed_like(&self) -> Self {
        let mut fresh = Self {
            capacity: self.capacity,
            current: self.current,
            empty: self.empty.clone(),
            vacant: self.vacant.clone(),
            documents: self.documents,
            vocabulary: self.vocabulary,
            coordinate_slots: self.coordinate_slots,
            totals: Vec::new(),
            toponym_totals: Vec::new(),
            document_counts: Vec::new(),
            word_counts: Vec::new(),
            coordinate_counts: Vec::new(),
            means: Vec::new(),
        };
        fresh.totals.resize(self.totals.len(), 0);
        fresh.toponym_totals.resize(self.toponym_totals.len(), 0);
        fresh.document_counts.resize(self.document_counts.len(), 0);
        fresh.word_counts.resize(self.word_counts.len(), 0);
        fresh.coordinate_counts.resize(self.coordinate_counts.len(), 0);
        fresh.means.resize(self.means.len(), [0.0; 3]);
        fresh
    }

    /// Allocated region slots (`expectedR`).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Region ids ever instantiated (`currentR`).
    pub fn current_regions(&self) -> usize {
        self.current
    }

    pub fn live_count(&self) -> usize {
        self.current - self.empty.len()
    }

    #[inline]
    pub fn is_live(&self, region: usize) -> bool {
        region < self.current && !self.vacant[region]
    }

    /// Live region ids in increasing order.
    pub fn live_regions(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.current).filter(move |&r| !self.vacant[r])
    }

    /// Vacant, reusable region ids in increasing order.
    pub fn empty_regions(&self) -> impl Iterator<Item = usize> + '_ {
        self.empty.iter().copied()
    }

    /// Allocates a region slot with zeroed counts and mean.
    ///
    /// Reuses the smallest vacant id if there is one, otherwise instantiates
    /// id `current_regions()`, growing storage first when capacity is
    /// exhausted.
    pub fn open_region(&mut self) -> usize {
        if let Some(region) = self.empty.pop_first() {
            self.vacant[region] = false;
            self.means[region] = [0.0; 3];
            return region;
        }
        if self.current == self.capacity {
            self.expand_to(self.expanded_capacity());
        }
        let region = self.current;
        self.current += 1;
        region
    }

    /// Adds a token's contribution to `region`.
    pub fn add(&mut self, token: &TokenContribution, region: usize) {
        debug_assert!(self.is_live(region), "add to non-live region {region}");
        self.totals[region] += 1;
        self.document_counts[region * self.documents + token.document] += 1;
        self.word_counts[region * self.vocabulary + token.word] += 1;
        if let Some((slot, point)) = token.coordinate {
            self.toponym_totals[region] += 1;
            self.coordinate_counts[region * self.coordinate_slots + slot] += 1;
            axpy(1.0, &point, &mut self.means[region]);
        }
    }

    /// Removes a token's contribution from `region`.
    ///
    /// Returns `true` when the region became empty and was released for
    /// reuse. A count that would go negative means the caller removed a
    /// token that was never added, which is reported rather than clamped.
    pub fn remove(&mut self, token: &TokenContribution, region: usize) -> Result<bool> {
        if !self.is_live(region) {
            return Err(ModelError::inconsistent(region, "remove from a non-live region"));
        }
        let d = region * self.documents + token.document;
        let w = region * self.vocabulary + token.word;
        if self.totals[region] == 0 || self.document_counts[d] == 0 || self.word_counts[w] == 0 {
            return Err(ModelError::inconsistent(
                region,
                format!(
                    "removing word {} of document {} that the region does not hold",
                    token.word, token.document
                ),
            ));
        }

        if let Some((slot, point)) = token.coordinate {
            let c = region * self.coordinate_slots + slot;
            if self.toponym_totals[region] == 0 || self.coordinate_counts[c] == 0 {
                return Err(ModelError::inconsistent(
                    region,
                    format!("removing coordinate slot {slot} that the region does not hold"),
                ));
            }
            self.toponym_totals[region] -= 1;
            self.coordinate_counts[c] -= 1;
            if self.toponym_totals[region] == 0 {
                self.means[region] = [0.0; 3];
            } else {
                axpy(-1.0, &point, &mut self.means[region]);
            }
        }

        self.totals[region] -= 1;
        self.document_counts[d] -= 1;
        self.word_counts[w] -= 1;

        if self.totals[region] == 0 {
            self.release(region);
            return Ok(true);
        }
        Ok(false)
    }

    fn release(&mut self, region: usize) {
        self.means[region] = [0.0; 3];
        self.vacant[region] = true;
        self.empty.insert(region);
    }

    /// True when fewer than 20% of the slots remain free.
    pub fn needs_expansion(&self) -> bool {
        let free = (self.capacity - self.current) as f64;
        free < EXPANSION_FACTOR / (1.0 + EXPANSION_FACTOR) * self.capacity as f64
    }

    /// `ceil(capacity * (1 + EXPANSION_FACTOR))`
    pub fn expanded_capacity(&self) -> usize {
        ((self.capacity as f64) * (1.0 + EXPANSION_FACTOR)).ceil() as usize
    }

    /// Grows every table to `capacity` regions, keeping all ids and data.
    ///
    /// Returns `false` (and changes nothing) when the store is already at
    /// least that large.
    pub fn expand_to(&mut self, capacity: usize) -> bool {
        if capacity <= self.capacity {
            return false;
        }
        self.vacant.resize(capacity, false);
        self.totals.resize(capacity, 0);
        self.toponym_totals.resize(capacity, 0);
        self.document_counts.resize(capacity * self.documents, 0);
        self.word_counts.resize(capacity * self.vocabulary, 0);
        self.coordinate_counts
            .resize(capacity * self.coordinate_slots, 0);
        self.means.resize(capacity, [0.0; 3]);
        self.capacity = capacity;
        true
    }

    #[inline]
    pub fn total(&self, region: usize) -> u32 {
        self.totals[region]
    }

    #[inline]
    pub fn toponym_total(&self, region: usize) -> u32 {
        self.toponym_totals[region]
    }

    /// Tokens in `region` that are not toponyms.
    #[inline]
    pub fn word_total(&self, region: usize) -> u32 {
        self.totals[region] - self.toponym_totals[region]
    }

    #[inline]
    pub fn document_count(&self, region: usize, document: usize) -> u32 {
        self.document_counts[region * self.documents + document]
    }

    #[inline]
    pub fn word_count(&self, region: usize, word: usize) -> u32 {
        self.word_counts[region * self.vocabulary + word]
    }

    #[inline]
    pub fn coordinate_count(&self, region: usize, slot: usize) -> u32 {
        self.coordinate_counts[region * self.coordinate_slots + slot]
    }

    /// Unnormalized coordinate sum of `region`.
    #[inline]
    pub fn mean(&self, region: usize) -> &Vec3 {
        &self.means[region]
    }

    /// Sum of all region totals.
    pub fn total_tokens(&self) -> usize {
        self.totals.iter().map(|&t| t as usize).sum()
    }

    /// Zeroes every mean so they can be rebuilt with [`Self::accumulate_mean`].
    pub fn clear_means(&mut self) {
        self.means.iter_mut().for_each(|m| *m = [0.0; 3]);
    }

    pub fn accumulate_mean(&mut self, region: usize, point: &Vec3) {
        axpy(1.0, point, &mut self.means[region]);
    }

    /// First region whose tables differ from `expected`.
    ///
    /// Counts must match exactly; means within `tolerance` per component,
    /// scaled by the region's toponym count.
    pub fn first_mismatch(&self, expected: &RegionStore, tolerance: f64) -> Option<(usize, String)> {
        if self.capacity != expected.capacity || self.current != expected.current {
            return Some((0, "layout differs".to_string()));
        }
        for r in 0..self.current {
            if self.totals[r] != expected.totals[r] {
                return Some((
                    r,
                    format!("total {} != recount {}", self.totals[r], expected.totals[r]),
                ));
            }
            if self.toponym_totals[r] != expected.toponym_totals[r] {
                return Some((r, "toponym total differs from recount".to_string()));
            }
            let rows = [
                (&self.document_counts, &expected.document_counts, self.documents, "document"),
                (&self.word_counts, &expected.word_counts, self.vocabulary, "word"),
                (
                    &self.coordinate_counts,
                    &expected.coordinate_counts,
                    self.coordinate_slots,
                    "coordinate",
                ),
            ];
            for (have, want, stride, name) in rows {
                if have[r * stride..(r + 1) * stride] != want[r * stride..(r + 1) * stride] {
                    return Some((r, format!("{name} counts differ from recount")));
                }
            }
            let scale = f64::from(self.toponym_totals[r].max(1));
            let diff = [
                self.means[r][0] - expected.means[r][0],
                self.means[r][1] - expected.means[r][1],
                self.means[r][2] - expected.means[r][2],
            ];
            if norm(&diff) > tolerance * scale {
                return Some((r, format!("mean drifted by {:.3e}", norm(&diff))));
            }
        }
        None
    }

    /// Borrowed view for observers.
    pub fn tables(&self) -> RegionTables<'_> {
        RegionTables {
            capacity: self.capacity,
            current_regions: self.current,
            documents: self.documents,
            vocabulary: self.vocabulary,
            coordinate_slots: self.coordinate_slots,
            totals: &self.totals,
            toponym_totals: &self.toponym_totals,
            document_counts: &self.document_counts,
            word_counts: &self.word_counts,
            coordinate_counts: &self.coordinate_counts,
            means: &self.means,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn toponym(word: usize, document: usize, slot: usize, point: Vec3) -> TokenContribution {
        TokenContribution {
            word,
            document,
            coordinate: Some((slot, point)),
        }
    }

    fn word(word: usize, document: usize) -> TokenContribution {
        TokenContribution {
            word,
            document,
            coordinate: None,
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(
            RegionStore::new(0, 1, 1, 1).unwrap_err(),
            ModelError::InvalidCapacity(0)
        );
    }

    #[test]
    fn test_remove_then_readd_is_identity() {
        let mut store = RegionStore::new(4, 2, 3, 2).unwrap();
        let r = store.open_region();
        let a = toponym(0, 0, 1, [0.6, 0.8, 0.0]);
        let b = toponym(0, 1, 0, [0.0, 0.0, 1.0]);
        store.add(&a, r);
        store.add(&b, r);
        store.add(&word(2, 1), r);
        let before = store.clone();

        assert!(!store.remove(&a, r).unwrap());
        store.add(&a, r);

        assert_eq!(store.totals, before.totals);
        assert_eq!(store.document_counts, before.document_counts);
        assert_eq!(store.word_counts, before.word_counts);
        assert_eq!(store.coordinate_counts, before.coordinate_counts);
        for i in 0..3 {
            assert_abs_diff_eq!(store.mean(r)[i], before.mean(r)[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_emptied_region_is_released_and_reused() {
        let mut store = RegionStore::new(4, 1, 1, 1).unwrap();
        let r0 = store.open_region();
        let r1 = store.open_region();
        let t = toponym(0, 0, 0, [1.0, 0.0, 0.0]);
        store.add(&t, r0);
        store.add(&t, r1);

        assert!(store.remove(&t, r0).unwrap(), "last token releases the region");
        assert!(!store.is_live(r0));
        assert_eq!(store.live_count(), 1);
        assert_eq!(store.empty_regions().collect::<Vec<_>>(), vec![r0]);
        assert_eq!(store.mean(r0), &[0.0; 3]);

        assert_eq!(store.open_region(), r0, "vacant id is reused first");
        assert_eq!(store.current_regions(), 2, "reuse does not instantiate");
        assert_eq!(store.open_region(), 2);
    }

    #[test]
    fn test_remove_unheld_token_is_error() {
        let mut store = RegionStore::new(2, 2, 2, 1).unwrap();
        let r = store.open_region();
        store.add(&word(0, 0), r);
        let err = store.remove(&word(1, 0), r).unwrap_err();
        assert!(matches!(err, ModelError::InconsistentCounts { region: 0, .. }));
        assert_eq!(store.total(r), 1, "failed remove leaves counts untouched");
    }

    #[test]
    fn test_last_toponym_leaving_zeroes_mean() {
        let mut store = RegionStore::new(2, 1, 2, 1).unwrap();
        let r = store.open_region();
        let t = toponym(0, 0, 0, [0.3, 0.4, 0.5]);
        store.add(&t, r);
        store.add(&word(1, 0), r);
        assert!(!store.remove(&t, r).unwrap());
        assert_eq!(store.toponym_total(r), 0);
        assert_eq!(store.mean(r), &[0.0; 3]);
        assert!(store.is_live(r));
    }

    #[test]
    fn test_expansion_threshold() {
        let mut store = RegionStore::new(10, 1, 1, 1).unwrap();
        for _ in 0..8 {
            store.open_region();
        }
        assert!(!store.needs_expansion(), "2 of 10 free is exactly 20%");
        store.open_region();
        assert!(store.needs_expansion());
        assert_eq!(store.expanded_capacity(), 13);
    }

    #[test]
    fn test_expand_preserves_data() {
        let mut store = RegionStore::new(2, 2, 2, 1).unwrap();
        let r0 = store.open_region();
        let r1 = store.open_region();
        store.add(&toponym(1, 1, 0, [0.0, 1.0, 0.0]), r1);
        store.add(&word(0, 0), r0);

        let r2 = store.open_region();
        assert_eq!(r2, 2);
        assert_eq!(store.capacity(), 3, "ceil(2 * 1.25)");
        assert_eq!(store.document_count(r1, 1), 1);
        assert_eq!(store.word_count(r0, 0), 1);
        assert_eq!(store.coordinate_count(r1, 0), 1);
        assert_eq!(store.mean(r1), &[0.0, 1.0, 0.0]);
        assert_eq!(store.total(r2), 0);
    }

    #[test]
    fn test_resize_is_idempotent_when_sufficient() {
        let mut store = RegionStore::new(8, 3, 3, 2).unwrap();
        let r = store.open_region();
        store.add(&toponym(1, 2, 1, [0.0, 0.0, 1.0]), r);
        let before = store.clone();
        assert!(!store.expand_to(8));
        assert!(!store.expand_to(4));
        assert_eq!(store, before);
    }

    #[test]
    fn test_first_mismatch_reports_region() {
        let mut store = RegionStore::new(2, 1, 1, 1).unwrap();
        let r = store.open_region();
        store.add(&word(0, 0), r);
        let expected = store.zeroed_like();
        let (region, detail) = store.first_mismatch(&expected, 1e-9).unwrap();
        assert_eq!(region, r);
        assert!(detail.contains("total"));
        assert!(store.first_mismatch(&store.clone(), 1e-9).is_none());
    }
}
