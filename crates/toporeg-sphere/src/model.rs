//! Collapsed Gibbs sampler for the CRP region model.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --initialize--> Initialized --sweep/train--> Sampling { sweep }
//!                                                               |
//!                                        Converged <------------+------------> Stopped
//!                                   (annealer exhausted)              (cancel flag set)
//! ```
//!
//! Every non-stopword token owns exactly one region at all times outside a
//! single update. An update removes the token's contribution, draws a new
//! assignment from the full conditional and adds it back before the next
//! token is touched.
//!
//! # Conditionals
//!
//! For a toponym with candidates `x_1..x_K` in document `d`, the flattened
//! distribution over `(region j, candidate k)` is
//!
//! ```text
//! (n_jd + alpha) * exp(kappa * dot(x_k, m_j / ||m_j||))     for live j
//! crpalpha * sinh(kappa) / kappa / K                        for a new region
//! ```
//!
//! For an ordinary word `w` the distribution over live regions is
//!
//! ```text
//! (n_jw + beta) / (n_j + beta * W) * (n_jd + alpha)
//! ```
//!
//! where `n_j` counts only the non-toponym tokens of region `j`.

use crate::config::{DecodeMode, ModelConfig};
use crate::density::SphericalDensity;
use crate::kappa::KappaEstimator;
use crate::output::{ModelOutput, TokenAssignment, TrainingSummary};
use crate::region::{RegionStore, TokenContribution};
use indexmap::IndexMap;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use toporeg_core::{CoordinateLexicon, Corpus, ModelError, Result, Vec3};
use toporeg_observers::{PosteriorAccumulator, PosteriorAverages, SweepObserver, SweepStats};
use toporeg_samplers::{
    sample_index, Annealer, AnnealingSchedule, CrpAllocator, MaximumPosteriorDecoder, RngKey,
    SimulatedAnnealer,
};
use tracing::{debug, info, warn};

/// Tolerance for incrementally maintained means, per assigned toponym.
pub const MEAN_TOLERANCE: f64 = 1e-9;

/// How a token takes part in sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Stopword,
    /// Ordinary word, or a toponym without usable coordinates.
    Word,
    /// `slot` is the global candidate slot of the first candidate.
    Toponym { slot: usize, candidates: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelPhase {
    Uninitialized,
    Initialized,
    Sampling { sweep: usize },
    Converged,
    Stopped,
}

/// Outcome of one token update.
#[derive(Debug, Clone, Copy, Default)]
struct TokenMove {
    moved: bool,
    opened: bool,
    recycled: usize,
}

/// The CRP region model over a borrowed corpus and lexicon.
pub struct SphericalRegionModel<'a> {
    corpus: &'a Corpus,
    lexicon: &'a CoordinateLexicon,
    config: ModelConfig,
    kinds: Vec<TokenKind>,
    regions: Vec<Option<u32>>,
    coordinates: Vec<Option<u32>>,
    store: RegionStore,
    posterior: PosteriorAccumulator,
    crp: CrpAllocator,
    density: SphericalDensity,
    kappa_estimator: KappaEstimator,
    /// `ln crpalpha_mod`
    log_new_region: f64,
    beta_w: f64,
    init_rng: ChaCha8Rng,
    rng: ChaCha8Rng,
    phase: ModelPhase,
    sweeps: usize,
    /// Scratch: flattened log-masses, then drawing weights.
    weights: Vec<f64>,
    /// Scratch: region id of each weight block.
    candidates: Vec<usize>,
}

impl<'a> SphericalRegionModel<'a> {
    /// Validates the configuration and classifies every token.
    ///
    /// # Errors
    ///
    /// - invalid hyperparameters or zero initial capacity
    /// - [`ModelError::EmptyCorpus`] when no token is sampleable
    ///
    /// Toponyms whose word has no lexicon entry are sampled as ordinary
    /// words and reported once through `warn!`.
    pub fn new(
        corpus: &'a Corpus,
        lexicon: &'a CoordinateLexicon,
        config: ModelConfig,
    ) -> Result<Self> {
        config.validate()?;
        if corpus.active_len() == 0 {
            return Err(ModelError::EmptyCorpus);
        }

        let kinds = classify_tokens(corpus, lexicon);
        let store = RegionStore::new(
            config.expected_regions,
            corpus.document_count(),
            corpus.vocabulary_size(),
            lexicon.total_candidates(),
        )?;
        let posterior = PosteriorAccumulator::new(
            corpus.document_count(),
            corpus.vocabulary_size(),
            lexicon.total_candidates(),
        );
        let density = SphericalDensity::new(config.hyper.kappa);
        let (init_key, sweep_key) = RngKey::new(config.seed).split_two();

        Ok(Self {
            corpus,
            lexicon,
            config,
            kinds,
            regions: vec![None; corpus.len()],
            coordinates: vec![None; corpus.len()],
            store,
            posterior,
            crp: CrpAllocator::new(config.hyper.crpalpha),
            density,
            kappa_estimator: KappaEstimator::new(config.kappa_proposal_sd),
            log_new_region: density.log_new_region_mass(config.hyper.crpalpha),
            beta_w: config.hyper.beta_w(corpus.vocabulary_size()),
            init_rng: init_key.to_rng(),
            rng: sweep_key.to_rng(),
            phase: ModelPhase::Uninitialized,
            sweeps: 0,
            weights: Vec::with_capacity(
                (config.expected_regions + 1) * lexicon.max_candidates().max(1),
            ),
            candidates: Vec::with_capacity(config.expected_regions),
        })
    }

    /// Seeds every non-stopword token with the CRP allocator.
    ///
    /// Toponyms go first, in corpus order, each picking one of its
    /// candidates uniformly; ordinary words follow. Every live region
    /// carries unit mass against `crpalpha` for a new one. Calling this on
    /// an already seeded model is a no-op.
    pub fn initialize(&mut self) -> Result<()> {
        if self.phase != ModelPhase::Uninitialized {
            debug!("initialize() called on a seeded model; ignoring");
            return Ok(());
        }

        for pass_toponyms in [true, false] {
            for i in 0..self.corpus.len() {
                let coordinate = match (self.kinds[i], pass_toponyms) {
                    (TokenKind::Toponym { candidates, .. }, true) => {
                        Some(self.init_rng.gen_range(0..candidates))
                    }
                    (TokenKind::Word, false) => None,
                    _ => continue,
                };
                let live = self.store.live_count();
                let seat = self.crp.seat(live, &mut self.init_rng);
                let region = if seat == live {
                    self.open_region()
                } else {
                    seat
                };
                self.assign(i, region, coordinate);
            }
        }

        self.rebuild_means();
        if self.store.needs_expansion() {
            self.grow_regions(self.store.expanded_capacity());
        }
        self.phase = ModelPhase::Initialized;
        info!(
            "Initialized {} tokens into {} regions (capacity {})",
            self.corpus.active_len(),
            self.store.live_count(),
            self.store.capacity()
        );
        Ok(())
    }

    /// One sequential Gibbs pass over every non-stopword token.
    ///
    /// Does not run the resizer check or posterior collection; [`Self::train`]
    /// does both after each sweep.
    pub fn sweep<A: Annealer + ?Sized>(&mut self, annealer: &A) -> Result<SweepStats> {
        if self.phase == ModelPhase::Uninitialized {
            return Err(ModelError::NotInitialized);
        }

        let mut stats = SweepStats {
            temperature: annealer.temperature(),
            ..Default::default()
        };
        for i in 0..self.corpus.len() {
            let step = match self.kinds[i] {
                TokenKind::Stopword => continue,
                TokenKind::Word => self.resample_word(i, annealer)?,
                TokenKind::Toponym { slot, candidates } => {
                    self.resample_toponym(i, slot, candidates, annealer)?
                }
            };
            stats.moved_tokens += usize::from(step.moved);
            stats.opened_regions += usize::from(step.opened);
            stats.recycled_tokens += step.recycled;
        }

        self.sweeps += 1;
        self.phase = ModelPhase::Sampling { sweep: self.sweeps };
        stats.sweep = self.sweeps;
        stats.live_regions = self.store.live_count();
        stats.current_regions = self.store.current_regions();
        stats.capacity = self.store.capacity();
        stats.kappa = self.density.kappa();
        Ok(stats)
    }

    /// Runs sweeps until the annealer is exhausted or `cancel` is set.
    ///
    /// After each sweep: the resizer check, then posterior collection when
    /// the annealer asks for it, then the optional kappa update during
    /// burn-in, then the observer. The cancel flag is only read between
    /// sweeps, so a cancelled model is always consistent.
    pub fn train<A: Annealer, O: SweepObserver>(
        &mut self,
        annealer: &mut A,
        cancel: Option<&AtomicBool>,
        mut observer: O,
    ) -> Result<TrainingSummary> {
        if self.phase == ModelPhase::Uninitialized {
            self.initialize()?;
        }
        let start = Instant::now();
        let mut stopped = false;

        while annealer.next_iter() {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                info!("Cancelled after {} sweeps", self.sweeps);
                stopped = true;
                break;
            }

            let mut stats = self.sweep(&*annealer)?;

            if self.store.needs_expansion() {
                self.grow_regions(self.store.expanded_capacity());
            }
            if annealer.is_collecting() {
                self.posterior.record(&self.store.tables());
                stats.collected = true;
            }
            if self.config.estimate_kappa && annealer.is_burning_in() {
                self.update_kappa();
            }

            stats.capacity = self.store.capacity();
            stats.kappa = self.density.kappa();
            debug!(
                "sweep {}: T={:.3} live={} moved={} opened={} recycled={}",
                stats.sweep,
                stats.temperature,
                stats.live_regions,
                stats.moved_tokens,
                stats.opened_regions,
                stats.recycled_tokens
            );
            observer.observe(&stats);
        }

        self.phase = if stopped {
            ModelPhase::Stopped
        } else {
            ModelPhase::Converged
        };
        let summary = self.summary(stopped, start.elapsed().as_secs_f64());
        info!(
            "Training {}: {} sweeps, {} samples, {} live regions, kappa={:.3}",
            if stopped { "stopped" } else { "finished" },
            summary.sweeps,
            summary.samples,
            summary.live_regions,
            summary.kappa
        );
        Ok(summary)
    }

    /// Assigns every token its region under the posterior-averaged tables
    /// without touching the live statistics.
    ///
    /// Falls back to a snapshot of the live tables when no sweep was
    /// collected. Stopwords decode to an empty assignment.
    pub fn decode(&mut self, mode: DecodeMode) -> Result<Vec<TokenAssignment>> {
        if self.phase == ModelPhase::Uninitialized {
            return Err(ModelError::NotInitialized);
        }
        let averages = self.averages()?;
        match mode {
            DecodeMode::MaxPosterior => {
                self.decode_with(&MaximumPosteriorDecoder::new(), &averages)
            }
            DecodeMode::Sample => {
                let single = SimulatedAnnealer::new(AnnealingSchedule::untempered(1, 0, 1))?;
                self.decode_with(&single, &averages)
            }
        }
    }

    fn decode_with<A: Annealer + ?Sized>(
        &mut self,
        annealer: &A,
        averages: &PosteriorAverages,
    ) -> Result<Vec<TokenAssignment>> {
        let alpha = self.config.hyper.alpha;
        let beta = self.config.hyper.beta;
        let kappa = self.density.kappa();
        let lexicon = self.lexicon;
        let occupied: Vec<usize> = (0..averages.regions)
            .filter(|&r| averages.total(r) > 0.0)
            .collect();

        let mut decoded = Vec::with_capacity(self.corpus.len());
        for i in 0..self.corpus.len() {
            let w = self.corpus.word(i);
            let d = self.corpus.document(i);
            self.weights.clear();
            let candidates = match self.kinds[i] {
                TokenKind::Stopword => {
                    decoded.push(TokenAssignment::default());
                    continue;
                }
                TokenKind::Word => {
                    for &j in &occupied {
                        self.weights.push(
                            (averages.word_count(j, w) + beta).ln()
                                - (averages.word_total(j) + self.beta_w).ln()
                                + (averages.document_count(j, d) + alpha).ln(),
                        );
                    }
                    1
                }
                TokenKind::Toponym { candidates, .. } => {
                    let points = lexicon.candidates(w);
                    for &j in &occupied {
                        let log_doc = (averages.document_count(j, d) + alpha).ln();
                        let mean = averages.mean(j);
                        for x in points {
                            self.weights
                                .push(log_doc + kappa * toporeg_core::dot(x, mean));
                        }
                    }
                    candidates
                }
            };

            let total = annealer.anneal(&mut self.weights);
            let assignment = sample_index(&self.weights, total, &mut self.rng).map(|pick| {
                TokenAssignment {
                    region: Some(occupied[pick / candidates] as u32),
                    coordinate: matches!(self.kinds[i], TokenKind::Toponym { .. })
                        .then_some((pick % candidates) as u32),
                }
            });
            decoded.push(assignment.unwrap_or_default());
        }
        Ok(decoded)
    }

    /// Recomputes every table from the token assignments and compares.
    ///
    /// Also checks conservation: region totals sum to the number of
    /// non-stopword tokens.
    pub fn check_consistency(&self) -> Result<()> {
        let mut expected = self.store.zeroed_like();
        for i in 0..self.corpus.len() {
            if self.kinds[i] == TokenKind::Stopword {
                continue;
            }
            let region = self.regions[i]
                .ok_or_else(|| ModelError::inconsistent(0, format!("token {i} is unassigned")))?
                as usize;
            if !self.store.is_live(region) {
                return Err(ModelError::inconsistent(
                    region,
                    format!("token {i} sits in a vacant region"),
                ));
            }
            expected.add(&self.contribution(i), region);
        }

        if let Some((region, detail)) = self.store.first_mismatch(&expected, MEAN_TOLERANCE) {
            return Err(ModelError::inconsistent(region, detail));
        }
        let held = self.store.total_tokens();
        if held != self.corpus.active_len() {
            return Err(ModelError::inconsistent(
                0,
                format!("regions hold {held} tokens, corpus has {}", self.corpus.active_len()),
            ));
        }
        Ok(())
    }

    fn resample_toponym<A: Annealer + ?Sized>(
        &mut self,
        token: usize,
        slot: usize,
        n: usize,
        annealer: &A,
    ) -> Result<TokenMove> {
        let donor = self.region_of(token)?;
        let contribution = self.contribution(token);
        self.store.remove(&contribution, donor)?;

        let w = self.corpus.word(token);
        let d = self.corpus.document(token);
        let points = self.lexicon.candidates(w);
        let alpha = self.config.hyper.alpha;

        self.candidates.clear();
        self.candidates.extend(self.store.live_regions());
        self.weights.clear();
        for &j in &self.candidates {
            let log_doc = (f64::from(self.store.document_count(j, d)) + alpha).ln();
            let mean = self.store.mean(j);
            let inverse_norm = toporeg_core::inverse_norm(mean);
            for x in points {
                self.weights
                    .push(log_doc + self.density.log_density_with(x, mean, inverse_norm));
            }
        }
        let log_new = self.log_new_region - (n as f64).ln();
        self.weights.extend(std::iter::repeat(log_new).take(n));

        let total = annealer.anneal(&mut self.weights);
        let pick = sample_index(&self.weights, total, &mut self.rng)
            .unwrap_or(self.weights.len() - 1);
        let (block, k) = (pick / n, pick % n);
        let opened = block == self.candidates.len();
        let region = if opened {
            self.open_region()
        } else {
            self.candidates[block]
        };

        self.store.add(
            &TokenContribution {
                word: w,
                document: d,
                coordinate: Some((slot + k, points[k])),
            },
            region,
        );
        self.regions[token] = Some(region as u32);
        self.coordinates[token] = Some(k as u32);

        let recycled = if region != donor
            && self.store.is_live(donor)
            && self.store.toponym_total(donor) == 0
        {
            self.recycle(donor, annealer)?
        } else {
            0
        };

        Ok(TokenMove {
            moved: region != donor,
            opened,
            recycled,
        })
    }

    fn resample_word<A: Annealer + ?Sized>(
        &mut self,
        token: usize,
        annealer: &A,
    ) -> Result<TokenMove> {
        let donor = self.region_of(token)?;
        let contribution = self.contribution(token);
        self.store.remove(&contribution, donor)?;

        self.fill_word_weights(contribution.word, contribution.document, None);
        let (region, opened) = if self.candidates.is_empty() {
            // the corpus has a single active token and it just left
            (self.open_region(), true)
        } else {
            let total = annealer.anneal(&mut self.weights);
            let pick = sample_index(&self.weights, total, &mut self.rng)
                .unwrap_or(self.candidates.len() - 1);
            (self.candidates[pick], false)
        };

        self.store.add(&contribution, region);
        self.regions[token] = Some(region as u32);
        Ok(TokenMove {
            moved: region != donor,
            opened,
            recycled: 0,
        })
    }

    /// Moves every remaining word token out of `donor`, which just lost its
    /// last toponym, so the id can be handed back to the allocator.
    ///
    /// Returns the number of tokens moved. Does nothing when `donor` is the
    /// only live region.
    fn recycle<A: Annealer + ?Sized>(&mut self, donor: usize, annealer: &A) -> Result<usize> {
        if !self.store.live_regions().any(|r| r != donor) {
            return Ok(0);
        }

        let mut moved = 0;
        for i in 0..self.corpus.len() {
            if self.regions[i] != Some(donor as u32) || self.kinds[i] != TokenKind::Word {
                continue;
            }
            let contribution = self.contribution(i);
            self.store.remove(&contribution, donor)?;
            self.fill_word_weights(contribution.word, contribution.document, Some(donor));
            let total = annealer.anneal(&mut self.weights);
            let pick = sample_index(&self.weights, total, &mut self.rng)
                .unwrap_or(self.candidates.len() - 1);
            let region = self.candidates[pick];
            self.store.add(&contribution, region);
            self.regions[i] = Some(region as u32);
            moved += 1;
        }

        debug!("Recycled region {}: moved {} word tokens", donor, moved);
        Ok(moved)
    }

    /// Log-masses of an ordinary word over the live regions, minus `exclude`.
    fn fill_word_weights(&mut self, word: usize, document: usize, exclude: Option<usize>) {
        let alpha = self.config.hyper.alpha;
        let beta = self.config.hyper.beta;
        self.candidates.clear();
        self.candidates
            .extend(self.store.live_regions().filter(|&r| Some(r) != exclude));
        self.weights.clear();
        for &j in &self.candidates {
            self.weights.push(
                (f64::from(self.store.word_count(j, word)) + beta).ln()
                    - (f64::from(self.store.word_total(j)) + self.beta_w).ln()
                    + (f64::from(self.store.document_count(j, document)) + alpha).ln(),
            );
        }
    }

    fn update_kappa(&mut self) {
        let kappa = self
            .kappa_estimator
            .step(self.density.kappa(), &self.store, &mut self.rng);
        if kappa != self.density.kappa() {
            self.density = SphericalDensity::new(kappa);
            self.log_new_region = self.density.log_new_region_mass(self.config.hyper.crpalpha);
        }
    }

    /// Opens a region, growing storage (and the posterior sums) if needed.
    fn open_region(&mut self) -> usize {
        if self.store.empty_regions().next().is_none()
            && self.store.current_regions() == self.store.capacity()
        {
            self.grow_regions(self.store.expanded_capacity());
        }
        self.store.open_region()
    }

    /// The single growth routine for every per-region table.
    fn grow_regions(&mut self, capacity: usize) {
        if self.store.expand_to(capacity) {
            self.posterior.resize_regions(capacity);
            info!(
                "Expanded region capacity to {} ({} regions instantiated)",
                capacity,
                self.store.current_regions()
            );
        }
    }

    fn assign(&mut self, token: usize, region: usize, coordinate: Option<usize>) {
        self.regions[token] = Some(region as u32);
        self.coordinates[token] = coordinate.map(|k| k as u32);
        let contribution = self.contribution(token);
        self.store.add(&contribution, region);
    }

    fn rebuild_means(&mut self) {
        self.store.clear_means();
        for i in 0..self.corpus.len() {
            if let (Some(region), Some((_, point))) =
                (self.regions[i], self.contribution(i).coordinate)
            {
                self.store.accumulate_mean(region as usize, &point);
            }
        }
    }

    fn region_of(&self, token: usize) -> Result<usize> {
        self.regions[token]
            .map(|r| r as usize)
            .ok_or_else(|| ModelError::inconsistent(0, format!("token {token} is unassigned")))
    }

    /// The token's current contribution, including its chosen coordinate.
    fn contribution(&self, token: usize) -> TokenContribution {
        let word = self.corpus.word(token);
        let coordinate = match (self.kinds[token], self.coordinates[token]) {
            (TokenKind::Toponym { slot, .. }, Some(k)) => {
                let k = k as usize;
                Some((slot + k, self.lexicon.candidates(word)[k]))
            }
            _ => None,
        };
        TokenContribution {
            word,
            document: self.corpus.document(token),
            coordinate,
        }
    }

    fn averages(&self) -> Result<PosteriorAverages> {
        match self.posterior.average() {
            Some(averages) => Ok(averages),
            None => PosteriorAccumulator::snapshot(&self.store.tables())
                .ok_or(ModelError::NotInitialized),
        }
    }

    fn summary(&self, stopped: bool, elapsed_secs: f64) -> TrainingSummary {
        TrainingSummary {
            sweeps: self.sweeps,
            samples: self.posterior.sample_count(),
            live_regions: self.store.live_count(),
            current_regions: self.store.current_regions(),
            capacity: self.store.capacity(),
            kappa: self.density.kappa(),
            stopped,
            elapsed_secs,
        }
    }

    /// Bundles the posterior tables with a training summary and decoded
    /// assignments.
    pub fn output(
        &self,
        summary: TrainingSummary,
        assignments: Vec<TokenAssignment>,
    ) -> Result<ModelOutput> {
        ModelOutput::from_model(self, summary, assignments)
    }

    pub fn phase(&self) -> ModelPhase {
        self.phase
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn corpus(&self) -> &'a Corpus {
        self.corpus
    }

    pub fn lexicon(&self) -> &'a CoordinateLexicon {
        self.lexicon
    }

    pub fn store(&self) -> &RegionStore {
        &self.store
    }

    pub fn posterior(&self) -> &PosteriorAccumulator {
        &self.posterior
    }

    /// Posterior averages, or a snapshot of the live tables before any
    /// sample was collected.
    pub fn posterior_averages(&self) -> Result<PosteriorAverages> {
        self.averages()
    }

    pub fn kappa(&self) -> f64 {
        self.density.kappa()
    }

    pub fn token_kind(&self, token: usize) -> TokenKind {
        self.kinds[token]
    }

    /// Current `(region, coordinate)` of every token.
    pub fn assignments(&self) -> Vec<TokenAssignment> {
        self.regions
            .iter()
            .zip(&self.coordinates)
            .map(|(&region, &coordinate)| TokenAssignment { region, coordinate })
            .collect()
    }

    /// The point currently chosen for a toponym token.
    pub fn resolved_point(&self, token: usize) -> Option<Vec3> {
        self.contribution(token).coordinate.map(|(_, p)| p)
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }
}

/// Classifies tokens; toponyms without candidates degrade to words.
fn classify_tokens(corpus: &Corpus, lexicon: &CoordinateLexicon) -> Vec<TokenKind> {
    let mut degenerate: IndexMap<usize, usize> = IndexMap::new();
    let kinds: Vec<TokenKind> = (0..corpus.len())
        .map(|i| {
            if corpus.is_stopword(i) {
                return TokenKind::Stopword;
            }
            if !corpus.is_toponym(i) {
                return TokenKind::Word;
            }
            let w = corpus.word(i);
            match lexicon.candidate_count(w) {
                0 => {
                    *degenerate.entry(w).or_default() += 1;
                    TokenKind::Word
                }
                candidates => TokenKind::Toponym {
                    slot: lexicon.offset(w),
                    candidates,
                },
            }
        })
        .collect();

    if !degenerate.is_empty() {
        warn!(
            "{} toponym tokens across {} word ids have no usable coordinates; treating them as ordinary words",
            degenerate.values().sum::<usize>(),
            degenerate.len()
        );
        for (word, count) in &degenerate {
            debug!("toponym word {} without coordinates: {} tokens", word, count);
        }
    }
    kinds
}
