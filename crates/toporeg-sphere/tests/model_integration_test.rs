//! End-to-end tests of the region model on small synthetic corpora.
//!
//! Every run is seeded, so each test is deterministic.

use std::sync::atomic::{AtomicBool, Ordering};
use toporeg_core::{geographic_to_cartesian, CoordinateLexicon, Corpus, ModelError, Vec3};
use toporeg_observers::{SweepObserver, SweepStats, SweepTrace};
use toporeg_samplers::{AnnealingSchedule, MaximumPosteriorDecoder, SimulatedAnnealer};
use toporeg_sphere::{DecodeMode, ModelConfig, ModelPhase, SphericalRegionModel, TokenKind};

const SPRINGFIELD: u32 = 0;
const CHICAGO: u32 = 1;
const PEORIA: u32 = 2;
const BERLIN: u32 = 3;
const STOPWORD: u32 = 99;

fn springfield_il() -> Vec3 {
    geographic_to_cartesian(-89.65, 39.80)
}

fn springfield_antipode() -> Vec3 {
    geographic_to_cartesian(90.35, -39.80)
}

/// Candidates for words 0..=3; word ids above 3 are ordinary words.
fn illinois_lexicon() -> CoordinateLexicon {
    CoordinateLexicon::from_cartesian(vec![
        vec![springfield_il(), springfield_antipode()],
        vec![geographic_to_cartesian(-87.63, 41.88)],
        vec![geographic_to_cartesian(-89.59, 40.69)],
        vec![geographic_to_cartesian(13.40, 52.52)],
    ])
}

/// Documents alternate between Illinois and Berlin toponyms, each with a few
/// topical words and one stopword.
fn mixed_corpus(documents: u32) -> Corpus {
    let (mut words, mut docs, mut toponyms, mut stops) = (vec![], vec![], vec![], vec![]);
    let mut push = |w: u32, d: u32, top: bool, stop: bool| {
        words.push(w);
        docs.push(d);
        toponyms.push(top);
        stops.push(stop);
    };
    for d in 0..documents {
        if d % 2 == 0 {
            push(SPRINGFIELD, d, true, false);
            push(CHICAGO, d, true, false);
            push(10, d, false, false);
            push(11, d, false, false);
        } else {
            push(BERLIN, d, true, false);
            push(BERLIN, d, true, false);
            push(20, d, false, false);
            push(21, d, false, false);
        }
        push(STOPWORD, d, false, true);
        push(12 + d % 3, d, false, false);
    }
    Corpus::new(words, docs, toponyms, stops).expect("valid corpus")
}

fn config(seed: u64) -> ModelConfig {
    ModelConfig::default()
        .with_seed(seed)
        .with_expected_regions(16)
}

fn untempered(burn_in: usize, samples: usize, lag: usize) -> SimulatedAnnealer {
    SimulatedAnnealer::new(AnnealingSchedule::untempered(burn_in, samples, lag)).expect("valid")
}

#[test]
fn test_springfield_seeds_a_single_region() {
    let corpus = Corpus::new(
        vec![SPRINGFIELD; 3],
        vec![0, 1, 2],
        vec![true; 3],
        vec![false; 3],
    )
    .expect("valid corpus");
    let lexicon = illinois_lexicon();
    let mut model =
        SphericalRegionModel::new(&corpus, &lexicon, config(5).with_crpalpha(0.0)).unwrap();
    model.initialize().unwrap();

    let store = model.store();
    assert_eq!(store.live_count(), 1, "zero concentration never opens a second region");
    assert_eq!(store.current_regions(), 1);
    assert_eq!(store.total(0), 3);
    let doc_sum: u32 = (0..3).map(|d| store.document_count(0, d)).sum();
    let word_sum: u32 = (0..corpus.vocabulary_size())
        .map(|w| store.word_count(0, w))
        .sum();
    assert_eq!(doc_sum, 3);
    assert_eq!(word_sum, 3);
    assert_eq!(store.toponym_total(0), 3);
    assert!(model
        .assignments()
        .iter()
        .all(|a| a.region == Some(0) && a.coordinate.is_some()));
    model.check_consistency().unwrap();
}

#[test]
fn test_zero_concentration_never_opens_regions() {
    let corpus = mixed_corpus(12);
    let lexicon = illinois_lexicon();
    let mut model =
        SphericalRegionModel::new(&corpus, &lexicon, config(9).with_crpalpha(0.0)).unwrap();
    model.initialize().unwrap();
    let regions_before = model.store().current_regions();

    let mut trace = SweepTrace::default();
    model.train(&mut untempered(20, 5, 2), None, &mut trace).unwrap();

    assert_eq!(model.store().current_regions(), regions_before);
    assert!(
        trace.records().iter().all(|s| s.opened_regions == 0),
        "no sweep may open a region"
    );
}

#[test]
fn test_conservation_and_mean_consistency_every_sweep() {
    let corpus = mixed_corpus(20);
    let lexicon = illinois_lexicon();
    let mut model = SphericalRegionModel::new(&corpus, &lexicon, config(11)).unwrap();
    model.initialize().unwrap();
    model.check_consistency().unwrap();

    let annealer = MaximumPosteriorDecoder::new();
    let sampler = untempered(1, 0, 1);
    for sweep in 0..15 {
        if sweep % 5 == 4 {
            // a cold sweep stresses the argmax path too
            model.sweep(&annealer).unwrap();
        } else {
            model.sweep(&sampler).unwrap();
        }
        assert_eq!(
            model.store().total_tokens(),
            corpus.active_len(),
            "tokens lost or duplicated in sweep {sweep}"
        );
        model
            .check_consistency()
            .unwrap_or_else(|e| panic!("sweep {sweep}: {e}"));
    }
}

#[test]
fn test_same_seed_same_assignments() {
    let corpus = mixed_corpus(16);
    let lexicon = illinois_lexicon();
    let run = |seed| {
        let mut model = SphericalRegionModel::new(&corpus, &lexicon, config(seed)).unwrap();
        model.initialize().unwrap();
        model.sweep(&untempered(1, 0, 1)).unwrap();
        model.assignments()
    };
    assert_eq!(run(42), run(42));
    assert_ne!(run(42), run(43), "different seeds should diverge on this corpus");
}

#[test]
fn test_instantiated_regions_never_decrease() {
    let corpus = mixed_corpus(30);
    let lexicon = illinois_lexicon();
    let mut model = SphericalRegionModel::new(
        &corpus,
        &lexicon,
        config(3).with_crpalpha(50.0).with_expected_regions(2),
    )
    .unwrap();
    let mut trace = SweepTrace::default();
    model.train(&mut untempered(10, 3, 1), None, &mut trace).unwrap();

    let current: Vec<usize> = trace.records().iter().map(|s| s.current_regions).collect();
    assert!(
        current.windows(2).all(|w| w[0] <= w[1]),
        "currentR decreased: {current:?}"
    );
    for stats in trace.records() {
        assert!(stats.live_regions <= stats.current_regions);
        assert!(stats.current_regions <= stats.capacity);
    }
    assert!(model.store().capacity() > 2, "capacity grew from 2");
    assert!(
        model.posterior().capacity() >= model.store().current_regions(),
        "posterior sums grow with the store"
    );
    model.check_consistency().unwrap();
}

#[test]
fn test_recycling_keeps_counts_consistent() {
    // many small regions at seeding, so toponyms leave word-holding regions
    let corpus = mixed_corpus(40);
    let lexicon = illinois_lexicon();
    let mut model =
        SphericalRegionModel::new(&corpus, &lexicon, config(17).with_crpalpha(50.0)).unwrap();
    model.initialize().unwrap();

    let mut recycled = 0;
    for _ in 0..10 {
        let stats = model.sweep(&untempered(1, 0, 1)).unwrap();
        recycled += stats.recycled_tokens;
        model.check_consistency().unwrap();
    }
    assert!(recycled > 0, "expected at least one recycled region");
}

#[test]
fn test_decode_resolves_ambiguous_toponym() {
    let corpus = mixed_corpus(24);
    let lexicon = illinois_lexicon();
    let mut model =
        SphericalRegionModel::new(&corpus, &lexicon, config(21).with_crpalpha(1.0)).unwrap();
    let mut annealer = SimulatedAnnealer::new(AnnealingSchedule::new(1.5, 1.0, 0.25, 5, 10, 2))
        .expect("valid schedule");
    let summary = model.train(&mut annealer, None, ()).unwrap();
    assert_eq!(summary.samples, 10);
    assert!(!summary.stopped);
    assert_eq!(model.phase(), ModelPhase::Converged);

    let decoded = model.decode(DecodeMode::MaxPosterior).unwrap();
    assert_eq!(decoded, model.decode(DecodeMode::MaxPosterior).unwrap());
    for (i, a) in decoded.iter().enumerate() {
        if corpus.is_stopword(i) {
            assert_eq!(a.region, None);
            assert_eq!(a.coordinate, None);
            continue;
        }
        assert!(a.region.is_some(), "token {i} left unassigned");
        if corpus.word(i) == SPRINGFIELD as usize {
            assert_eq!(a.coordinate, Some(0), "Springfield should resolve to Illinois");
        }
    }
}

#[test]
fn test_decode_does_not_touch_live_tables() {
    let corpus = mixed_corpus(10);
    let lexicon = illinois_lexicon();
    let mut model = SphericalRegionModel::new(&corpus, &lexicon, config(2)).unwrap();
    model.train(&mut untempered(3, 0, 1), None, ()).unwrap();
    assert_eq!(model.posterior().sample_count(), 0);

    let before = model.store().clone();
    let assignments = model.assignments();
    let sampled = model.decode(DecodeMode::Sample).unwrap();
    assert_eq!(model.store(), &before);
    assert_eq!(model.assignments(), assignments);
    assert_eq!(sampled.len(), corpus.len());
    assert!(sampled
        .iter()
        .enumerate()
        .all(|(i, a)| corpus.is_stopword(i) || a.region.is_some()));
}

struct CancelAfter<'a> {
    sweeps: usize,
    flag: &'a AtomicBool,
}

impl SweepObserver for CancelAfter<'_> {
    fn observe(&mut self, stats: &SweepStats) {
        if stats.sweep >= self.sweeps {
            self.flag.store(true, Ordering::Relaxed);
        }
    }
}

#[test]
fn test_cancel_between_sweeps() {
    let corpus = mixed_corpus(10);
    let lexicon = illinois_lexicon();
    let mut model = SphericalRegionModel::new(&corpus, &lexicon, config(4)).unwrap();
    let flag = AtomicBool::new(false);
    let observer = CancelAfter {
        sweeps: 3,
        flag: &flag,
    };

    let summary = model
        .train(&mut untempered(50, 10, 1), Some(&flag), observer)
        .unwrap();
    assert!(summary.stopped);
    assert_eq!(summary.sweeps, 3);
    assert_eq!(model.phase(), ModelPhase::Stopped);
    model.check_consistency().unwrap();
}

#[test]
fn test_cancel_before_first_sweep() {
    let corpus = mixed_corpus(4);
    let lexicon = illinois_lexicon();
    let mut model = SphericalRegionModel::new(&corpus, &lexicon, config(4)).unwrap();
    let flag = AtomicBool::new(true);
    let summary = model.train(&mut untempered(5, 5, 1), Some(&flag), ()).unwrap();
    assert!(summary.stopped);
    assert_eq!(summary.sweeps, 0);
    assert!(model.decode(DecodeMode::MaxPosterior).is_ok(), "falls back to live tables");
}

#[test]
fn test_toponym_without_candidates_acts_as_word() {
    // word 7 is flagged as a toponym but has no lexicon entry
    let corpus = Corpus::new(
        vec![CHICAGO, 7, PEORIA, 7],
        vec![0, 0, 1, 1],
        vec![true, true, true, true],
        vec![false; 4],
    )
    .unwrap();
    let lexicon = illinois_lexicon();
    let mut model = SphericalRegionModel::new(&corpus, &lexicon, config(8)).unwrap();
    assert_eq!(model.token_kind(1), TokenKind::Word);
    assert!(matches!(model.token_kind(0), TokenKind::Toponym { candidates: 1, .. }));

    model.train(&mut untempered(4, 2, 1), None, ()).unwrap();
    let assignments = model.assignments();
    assert_eq!(assignments[1].coordinate, None);
    assert_eq!(assignments[0].coordinate, Some(0));
    assert!(model.resolved_point(1).is_none());
    model.check_consistency().unwrap();
}

#[test]
fn test_kappa_estimation_moves_kappa() {
    let corpus = mixed_corpus(20);
    let lexicon = illinois_lexicon();
    let mut model = SphericalRegionModel::new(
        &corpus,
        &lexicon,
        config(6).with_kappa(5.0).with_kappa_estimation(2.0),
    )
    .unwrap();
    let mut trace = SweepTrace::default();
    model.train(&mut untempered(30, 2, 1), None, &mut trace).unwrap();

    assert!(model.kappa() > 0.0);
    assert_ne!(model.kappa(), 5.0, "thirty proposals should accept at least once");
    let last = trace.last().expect("sweeps recorded");
    assert_eq!(last.kappa, model.kappa());
    model.check_consistency().unwrap();
}

#[test]
fn test_precondition_errors() {
    let lexicon = illinois_lexicon();
    let all_stop = Corpus::new(vec![1, 2], vec![0, 0], vec![false; 2], vec![true; 2]).unwrap();
    assert_eq!(
        SphericalRegionModel::new(&all_stop, &lexicon, config(1)).err(),
        Some(ModelError::EmptyCorpus)
    );

    let corpus = mixed_corpus(2);
    let bad = config(1).with_kappa(-1.0);
    assert!(matches!(
        SphericalRegionModel::new(&corpus, &lexicon, bad).err(),
        Some(ModelError::InvalidHyperparameter { name: "kappa", .. })
    ));

    let mut model = SphericalRegionModel::new(&corpus, &lexicon, config(1)).unwrap();
    assert_eq!(
        model.sweep(&untempered(1, 0, 1)).err(),
        Some(ModelError::NotInitialized)
    );
    assert_eq!(
        model.decode(DecodeMode::MaxPosterior).err(),
        Some(ModelError::NotInitialized)
    );
}

#[test]
fn test_output_summarizes_regions() {
    let corpus = mixed_corpus(12);
    let lexicon = illinois_lexicon();
    let mut model =
        SphericalRegionModel::new(&corpus, &lexicon, config(13).with_crpalpha(1.0)).unwrap();
    let summary = model.train(&mut untempered(5, 4, 1), None, ()).unwrap();
    let decoded = model.decode(DecodeMode::MaxPosterior).unwrap();
    let output = model.output(summary, decoded).unwrap();

    let tokens: f64 = output.regions.iter().map(|r| r.tokens).sum();
    assert!((tokens - corpus.active_len() as f64).abs() < 1e-9);
    for region in &output.regions {
        if region.toponyms > 0.0 {
            assert!(region.longitude.is_some() && region.latitude.is_some());
        }
    }
    let sizes: usize = output.region_sizes().iter().map(|&(_, n)| n).sum();
    assert_eq!(sizes, corpus.active_len());
}
