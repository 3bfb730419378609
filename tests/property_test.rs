//! Property tests for indicator and scoring invariants.
//!
//! Uses proptest to verify:
//! 1. Indicators keep series length and order, with K/D in [0, 100]
//! 2. Strategy verdicts stay in range for arbitrary well-formed series
//! 3. Composite scores stay within the range of their inputs
//! 4. Ranking is ordered, densely numbered and idempotent

mod common;

use common::*;
use proptest::prelude::*;
use std::collections::BTreeMap;
use stockscreen::domain::indicator::{IndicatorParams, compute_indicators};
use stockscreen::domain::scoring::{AggregationMethod, ScoringEngine, SortKey};
use stockscreen::domain::strategy::{JValueStrategy, Strategy as _, VolumePatternStrategy};
use stockscreen::domain::verdict::{Verdict, VerdictSet};

const EPS: f64 = 1e-9;

// ── Generators ───────────────────────────────────────────────────────

/// Well-formed bars: low <= close <= high, positive prices and volume.
fn arb_series(min: usize, max: usize) -> impl Strategy<Value = Vec<OhlcvBar>> {
    prop::collection::vec(
        (1.0..100.0_f64, 0.0..0.1_f64, 0.0..0.1_f64, 100.0..100_000.0_f64),
        min..max,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (close, up, down, volume))| {
                make_bar("000001.SZ", i, close * (1.0 + up), close * (1.0 - down), close, volume)
            })
            .collect()
    })
}

fn arb_method() -> impl Strategy<Value = AggregationMethod> {
    prop_oneof![
        Just(AggregationMethod::WeightedAverage),
        Just(AggregationMethod::Multiplicative),
        Just(AggregationMethod::MaxScore),
    ]
}

fn arb_sort_key() -> impl Strategy<Value = SortKey> {
    prop_oneof![
        Just(SortKey::TotalScore),
        Just(SortKey::WeightedScore),
        Just(SortKey::QualifiedCount),
        Just(SortKey::Confidence),
    ]
}

/// (score, confidence, qualified) for strategies "a" and "b".
fn arb_verdict_pair() -> impl Strategy<Value = [(f64, f64, bool); 2]> {
    let one = (0.0..=100.0_f64, 0.0..=1.0_f64, any::<bool>());
    (one.clone(), one).prop_map(|(a, b)| [a, b])
}

fn verdict_set(code: &str, pair: &[(f64, f64, bool); 2]) -> VerdictSet {
    let mut set = VerdictSet::new();
    for (strategy, (score, confidence, qualified)) in ["a", "b"].iter().zip(pair) {
        set.insert(Verdict::new(code, "Name", strategy, *qualified, *score, *confidence).unwrap());
    }
    set
}

// ── 1. Indicators ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn indicators_keep_shape(bars in arb_series(1, 120)) {
        let out = compute_indicators(&bars, &IndicatorParams::default());
        prop_assert_eq!(out.len(), bars.len());
        for (a, b) in out.iter().zip(&bars) {
            prop_assert_eq!(a.date, b.date);
            prop_assert_eq!(a.close, b.close);
        }
    }

    #[test]
    fn kdj_stays_bounded(bars in arb_series(1, 120)) {
        let out = compute_indicators(&bars, &IndicatorParams::default());
        for bar in &out {
            let (k, d, j) = (bar.k.unwrap(), bar.d.unwrap(), bar.j.unwrap());
            prop_assert!((-EPS..=100.0 + EPS).contains(&k));
            prop_assert!((-EPS..=100.0 + EPS).contains(&d));
            prop_assert!(j.is_finite());
            prop_assert!((-100.0 - EPS..=200.0 + EPS).contains(&j));
        }
    }
}

// ── 2. Verdict ranges ────────────────────────────────────────────────

proptest! {
    #[test]
    fn j_value_verdict_in_range(bars in arb_series(1, 80), max_j in 1.0..50.0_f64) {
        let bars = compute_indicators(&bars, &IndicatorParams::default());
        let strategy = JValueStrategy::new(max_j).unwrap();
        let verdict = strategy.analyze("000001.SZ", "Name", &bars).unwrap();
        prop_assert!((0.0..=100.0).contains(&verdict.score()));
        prop_assert!((0.0..=1.0).contains(&verdict.confidence()));
        if !verdict.is_qualified() {
            prop_assert_eq!(verdict.score(), 0.0);
        }
    }

    #[test]
    fn volume_verdict_in_range(bars in arb_series(10, 80)) {
        let strategy = VolumePatternStrategy::new(5, 0.01, 1.2).unwrap();
        let verdict = strategy.analyze("000001.SZ", "Name", &bars).unwrap();
        prop_assert!((0.0..=100.0).contains(&verdict.score()));
        prop_assert!((0.0..=1.0).contains(&verdict.confidence()));
    }
}

// ── 3. Composite scores ──────────────────────────────────────────────

proptest! {
    #[test]
    fn composite_between_extremes(
        method in arb_method(),
        pair in arb_verdict_pair(),
        wa in 0.0..5.0_f64,
        wb in 0.0..5.0_f64,
    ) {
        let engine = ScoringEngine::new(method);
        let weights: BTreeMap<String, f64> = [("a".to_string(), wa), ("b".to_string(), wb)].into_iter().collect();
        let score = engine.score("000001.SZ", "Name", &verdict_set("000001.SZ", &pair), Some(&weights), &[]);

        let lo = pair[0].0.min(pair[1].0);
        let hi = pair[0].0.max(pair[1].0);
        prop_assert!(score.total_score >= lo - EPS && score.total_score <= hi + EPS);
        prop_assert!(score.weighted_score >= -EPS && score.weighted_score <= hi + EPS);
        prop_assert!((0.0..=1.0 + EPS).contains(&score.confidence));
    }
}

// ── 4. Ranking ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rank_is_ordered_and_idempotent(
        pairs in prop::collection::vec(arb_verdict_pair(), 0..20),
        sort_by in arb_sort_key(),
        min_score in 0.0..50.0_f64,
        min_qualified in 0usize..3,
    ) {
        let engine = ScoringEngine::default();
        let batch: Vec<(String, VerdictSet)> = pairs
            .iter()
            .enumerate()
            .map(|(i, pair)| {
                let code = format!("{:06}.SZ", i + 1);
                let set = verdict_set(&code, pair);
                (code, set)
            })
            .collect();
        let scores = engine.score_batch(&batch, None, &[]);

        let ranked = engine.rank(scores, sort_by, min_score, Some(min_qualified));
        for (i, entry) in ranked.iter().enumerate() {
            prop_assert_eq!(entry.rank, i + 1);
            prop_assert!(entry.score.qualified_count() >= min_qualified);
        }
        if sort_by == SortKey::WeightedScore {
            for w in ranked.windows(2) {
                prop_assert!(w[0].score.weighted_score >= w[1].score.weighted_score);
            }
        }

        let again = engine.rank(
            ranked.iter().map(|e| e.score.clone()).collect(),
            sort_by,
            min_score,
            Some(min_qualified),
        );
        prop_assert_eq!(again, ranked);
    }
}
