// Unit tests for reciprocal rank, sampling and course evaluation.
//
// Rankings are built by hand here so the expected reciprocal ranks are known
// exactly and no model training is involved.

use std::collections::BTreeMap;

use chrono::Utc;
use proptest::prelude::*;

use coursetrace::corpus::{DocLabels, DocumentId};
use coursetrace::evaluation::{
    draw_sample, evaluate, reciprocal_rank, EvaluationConfig, GroundTruth, RankingSummary,
};
use coursetrace::ranking::{
    CourseRankings, DistanceMetric, PostRankings, RankedList, RankingKind,
};

const DOCS: usize = 10;

/// Ranking of `DOCS` documents starting at `first` and wrapping around.
fn rotated(first: usize) -> RankedList {
    (0..DOCS)
        .map(|pos| (DocumentId::new((first + pos) % DOCS), pos as f64 / DOCS as f64))
        .collect()
}

/// `posts` questions; question i ranks document i % DOCS first in every list.
fn synthetic_rankings(posts: usize) -> CourseRankings {
    let mut questions = PostRankings::new();
    for i in 0..posts {
        let lists: BTreeMap<RankingKind, RankedList> = RankingKind::DISPLAY_ORDER
            .into_iter()
            .map(|kind| (kind, rotated(i % DOCS)))
            .collect();
        questions.insert(format!("post-{i:03}"), lists);
    }
    let doc_id_to_labels = (0..DOCS)
        .map(|d| {
            (
                DocumentId::new(d),
                DocLabels("M".to_string(), "L".to_string(), format!("item {d}")),
            )
        })
        .collect();
    CourseRankings {
        course: "synthetic".to_string(),
        created_at: Utc::now(),
        doc_id_to_labels,
        questions_topic_mapping: BTreeMap::from([(DistanceMetric::Cosine, questions)]),
        answers_topic_mapping: BTreeMap::new(),
    }
}

/// Labels every post with the document `offset` places below its top hit.
fn truth_with_offset(posts: usize, offset: usize) -> GroundTruth {
    let mut truth = GroundTruth::default();
    for i in 0..posts {
        truth.insert(format!("post-{i:03}"), DocumentId::new((i + offset) % DOCS));
    }
    truth
}

// ============================================================
// Reciprocal rank
// ============================================================

proptest! {
    #[test]
    fn reciprocal_rank_is_in_unit_interval(first in 0usize..DOCS, target in 0usize..DOCS) {
        let rr = reciprocal_rank(&rotated(first), DocumentId::new(target)).unwrap();
        prop_assert!(rr > 0.0 && rr <= 1.0);
    }
}

#[test]
fn reciprocal_rank_is_one_at_the_top() {
    let rr = reciprocal_rank(&rotated(4), DocumentId::new(4)).unwrap();
    assert_eq!(rr, 1.0);
}

#[test]
fn reciprocal_rank_of_third_place() {
    let rr = reciprocal_rank(&rotated(0), DocumentId::new(2)).unwrap();
    assert!((rr - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn missing_target_is_an_error() {
    assert!(reciprocal_rank(&rotated(0), DocumentId::new(DOCS + 1)).is_err());
}

// ============================================================
// Sampling
// ============================================================

#[test]
fn too_few_labels_is_reported() {
    let truth = truth_with_offset(99, 0);
    let err = draw_sample(&truth, &EvaluationConfig::default()).unwrap_err();
    assert!(err.to_string().contains("99"), "{err}");
}

#[test]
fn base_sample_has_no_repeats_without_bootstrap() {
    let truth = truth_with_offset(150, 0);
    let config = EvaluationConfig {
        bootstrap_size: 0,
        ..Default::default()
    };
    let mut sample = draw_sample(&truth, &config).unwrap();
    assert_eq!(sample.len(), 100);
    sample.sort_unstable();
    sample.dedup();
    assert_eq!(sample.len(), 100);
}

#[test]
fn bootstrap_draws_only_from_the_base_sample() {
    let truth = truth_with_offset(150, 0);
    let base_config = EvaluationConfig {
        bootstrap_size: 0,
        ..Default::default()
    };
    let base = draw_sample(&truth, &base_config).unwrap();
    let boot = draw_sample(&truth, &EvaluationConfig::default()).unwrap();
    assert_eq!(boot.len(), 1000);
    assert!(boot.iter().all(|id| base.contains(id)));
}

// ============================================================
// Course evaluation
// ============================================================

#[test]
fn bootstrap_evaluation_is_deterministic() {
    let rankings = synthetic_rankings(100);
    let truth = truth_with_offset(100, 3);
    let config = EvaluationConfig::default();

    let first = evaluate(&rankings, &truth, &config).unwrap();
    let second = evaluate(&rankings, &truth, &config).unwrap();
    assert_eq!(first.evaluated, 1000);
    assert_eq!(first.summaries, second.summaries);
}

#[test]
fn offset_labels_give_the_expected_mrr() {
    let rankings = synthetic_rankings(100);
    let truth = truth_with_offset(100, 1);
    let eval = evaluate(&rankings, &truth, &EvaluationConfig::default()).unwrap();
    assert_eq!(eval.summaries.len(), 9);
    for summary in &eval.summaries {
        assert!((summary.mean - 0.5).abs() < 1e-12, "{}", summary.kind);
        assert_eq!(summary.stdev, 0.0);
        assert_eq!(summary.median, 0.5);
    }
}

#[test]
fn different_seeds_sample_differently() {
    let rankings = synthetic_rankings(120);
    // Labels vary per post so the sample composition shows in the mean.
    let mut truth = GroundTruth::default();
    for i in 0..120 {
        truth.insert(format!("post-{i:03}"), DocumentId::new((i + i / DOCS) % DOCS));
    }
    let a = evaluate(&rankings, &truth, &EvaluationConfig::default()).unwrap();
    let b = evaluate(
        &rankings,
        &truth,
        &EvaluationConfig {
            seed: 7,
            ..Default::default()
        },
    )
    .unwrap();
    let mean = |e: &coursetrace::evaluation::CourseEvaluation| {
        e.summary(RankingKind::Tfidf).map(|s| s.mean).unwrap()
    };
    assert_ne!(mean(&a), mean(&b));
}

#[test]
fn unranked_metric_is_an_invariant_error() {
    let rankings = synthetic_rankings(100);
    let truth = truth_with_offset(100, 0);
    let config = EvaluationConfig {
        metric: DistanceMetric::Euclidean,
        ..Default::default()
    };
    assert!(evaluate(&rankings, &truth, &config).is_err());
}

// ============================================================
// Labels and summaries
// ============================================================

#[test]
fn label_files_accept_integers_and_strings() {
    let truth = GroundTruth::from_json(
        r#"{"questions": {"p1": 3, "p2": "5", "p3": -1, "p4": "-1"}}"#,
    )
    .unwrap();
    assert_eq!(truth.len(), 2);
    assert_eq!(truth.unlabelable(), 2);
    assert_eq!(truth.get("p2"), Some(DocumentId::new(5)));
    assert_eq!(truth.get("p3"), None);
}

#[test]
fn non_numeric_label_is_rejected() {
    assert!(GroundTruth::from_json(r#"{"questions": {"p1": "doc three"}}"#).is_err());
}

#[test]
fn summary_statistics() {
    let s = RankingSummary::from_values(RankingKind::Lda, &[1.0, 0.5, 0.25, 0.25]);
    assert_eq!(s.count, 4);
    assert!((s.mean - 0.5).abs() < 1e-12);
    assert!((s.median - 0.375).abs() < 1e-12);
    // Sample variance: (0.25 + 0 + 0.0625 + 0.0625) / 3 = 0.125
    assert!((s.stdev - 0.125f64.sqrt()).abs() < 1e-12);
}
