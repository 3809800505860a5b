// End-to-end composition: input files on disk -> build -> rank -> evaluate.
//
// Uses the JSON directory store and tiny model settings, with configuration
// going through the same lookup path as the environment.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use coursetrace::config::Config;
use coursetrace::corpus::DocumentId;
use coursetrace::inference::CourseVectors;
use coursetrace::models::ModelKind;
use coursetrace::pipeline::{build, evaluate, rank};
use coursetrace::ranking::{CourseRankings, DistanceMetric, RankingKind};
use coursetrace::store::{self, ArtifactKind, ArtifactStore, JsonDirStore};

const COURSE: &str = "toy";

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).unwrap();
}

fn write_inputs(dir: &Path) {
    write(
        dir,
        "vocabulary.toy.json",
        r#"{
            "M1": {"L1": {"A": ["agile", "sprint", "agile"], "B": ["sprint", "review"], "Empty": []}},
            "M2": {"L2": {"C": ["design", "pattern"], "D": ["pattern", "uml"]}}
        }"#,
    );
    write(
        dir,
        "questions.toy.json",
        r#"{
            "q-agile": ["agile", "sprint", "agile"],
            "q-uml": ["uml", "pattern", "uml"],
            "q-review": ["review", "sprint", "retro"],
            "q-offtopic": ["lunch", "parking"]
        }"#,
    );
    write(
        dir,
        "manual_label.toy.json",
        r#"{"questions": {"q-agile": 0, "q-uml": "3", "q-review": 1, "q-offtopic": -1}}"#,
    );
}

fn config_for(dir: &Path) -> Config {
    let vars: HashMap<&str, String> = HashMap::from([
        ("COURSETRACE_DATA_DIR", dir.display().to_string()),
        ("COURSETRACE_COURSES", COURSE.to_string()),
        ("COURSETRACE_LDA_TOPICS", "2".to_string()),
        ("COURSETRACE_LDA_ITERATIONS", "10".to_string()),
        ("COURSETRACE_HDP_MAX_TOPICS", "4".to_string()),
        ("COURSETRACE_HDP_ITERATIONS", "10".to_string()),
        ("COURSETRACE_ATM_TOPICS", "2".to_string()),
        ("COURSETRACE_ATM_ITERATIONS", "10".to_string()),
        ("COURSETRACE_LLDA_ITERATIONS", "10".to_string()),
        ("COURSETRACE_INFERENCE_ITERATIONS", "10".to_string()),
        ("COURSETRACE_METRICS", "cosine,euclidean".to_string()),
        ("COURSETRACE_SAMPLE_SIZE", "2".to_string()),
        ("COURSETRACE_BOOTSTRAP_SIZE", "50".to_string()),
    ]);
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

// ============================================================
// Full pipeline
// ============================================================

#[test]
fn build_rank_evaluate_on_a_toy_course() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let config = config_for(dir.path());
    let store = JsonDirStore::new(dir.path());

    let report = build::run(&config, &store, COURSE).unwrap();
    assert_eq!(report.documents, 4);
    assert_eq!(report.terms, 6);
    assert_eq!(report.questions, 4);
    assert_eq!(report.answers, 0);
    assert_eq!(report.dimensions[0], 6);

    let report = rank::run(&store, COURSE, &config.metrics, false).unwrap();
    assert_eq!(report.material, 4);
    assert_eq!(report.questions, 4);
    // retro, lunch, parking
    assert_eq!(report.forum_only_words, 3);

    let eval = evaluate::run(&config, &store, COURSE, &config.evaluation)
        .unwrap()
        .expect("three labels is enough for a sample of two");
    assert_eq!(eval.labelled, 3);
    assert_eq!(eval.unlabelable, 1);
    assert_eq!(eval.evaluated, 50);
    assert_eq!(eval.summaries.len(), 9);
    let tfidf = eval.summary(RankingKind::Tfidf).unwrap();
    assert!(tfidf.mean > 0.0 && tfidf.mean <= 1.0);
}

#[test]
fn identical_question_ranks_its_source_first() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let config = config_for(dir.path());
    let store = JsonDirStore::new(dir.path());

    build::run(&config, &store, COURSE).unwrap();
    rank::run(&store, COURSE, &config.metrics, false).unwrap();

    let rankings: CourseRankings =
        store::require_json(&store, COURSE, ArtifactKind::Rankings, "rank").unwrap();
    for metric in [DistanceMetric::Cosine, DistanceMetric::Euclidean] {
        let tfidf = &rankings.question(metric, "q-agile").unwrap()[&RankingKind::Tfidf];
        assert_eq!(tfidf[0].0, DocumentId::new(0), "{metric}");
        assert!(tfidf[0].1 < 1e-9, "{metric}");
    }

    let suggestions = evaluate::suggest(&store, COURSE, "q-uml", DistanceMetric::Cosine, 2).unwrap();
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0].labels.item(), "D");
}

#[test]
fn models_reload_from_the_store() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let config = config_for(dir.path());
    let store = JsonDirStore::new(dir.path());

    let report = build::run(&config, &store, COURSE).unwrap();
    let models = build::load_models(&store, COURSE, report.built_at).unwrap();
    assert_eq!(models.dimensions(), report.dimensions);

    let vectors: CourseVectors =
        store::require_json(&store, COURSE, ArtifactKind::Vectors, "build").unwrap();
    assert_eq!(vectors.created_at, report.built_at);
}

// ============================================================
// Failure modes
// ============================================================

#[test]
fn too_few_labels_skips_evaluation() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let mut config = config_for(dir.path());
    config.evaluation.sample_size = 10;
    let store = JsonDirStore::new(dir.path());

    build::run(&config, &store, COURSE).unwrap();
    rank::run(&store, COURSE, &config.metrics, false).unwrap();
    let eval = evaluate::run(&config, &store, COURSE, &config.evaluation).unwrap();
    assert!(eval.is_none());
}

#[test]
fn rank_before_build_points_at_build() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::new(dir.path());
    let err = rank::run(&store, COURSE, &[DistanceMetric::Cosine], false).unwrap_err();
    assert!(err.to_string().contains("coursetrace build"), "{err}");
}

#[test]
fn failed_build_keeps_previous_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let config = config_for(dir.path());
    let store = JsonDirStore::new(dir.path());

    build::run(&config, &store, COURSE).unwrap();
    let before = store.get(COURSE, ArtifactKind::Vectors).unwrap();

    // An all-empty course can't produce a corpus.
    write(dir.path(), "vocabulary.toy.json", r#"{"M1": {"L1": {"A": []}}}"#);
    assert!(build::run(&config, &store, COURSE).is_err());
    assert_eq!(store.get(COURSE, ArtifactKind::Vectors).unwrap(), before);
}

#[test]
fn failed_artifact_write_keeps_previous_build() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let mut config = config_for(dir.path());
    let store = JsonDirStore::new(dir.path());
    let lda = ArtifactKind::Model(ModelKind::Lda);

    build::run(&config, &store, COURSE).unwrap();
    let models_before = store.get(COURSE, lda).unwrap();
    let vectors_before = store.get(COURSE, ArtifactKind::Vectors).unwrap();

    // The vectors can no longer be written: their staging path is a directory.
    let staging = store
        .path_for(COURSE, ArtifactKind::Vectors)
        .with_extension("json.tmp");
    fs::create_dir(&staging).unwrap();

    config.training.seed = 99;
    assert!(build::run(&config, &store, COURSE).is_err());
    assert_eq!(store.get(COURSE, lda).unwrap(), models_before);
    assert_eq!(store.get(COURSE, ArtifactKind::Vectors).unwrap(), vectors_before);

    // The untouched pair still ranks.
    fs::remove_dir(&staging).unwrap();
    rank::run(&store, COURSE, &config.metrics, false).unwrap();
}

#[test]
fn rank_rejects_models_from_another_build() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let config = config_for(dir.path());
    let store = JsonDirStore::new(dir.path());
    let lda = ArtifactKind::Model(ModelKind::Lda);

    build::run(&config, &store, COURSE).unwrap();
    let mut stored: serde_json::Value = store::require_json(&store, COURSE, lda, "build").unwrap();
    stored["created_at"] = serde_json::json!("2001-01-01T00:00:00Z");
    store.put_all(COURSE, &[(lda, stored.to_string())]).unwrap();

    let err = rank::run(&store, COURSE, &config.metrics, false).unwrap_err();
    assert!(err.to_string().contains("different builds"), "{err}");
    assert!(store.get(COURSE, ArtifactKind::Rankings).unwrap().is_none());
}

#[test]
fn answers_are_ranked_when_present() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    write(dir.path(), "answers.toy.json", r#"{"a-1": ["design", "uml"]}"#);
    let config = config_for(dir.path());
    let store = JsonDirStore::new(dir.path());

    assert_eq!(build::run(&config, &store, COURSE).unwrap().answers, 1);
    let report = rank::run(&store, COURSE, &config.metrics, true).unwrap();
    assert_eq!(report.answers_ranked, 1);
}
