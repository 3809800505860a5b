// Unit tests for the five topic models behind the common inference surface.
//
// Everything trains on a four-document toy course with tiny hyperparameters
// so the whole file runs in well under a second.

use indexmap::IndexMap;

use coursetrace::corpus::{
    extract_course_texts, BagOfWords, CourseCorpus, CourseVocabulary, Document,
};
use coursetrace::inference::{infer_vector, vectorize_material, vectorize_posts, PostTokens};
use coursetrace::models::author_topic::AuthorTopicParams;
use coursetrace::models::hdp::HdpParams;
use coursetrace::models::labeled_lda::LabeledLdaParams;
use coursetrace::models::lda::LdaParams;
use coursetrace::models::{
    InferenceInput, ModelKind, ModelSet, TopicInference, TopicModel, TrainingConfig,
};

fn toks(words: &[&str]) -> Document {
    words.iter().map(|w| w.to_string()).collect()
}

fn toy_corpus() -> CourseCorpus {
    let mut l1 = IndexMap::new();
    l1.insert("A".to_string(), toks(&["agile", "sprint", "agile"]));
    l1.insert("B".to_string(), toks(&["sprint", "review"]));
    let mut m1 = IndexMap::new();
    m1.insert("L1".to_string(), l1);

    let mut l2 = IndexMap::new();
    l2.insert("C".to_string(), toks(&["design", "pattern"]));
    l2.insert("D".to_string(), toks(&["pattern", "uml"]));
    let mut m2 = IndexMap::new();
    m2.insert("L2".to_string(), l2);

    let mut vocab = CourseVocabulary::new();
    vocab.insert("M1".to_string(), m1);
    vocab.insert("M2".to_string(), m2);
    CourseCorpus::build(extract_course_texts(&vocab)).unwrap()
}

fn small_config(seed: u64) -> TrainingConfig {
    TrainingConfig {
        seed,
        lda: LdaParams {
            num_topics: 2,
            iterations: 20,
            ..Default::default()
        },
        hdp: HdpParams {
            max_topics: 5,
            iterations: 20,
            ..Default::default()
        },
        author_topic: AuthorTopicParams {
            num_topics: 2,
            iterations: 20,
            ..Default::default()
        },
        labeled_lda: LabeledLdaParams {
            iterations: 20,
            ..Default::default()
        },
        inference_iterations: 10,
    }
}

fn posts() -> PostTokens {
    let mut posts = PostTokens::new();
    posts.insert("q1".to_string(), toks(&["agile", "sprint"]));
    posts.insert("q2".to_string(), toks(&["uml", "kanban"]));
    posts.insert("q3".to_string(), toks(&["entirely", "unknown"]));
    posts
}

fn post_input<'a>(id: &'a str, bow: &'a BagOfWords, tokens: &'a [String]) -> InferenceInput<'a> {
    InferenceInput::Post { id, bow, tokens }
}

// ============================================================
// Shape
// ============================================================

#[test]
fn every_model_reports_its_own_kind() {
    let models = ModelSet::train(&toy_corpus(), &small_config(0)).unwrap();
    for kind in ModelKind::ALL {
        assert_eq!(models.get(kind).kind(), kind);
    }
}

#[test]
fn tfidf_dimension_is_vocabulary_size() {
    let corpus = toy_corpus();
    let models = ModelSet::train(&corpus, &small_config(0)).unwrap();
    assert_eq!(models.get(ModelKind::Tfidf).dimension(), corpus.dictionary.len());
    assert_eq!(models.get(ModelKind::Lda).dimension(), 2);
    assert_eq!(models.get(ModelKind::AuthorTopic).dimension(), 2);
    assert!(models.get(ModelKind::Hdp).dimension() <= 5);
    // M1, M2, L1, L2 and one label per item.
    assert_eq!(models.get(ModelKind::LabeledLda).dimension(), 8);
}

#[test]
fn material_vectors_match_model_dimension() {
    let corpus = toy_corpus();
    let models = ModelSet::train(&corpus, &small_config(3)).unwrap();
    let dims = models.dimensions();
    let records = vectorize_material(&models, &corpus).unwrap();
    assert_eq!(records.len(), corpus.len());
    for record in &records {
        for kind in ModelKind::ALL {
            assert_eq!(record.vectors.get(kind).len(), dims[kind.index()], "{kind}");
        }
        assert!(record.unutilized_words.is_empty());
    }
}

#[test]
fn post_vectors_match_model_dimension_even_when_out_of_vocabulary() {
    let corpus = toy_corpus();
    let models = ModelSet::train(&corpus, &small_config(3)).unwrap();
    let dims = models.dimensions();
    let records = vectorize_posts(&models, &corpus, &posts(), "Questions").unwrap();
    assert_eq!(records.len(), 3);
    for record in records.values() {
        for kind in ModelKind::ALL {
            let v = record.vectors.get(kind);
            assert_eq!(v.len(), dims[kind.index()], "{kind}");
            assert!(v.iter().all(|x| x.is_finite()));
        }
    }
    assert_eq!(records["q2"].unutilized_words, toks(&["kanban"]));
    assert_eq!(records["q3"].unutilized_words, toks(&["entirely", "unknown"]));
    assert!(records["q3"].vectors.tfidf.iter().all(|x| *x == 0.0));
}

// ============================================================
// Determinism and isolation
// ============================================================

#[test]
fn same_seed_trains_identical_models() {
    let corpus = toy_corpus();
    let a = vectorize_material(&ModelSet::train(&corpus, &small_config(9)).unwrap(), &corpus).unwrap();
    let b = vectorize_material(&ModelSet::train(&corpus, &small_config(9)).unwrap(), &corpus).unwrap();
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.vectors, y.vectors);
    }
}

#[test]
fn transient_authors_do_not_leak_between_posts() {
    let corpus = toy_corpus();
    let models = ModelSet::train(&corpus, &small_config(1)).unwrap();
    let atm = models.get(ModelKind::AuthorTopic);

    let a_tokens = toks(&["agile", "sprint"]);
    let b_tokens = toks(&["pattern", "uml", "uml"]);
    let a_bow = corpus.dictionary.doc2bow(&a_tokens);
    let b_bow = corpus.dictionary.doc2bow(&b_tokens);

    let first = infer_vector(atm, &post_input("a", &a_bow, &a_tokens)).unwrap();
    infer_vector(atm, &post_input("b", &b_bow, &b_tokens)).unwrap();
    let again = infer_vector(atm, &post_input("a", &a_bow, &a_tokens)).unwrap();
    assert_eq!(first, again);
}

// ============================================================
// Persistence
// ============================================================

#[test]
fn serialized_models_infer_the_same_vectors() {
    let corpus = toy_corpus();
    let models = ModelSet::train(&corpus, &small_config(5)).unwrap();

    let restored: Vec<TopicModel> = models
        .iter()
        .map(|m| serde_json::from_str(&serde_json::to_string(m).unwrap()).unwrap())
        .collect();
    let restored = ModelSet::from_models(restored).unwrap();

    let tokens = toks(&["sprint", "pattern"]);
    let bow = corpus.dictionary.doc2bow(&tokens);
    for kind in ModelKind::ALL {
        let input = post_input("q", &bow, &tokens);
        let before = infer_vector(models.get(kind), &input).unwrap();
        let after = infer_vector(restored.get(kind), &input).unwrap();
        assert_eq!(before.len(), after.len());
        for (x, y) in before.iter().zip(&after) {
            assert!((x - y).abs() < 1e-9, "{kind}: {x} vs {y}");
        }
    }
}

#[test]
fn model_set_rejects_a_missing_kind() {
    let models = ModelSet::train(&toy_corpus(), &small_config(0)).unwrap();
    let partial: Vec<TopicModel> = models
        .iter()
        .filter(|m| m.kind() != ModelKind::Hdp)
        .cloned()
        .collect();
    assert!(ModelSet::from_models(partial).is_err());
}
