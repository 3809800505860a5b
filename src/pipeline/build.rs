// Build stage: corpus, the five models, and vectors for material and posts.
//
// Nothing is written until every model has trained and every document has
// been vectorized. The six artifacts then go to the store as one batch that
// shares a build timestamp, so a failure at any point leaves the course's
// previous artifacts as they were.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::corpus::{extract_course_texts, CourseCorpus};
use crate::inference::{CourseVectors, PostTokens};
use crate::inputs;
use crate::models::{ModelKind, ModelSet, TopicInference, TopicModel, TrainingConfig};
use crate::store::{self, ArtifactKind, ArtifactStore};

/// A trained model as persisted, with the settings that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredModel {
    pub course: String,
    pub created_at: DateTime<Utc>,
    pub training: TrainingConfig,
    pub model: TopicModel,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub course: String,
    pub documents: usize,
    pub terms: usize,
    /// Vector length per model, in `ModelKind::ALL` order.
    pub dimensions: [usize; 5],
    pub questions: usize,
    pub answers: usize,
    /// Shared `created_at` of the stored models and vectors.
    pub built_at: DateTime<Utc>,
}

/// Train and vectorize one course from already-loaded inputs.
pub fn build_course(
    course: &str,
    corpus: &CourseCorpus,
    questions: &PostTokens,
    answers: &PostTokens,
    training: &TrainingConfig,
) -> Result<(ModelSet, CourseVectors)> {
    let models = ModelSet::train(corpus, training)
        .with_context(|| format!("Training failed for {course}"))?;
    let vectors = CourseVectors::build(course, &models, corpus, questions, answers)
        .with_context(|| format!("Vectorizing failed for {course}"))?;
    Ok((models, vectors))
}

/// Run the build stage for one course and persist its artifacts.
pub fn run(config: &Config, store: &dyn ArtifactStore, course: &str) -> Result<BuildReport> {
    let vocabulary = inputs::load_vocabulary(&config.data_dir, course)?;
    let corpus = CourseCorpus::build(extract_course_texts(&vocabulary))
        .with_context(|| format!("No usable course material for {course}"))?;
    let questions = inputs::load_questions(&config.data_dir, course)?;
    let answers = inputs::load_answers(&config.data_dir, course)?;

    let (models, mut vectors) =
        build_course(course, &corpus, &questions, &answers, &config.training)?;
    let built_at = Utc::now();
    vectors.created_at = built_at;

    let mut batch = Vec::with_capacity(ModelKind::ALL.len() + 1);
    for model in models.iter() {
        let stored = StoredModel {
            course: course.to_string(),
            created_at: built_at,
            training: config.training.clone(),
            model: model.clone(),
        };
        batch.push(store::encode_json(course, ArtifactKind::Model(model.kind()), &stored)?);
    }
    batch.push(store::encode_json(course, ArtifactKind::Vectors, &vectors)?);
    store::save_all(store, course, &batch)?;

    info!(course, documents = corpus.len(), "Build complete");

    Ok(BuildReport {
        course: course.to_string(),
        documents: corpus.len(),
        terms: corpus.dictionary.len(),
        dimensions: models.dimensions(),
        questions: vectors.questions.len(),
        answers: vectors.answers.len(),
        built_at,
    })
}

/// Reload a course's five persisted models, checking they come from the build
/// stamped `built_at` (the `created_at` of that build's vectors).
pub fn load_models(
    store: &dyn ArtifactStore,
    course: &str,
    built_at: DateTime<Utc>,
) -> Result<ModelSet> {
    let mut models = Vec::with_capacity(ModelKind::ALL.len());
    for kind in ModelKind::ALL {
        let stored: StoredModel = store::require_json(store, course, ArtifactKind::Model(kind), "build")?;
        if stored.created_at != built_at {
            bail!(
                "Stored {kind} model for {course} is from {} but its vectors are from {built_at}. \
                 The models and vectors come from different builds. Run `coursetrace build` again.",
                stored.created_at
            );
        }
        models.push(stored.model);
    }
    Ok(ModelSet::from_models(models)?)
}
