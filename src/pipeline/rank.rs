// Rank stage: distances from every question (and optionally answer) to every
// material document, plus the forum-only vocabulary diagnostic.
//
// Refuses to rank vectors whose models come from a different build.

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::inference::CourseVectors;
use crate::models::{ModelKind, ModelSet};
use crate::pipeline::build;
use crate::ranking::forum::ForumVocabulary;
use crate::ranking::{CourseRankings, DistanceMetric};
use crate::store::{self, ArtifactKind, ArtifactStore};

#[derive(Debug, Clone)]
pub struct RankReport {
    pub course: String,
    pub material: usize,
    pub questions: usize,
    pub answers_ranked: usize,
    pub forum_only_words: usize,
    pub discussion_vocabulary: usize,
}

pub fn run(
    store: &dyn ArtifactStore,
    course: &str,
    metrics: &[DistanceMetric],
    include_answers: bool,
) -> Result<RankReport> {
    let vectors: CourseVectors = store::require_json(store, course, ArtifactKind::Vectors, "build")?;
    let models = build::load_models(store, course, vectors.created_at)?;
    check_dimensions(&models, &vectors)?;

    let rankings = CourseRankings::build(&vectors, metrics, include_answers)
        .with_context(|| format!("Ranking failed for {course}"))?;
    let forum = ForumVocabulary::collect(course, &vectors.questions);

    let batch = [
        store::encode_json(course, ArtifactKind::Rankings, &rankings)?,
        store::encode_json(course, ArtifactKind::ForumVocabulary, &forum)?,
    ];
    store::save_all(store, course, &batch)?;

    info!(course, metrics = metrics.len(), "Rank complete");

    Ok(RankReport {
        course: course.to_string(),
        material: vectors.material.len(),
        questions: vectors.questions.len(),
        answers_ranked: if include_answers { vectors.answers.len() } else { 0 },
        forum_only_words: forum.words.len(),
        discussion_vocabulary: forum.discussion_vocabulary_size,
    })
}

fn check_dimensions(models: &ModelSet, vectors: &CourseVectors) -> Result<()> {
    let dimensions = models.dimensions();
    for (kind, expected) in ModelKind::ALL.into_iter().zip(dimensions) {
        if let Some(record) = vectors
            .material
            .iter()
            .find(|r| r.vectors.get(kind).len() != expected)
        {
            bail!(
                "{kind} vectors for {} have {} values but the stored model has {expected}. \
                 Run `coursetrace build` again.",
                vectors.course,
                record.vectors.get(kind).len()
            );
        }
    }
    debug!(course = %vectors.course, ?dimensions, "Models match vectors");
    Ok(())
}
