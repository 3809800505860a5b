// Evaluate stage and the labeling helper. Both only read stored artifacts.

use anyhow::{Context, Result};
use tracing::warn;

use crate::config::Config;
use crate::corpus::{DocLabels, DocumentId};
use crate::error::PipelineError;
use crate::evaluation::{self, CourseEvaluation, EvaluationConfig};
use crate::inputs;
use crate::ranking::{CourseRankings, DistanceMetric, RankingKind};
use crate::store::{self, ArtifactKind, ArtifactStore};

/// Evaluate one course. Returns `None` when the course has too few labels.
pub fn run(
    config: &Config,
    store: &dyn ArtifactStore,
    course: &str,
    eval: &EvaluationConfig,
) -> Result<Option<CourseEvaluation>> {
    let rankings: CourseRankings = store::require_json(store, course, ArtifactKind::Rankings, "rank")?;
    let truth = inputs::load_ground_truth(&config.data_dir, course)?;

    match evaluation::evaluate(&rankings, &truth, eval) {
        Ok(result) => Ok(Some(result)),
        Err(PipelineError::InsufficientLabels { have, need }) => {
            warn!(course, have, need, "Skipping course with too few labelled questions");
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("Evaluation failed for {course}")),
    }
}

/// One candidate document for a post.
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub document: DocumentId,
    pub labels: DocLabels,
    pub distance: f64,
}

/// The closest material for a question by TF-IDF distance.
pub fn suggest(
    store: &dyn ArtifactStore,
    course: &str,
    post_id: &str,
    metric: DistanceMetric,
    top: usize,
) -> Result<Vec<Suggestion>> {
    let rankings: CourseRankings = store::require_json(store, course, ArtifactKind::Rankings, "rank")?;
    let lists = rankings
        .question(metric, post_id)
        .with_context(|| format!("No {metric} ranking for question {post_id} in {course}"))?;
    let ranked = lists
        .get(&RankingKind::Tfidf)
        .with_context(|| format!("Question {post_id} has no TF-IDF ranking"))?;

    ranked
        .iter()
        .take(top)
        .map(|&(document, distance)| -> Result<Suggestion> {
            let labels = rankings
                .doc_id_to_labels
                .get(&document)
                .cloned()
                .with_context(|| format!("Document {document} has no labels in {course}"))?;
            Ok(Suggestion {
                document,
                labels,
                distance,
            })
        })
        .collect()
}
