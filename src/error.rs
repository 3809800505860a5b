// Typed pipeline errors.
//
// Everything that aborts a course's run is one of these. They travel inside
// anyhow::Error like any other failure, so callers that care about the kind
// can `downcast_ref::<PipelineError>()` and everyone else just uses `?`.

use crate::corpus::vocabulary::DocumentId;
use crate::models::ModelKind;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Bad or missing input: empty corpus, unresolvable labels, author groups
    /// pointing outside the corpus, invalid settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A trainer could not produce a model. Fatal for the course.
    #[error("training {model} failed: {reason}")]
    TrainingFailure { model: ModelKind, reason: String },

    /// A model's native output could not be normalised to its fixed length.
    #[error("{model} produced a vector of length {actual}, expected {expected}")]
    InferenceShape {
        model: ModelKind,
        expected: usize,
        actual: usize,
    },

    /// A ranking is missing a document it must contain.
    #[error("ranking invariant violated: {0}")]
    RankingInvariant(String),

    /// Bounds-checked DocumentId lookup failed.
    #[error("document {id} is out of range for a corpus of {len} documents")]
    DocumentOutOfRange { id: DocumentId, len: usize },

    /// Not enough human-labelled posts to draw the base sample.
    #[error("only {have} labelled posts, need at least {need}")]
    InsufficientLabels { have: usize, need: usize },
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        PipelineError::Configuration(msg.into())
    }

    pub fn training(model: ModelKind, reason: impl Into<String>) -> Self {
        PipelineError::TrainingFailure {
            model,
            reason: reason.into(),
        }
    }
}
