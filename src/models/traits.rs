// Topic model trait — the one inference surface every variant exposes.
//
// Each model answers in its own native shape (sparse pairs, a batch of dense
// rows, a bare dense vector). Turning that into a flat vector of fixed length
// is the inference adapter's job, not the model's.

use crate::corpus::{BagOfWords, DocumentId};
use crate::error::PipelineError;

use super::ModelKind;

/// What a model is asked to place in its vector space.
#[derive(Debug, Clone, Copy)]
pub enum InferenceInput<'a> {
    /// A document of the training corpus.
    Material {
        id: DocumentId,
        bow: &'a BagOfWords,
        tokens: &'a [String],
    },
    /// A held-out discussion post, identified by its post id.
    Post {
        id: &'a str,
        bow: &'a BagOfWords,
        tokens: &'a [String],
    },
}

impl<'a> InferenceInput<'a> {
    pub fn bow(&self) -> &'a BagOfWords {
        match self {
            InferenceInput::Material { bow, .. } | InferenceInput::Post { bow, .. } => *bow,
        }
    }

    pub fn tokens(&self) -> &'a [String] {
        match self {
            InferenceInput::Material { tokens, .. } | InferenceInput::Post { tokens, .. } => *tokens,
        }
    }
}

/// Raw output of a model's inference call, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeVector {
    /// (feature index, weight) pairs; absent indices are zero.
    Sparse(Vec<(usize, f64)>),
    /// One dense row per document in the inferred chunk.
    Batch(Vec<Vec<f64>>),
    /// A single dense vector.
    Dense(Vec<f64>),
}

/// A trained model that can project documents into its vector space.
pub trait TopicInference {
    fn kind(&self) -> ModelKind;

    /// Length of every vector this model produces. Fixed at training time.
    fn dimension(&self) -> usize;

    fn infer_native(&self, input: &InferenceInput<'_>) -> Result<NativeVector, PipelineError>;
}
