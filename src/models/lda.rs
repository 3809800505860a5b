// Unsupervised LDA, trained by collapsed Gibbs sampling.
//
// The topic count is fixed by configuration. Two runs with different seeds give
// different topics; what must stay deterministic is inference against one
// trained model, which `fold_in` guarantees.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corpus::BagOfWords;
use crate::error::PipelineError;

use super::sampler::{fold_in, CollapsedGibbs};
use super::traits::{InferenceInput, NativeVector, TopicInference};
use super::ModelKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LdaParams {
    pub num_topics: usize,
    pub iterations: usize,
    /// Document-topic prior. `None` means 1 / num_topics.
    pub alpha: Option<f64>,
    /// Topic-word prior. `None` means 1 / num_topics.
    pub eta: Option<f64>,
}

impl Default for LdaParams {
    fn default() -> Self {
        Self {
            num_topics: 100,
            iterations: 100,
            alpha: None,
            eta: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdaModel {
    pub num_topics: usize,
    pub alpha: f64,
    pub eta: f64,
    pub inference_iterations: usize,
    /// Topic-word distributions, num_topics rows of dictionary length.
    pub topic_word: Vec<Vec<f64>>,
}

impl LdaModel {
    pub fn train<R: Rng>(
        rng: &mut R,
        bows: &[BagOfWords],
        num_terms: usize,
        params: &LdaParams,
        inference_iterations: usize,
    ) -> Result<Self, PipelineError> {
        if params.num_topics == 0 {
            return Err(PipelineError::training(ModelKind::Lda, "num_topics must be positive"));
        }
        if num_terms == 0 || bows.iter().all(Vec::is_empty) {
            return Err(PipelineError::training(ModelKind::Lda, "corpus has no tokens"));
        }

        let default_prior = 1.0 / params.num_topics as f64;
        let alpha = params.alpha.unwrap_or(default_prior);
        let eta = params.eta.unwrap_or(default_prior);

        let mut gibbs = CollapsedGibbs::new(rng, bows, num_terms, params.num_topics, alpha, eta, None);
        for iteration in 0..params.iterations {
            gibbs.sweep(rng);
            if (iteration + 1) % 25 == 0 {
                debug!(iteration = iteration + 1, "LDA sweep");
            }
        }

        Ok(Self {
            num_topics: params.num_topics,
            alpha,
            eta,
            inference_iterations,
            topic_word: gibbs.topic_word_distribution(),
        })
    }

    /// Topic mixtures for a chunk of documents, one row per document.
    pub fn infer_chunk(&self, chunk: &[&BagOfWords]) -> Vec<Vec<f64>> {
        let prior = vec![self.alpha; self.num_topics];
        chunk
            .iter()
            .map(|bow| fold_in(&self.topic_word, &prior, bow, self.inference_iterations))
            .collect()
    }
}

impl TopicInference for LdaModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Lda
    }

    fn dimension(&self) -> usize {
        self.num_topics
    }

    fn infer_native(&self, input: &InferenceInput<'_>) -> Result<NativeVector, PipelineError> {
        Ok(NativeVector::Batch(self.infer_chunk(&[input.bow()])))
    }
}
