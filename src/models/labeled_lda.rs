// Labeled LDA — one topic per hierarchy label, each document restricted to its own.
//
// A document's label set is its module, lesson and item ("M: ..", "L: ..",
// "I: .."), so the topic count equals the number of distinct labels in the
// course. The model keeps its own vocabulary and infers from raw tokens.

use indexmap::IndexSet;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corpus::{BagOfWords, DocIndexMapping, Dictionary, Document};
use crate::error::PipelineError;

use super::sampler::{fold_in, CollapsedGibbs};
use super::traits::{InferenceInput, NativeVector, TopicInference};
use super::ModelKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledLdaParams {
    pub alpha: f64,
    pub beta: f64,
    pub iterations: usize,
}

impl Default for LabeledLdaParams {
    fn default() -> Self {
        Self {
            alpha: 0.01,
            beta: 0.001,
            iterations: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledLdaModel {
    pub params: LabeledLdaParams,
    pub inference_iterations: usize,
    pub vocabulary: Dictionary,
    /// Topic names; topic k is `labels[k]`.
    pub labels: Vec<String>,
    pub topic_word: Vec<Vec<f64>>,
}

impl LabeledLdaModel {
    /// Train on the course documents, labelling each from `mapping`.
    ///
    /// Every document must resolve a module, lesson and item; a document
    /// missing from any level is a configuration error.
    pub fn train<R: Rng>(
        rng: &mut R,
        documents: &[Document],
        mapping: &DocIndexMapping,
        params: &LabeledLdaParams,
        inference_iterations: usize,
    ) -> Result<Self, PipelineError> {
        if params.alpha <= 0.0 || params.beta <= 0.0 {
            return Err(PipelineError::training(
                ModelKind::LabeledLda,
                "alpha and beta must be positive",
            ));
        }

        let doc_labels = mapping.invert(documents.len())?;
        let vocabulary = Dictionary::from_documents(documents);
        if vocabulary.is_empty() {
            return Err(PipelineError::training(ModelKind::LabeledLda, "corpus has no tokens"));
        }

        let mut labels: IndexSet<String> = IndexSet::new();
        let mut allowed: Vec<Vec<usize>> = Vec::with_capacity(documents.len());
        for triple in doc_labels.values() {
            allowed.push(
                triple
                    .label_set()
                    .into_iter()
                    .map(|label| labels.insert_full(label).0)
                    .collect(),
            );
        }

        let bows: Vec<BagOfWords> = documents.iter().map(|doc| vocabulary.doc2bow(doc)).collect();
        let mut gibbs = CollapsedGibbs::new(
            rng,
            &bows,
            vocabulary.len(),
            labels.len(),
            params.alpha,
            params.beta,
            Some(allowed),
        );
        for iteration in 0..params.iterations {
            gibbs.sweep(rng);
            if (iteration + 1) % 10 == 0 {
                debug!(iteration = iteration + 1, labels = labels.len(), "Labeled-LDA sweep");
            }
        }

        Ok(Self {
            params: params.clone(),
            inference_iterations,
            vocabulary,
            labels: labels.into_iter().collect(),
            topic_word: gibbs.topic_word_distribution(),
        })
    }

    pub fn num_topics(&self) -> usize {
        self.labels.len()
    }

    /// Label distribution of a raw token list. Unknown tokens are ignored.
    pub fn infer_tokens(&self, tokens: &[String]) -> Vec<f64> {
        let bow = self.vocabulary.doc2bow(tokens);
        let prior = vec![self.params.alpha; self.num_topics()];
        fold_in(&self.topic_word, &prior, &bow, self.inference_iterations)
    }
}

impl TopicInference for LabeledLdaModel {
    fn kind(&self) -> ModelKind {
        ModelKind::LabeledLda
    }

    fn dimension(&self) -> usize {
        self.num_topics()
    }

    fn infer_native(&self, input: &InferenceInput<'_>) -> Result<NativeVector, PipelineError> {
        Ok(NativeVector::Dense(self.infer_tokens(input.tokens())))
    }
}
