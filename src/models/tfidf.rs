// TF-IDF weighting — the sparse baseline.
//
// Closed form, no hyperparameters: raw term count times log2(N / df), then
// L2-normalized. Terms that occur in every document get an idf of zero and
// drop out of the sparse output, as do ids the corpus never saw.

use serde::{Deserialize, Serialize};

use crate::corpus::BagOfWords;
use crate::error::PipelineError;

use super::traits::{InferenceInput, NativeVector, TopicInference};
use super::ModelKind;

/// Weights below this magnitude are dropped from the sparse output.
const WEIGHT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfIdfModel {
    /// Number of documents the idfs were computed over.
    pub num_docs: usize,
    /// One idf per dictionary id.
    pub idfs: Vec<f64>,
}

impl TfIdfModel {
    pub fn train(bows: &[BagOfWords], num_terms: usize) -> Result<Self, PipelineError> {
        if bows.is_empty() {
            return Err(PipelineError::training(
                ModelKind::Tfidf,
                "cannot compute document frequencies over an empty corpus",
            ));
        }

        let mut dfs = vec![0usize; num_terms];
        for bow in bows {
            for &(id, _) in bow {
                let df = dfs.get_mut(id).ok_or_else(|| {
                    PipelineError::training(
                        ModelKind::Tfidf,
                        format!("token id {id} outside a dictionary of {num_terms} terms"),
                    )
                })?;
                *df += 1;
            }
        }

        let n = bows.len() as f64;
        let idfs = dfs
            .into_iter()
            .map(|df| if df == 0 { 0.0 } else { (n / df as f64).log2() })
            .collect();

        Ok(Self {
            num_docs: bows.len(),
            idfs,
        })
    }

    /// Sparse, L2-normalized TF-IDF weights for one bag of words.
    pub fn transform(&self, bow: &BagOfWords) -> Vec<(usize, f64)> {
        let mut weights: Vec<(usize, f64)> = bow
            .iter()
            .filter_map(|&(id, count)| self.idfs.get(id).map(|idf| (id, count as f64 * idf)))
            .collect();

        let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in weights.iter_mut() {
                *w /= norm;
            }
        }
        weights.retain(|(_, w)| w.abs() > WEIGHT_EPSILON);
        weights
    }
}

impl TopicInference for TfIdfModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Tfidf
    }

    fn dimension(&self) -> usize {
        self.idfs.len()
    }

    fn infer_native(&self, input: &InferenceInput<'_>) -> Result<NativeVector, PipelineError> {
        Ok(NativeVector::Sparse(self.transform(input.bow())))
    }
}
