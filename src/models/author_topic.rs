// Author-Topic model.
//
// Every module, lesson and item of the course is treated as an "author" of the
// documents under it, so each document has exactly three authors. The sampler
// assigns each token an (author, topic) pair; the learned per-author topic
// mixtures are what the model knows about course material.
//
// A discussion post has no author in the training data. It is inferred as a
// transient author whose only document is the post itself. That author lives
// for one call and is never written back into the model, so posts cannot leak
// state into each other.

use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::corpus::{BagOfWords, DocIndexMapping, DocumentId, Level};
use crate::error::PipelineError;

use super::sampler::{expand_bow, fold_in, normalize, sample_discrete};
use super::traits::{InferenceInput, NativeVector, TopicInference};
use super::ModelKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorTopicParams {
    pub num_topics: usize,
    pub iterations: usize,
    /// Author-topic prior. `None` means 1 / num_topics.
    pub alpha: Option<f64>,
    /// Topic-word prior. `None` means 1 / num_topics.
    pub beta: Option<f64>,
}

impl Default for AuthorTopicParams {
    fn default() -> Self {
        Self {
            num_topics: 100,
            iterations: 100,
            alpha: None,
            beta: None,
        }
    }
}

/// Turn the hierarchy mapping into author name -> documents.
///
/// Names carry the level prefix ("M: Week 1") so a module and an item that
/// share a name stay separate authors. Fails if a group points past the end
/// of the corpus.
pub fn author_groups(
    mapping: &DocIndexMapping,
    doc_count: usize,
) -> Result<IndexMap<String, Vec<DocumentId>>, PipelineError> {
    let mut groups = IndexMap::new();
    for level in Level::ALL {
        for (name, ids) in mapping.level(level) {
            if let Some(&bad) = ids.iter().find(|id| id.index() >= doc_count) {
                return Err(PipelineError::config(format!(
                    "author group '{}: {name}' references document {bad}, corpus has {doc_count}",
                    level.prefix()
                )));
            }
            groups.insert(format!("{}: {name}", level.prefix()), ids.clone());
        }
    }
    Ok(groups)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorTopicModel {
    pub num_topics: usize,
    pub alpha: f64,
    pub beta: f64,
    pub inference_iterations: usize,
    /// Author names in training order; an author's index is its position here.
    pub authors: Vec<String>,
    /// Author indices of each training document.
    pub doc_authors: Vec<Vec<usize>>,
    /// Smoothed topic mixture per author.
    pub author_topic: Vec<Vec<f64>>,
    pub topic_word: Vec<Vec<f64>>,
}

impl AuthorTopicModel {
    pub fn train<R: Rng>(
        rng: &mut R,
        bows: &[BagOfWords],
        num_terms: usize,
        author2doc: &IndexMap<String, Vec<DocumentId>>,
        params: &AuthorTopicParams,
        inference_iterations: usize,
    ) -> Result<Self, PipelineError> {
        let k = params.num_topics;
        if k == 0 {
            return Err(PipelineError::training(
                ModelKind::AuthorTopic,
                "num_topics must be positive",
            ));
        }
        if num_terms == 0 || bows.iter().all(Vec::is_empty) {
            return Err(PipelineError::training(ModelKind::AuthorTopic, "corpus has no tokens"));
        }

        let mut doc_authors: Vec<Vec<usize>> = vec![Vec::new(); bows.len()];
        for (author, (name, ids)) in author2doc.iter().enumerate() {
            for &id in ids {
                let slot = doc_authors.get_mut(id.index()).ok_or_else(|| {
                    PipelineError::config(format!(
                        "author '{name}' references document {id}, corpus has {}",
                        bows.len()
                    ))
                })?;
                if !slot.contains(&author) {
                    slot.push(author);
                }
            }
        }
        if let Some(orphan) = doc_authors.iter().position(Vec::is_empty) {
            return Err(PipelineError::config(format!(
                "document {orphan} has no author"
            )));
        }

        let default_prior = 1.0 / k as f64;
        let alpha = params.alpha.unwrap_or(default_prior);
        let beta = params.beta.unwrap_or(default_prior);
        let num_authors = author2doc.len();
        let v_beta = num_terms as f64 * beta;
        let k_alpha = k as f64 * alpha;

        let words: Vec<Vec<usize>> = bows.iter().map(expand_bow).collect();
        let mut author_counts = vec![vec![0u32; k]; num_authors];
        let mut author_total = vec![0u32; num_authors];
        let mut topic_word = vec![vec![0u32; num_terms]; k];
        let mut topic_total = vec![0u32; k];
        let mut assignments: Vec<Vec<(usize, usize)>> = Vec::with_capacity(words.len());

        for (d, doc) in words.iter().enumerate() {
            let authors = &doc_authors[d];
            let mut doc_assignments = Vec::with_capacity(doc.len());
            for &word in doc {
                let author = authors[rng.random_range(0..authors.len())];
                let topic = rng.random_range(0..k);
                author_counts[author][topic] += 1;
                author_total[author] += 1;
                topic_word[topic][word] += 1;
                topic_total[topic] += 1;
                doc_assignments.push((author, topic));
            }
            assignments.push(doc_assignments);
        }

        let mut weights = Vec::new();
        for iteration in 0..params.iterations {
            for (d, doc) in words.iter().enumerate() {
                let authors = &doc_authors[d];
                for (i, &word) in doc.iter().enumerate() {
                    let (old_author, old_topic) = assignments[d][i];
                    author_counts[old_author][old_topic] -= 1;
                    author_total[old_author] -= 1;
                    topic_word[old_topic][word] -= 1;
                    topic_total[old_topic] -= 1;

                    // Joint weights laid out author-major: index = a * k + t.
                    weights.clear();
                    for &a in authors {
                        let author_denom = author_total[a] as f64 + k_alpha;
                        for t in 0..k {
                            weights.push(
                                (author_counts[a][t] as f64 + alpha) / author_denom
                                    * (topic_word[t][word] as f64 + beta)
                                    / (topic_total[t] as f64 + v_beta),
                            );
                        }
                    }
                    let pick = sample_discrete(rng, &weights);
                    let (author, topic) = (authors[pick / k], pick % k);

                    author_counts[author][topic] += 1;
                    author_total[author] += 1;
                    topic_word[topic][word] += 1;
                    topic_total[topic] += 1;
                    assignments[d][i] = (author, topic);
                }
            }
            if (iteration + 1) % 25 == 0 {
                debug!(iteration = iteration + 1, "Author-Topic sweep");
            }
        }

        let author_topic = author_counts
            .iter()
            .zip(&author_total)
            .map(|(row, &total)| {
                let denom = total as f64 + k_alpha;
                row.iter().map(|&n| (n as f64 + alpha) / denom).collect()
            })
            .collect();
        let topic_word = topic_word
            .iter()
            .zip(&topic_total)
            .map(|(row, &total)| {
                let denom = total as f64 + v_beta;
                row.iter().map(|&n| (n as f64 + beta) / denom).collect()
            })
            .collect();

        Ok(Self {
            num_topics: k,
            alpha,
            beta,
            inference_iterations,
            authors: author2doc.keys().cloned().collect(),
            doc_authors,
            author_topic,
            topic_word,
        })
    }

    /// Even blend of a training document's author mixtures.
    fn author_mixture(&self, id: DocumentId) -> Result<Vec<f64>, PipelineError> {
        let authors = id.lookup(&self.doc_authors)?;
        let mut mixture = vec![0.0; self.num_topics];
        for &a in authors {
            for (m, p) in mixture.iter_mut().zip(&self.author_topic[a]) {
                *m += p;
            }
        }
        normalize(&mut mixture);
        Ok(mixture)
    }

    /// Topic mixture of a training document, folded in over its own tokens.
    ///
    /// Same estimator as `infer_transient_author`, but the prior takes the
    /// shape of the document's author blend. Prior mass is `alpha * K` in
    /// both cases.
    pub fn document_topics(
        &self,
        id: DocumentId,
        bow: &BagOfWords,
    ) -> Result<Vec<f64>, PipelineError> {
        let mass = self.alpha * self.num_topics as f64;
        let prior: Vec<f64> = self
            .author_mixture(id)?
            .into_iter()
            .map(|p| p * mass)
            .collect();
        Ok(fold_in(&self.topic_word, &prior, bow, self.inference_iterations))
    }

    /// Topic mixture of a one-off author whose single document is `bow`.
    ///
    /// Takes `&self`: the transient author is discarded when this returns.
    pub fn infer_transient_author(&self, author: &str, bow: &BagOfWords) -> Vec<f64> {
        trace!(author, tokens = bow.len(), "Inferring transient author");
        let prior = vec![self.alpha; self.num_topics];
        fold_in(&self.topic_word, &prior, bow, self.inference_iterations)
    }
}

impl TopicInference for AuthorTopicModel {
    fn kind(&self) -> ModelKind {
        ModelKind::AuthorTopic
    }

    fn dimension(&self) -> usize {
        self.num_topics
    }

    fn infer_native(&self, input: &InferenceInput<'_>) -> Result<NativeVector, PipelineError> {
        let row = match *input {
            InferenceInput::Material { id, bow, .. } => self.document_topics(id, bow)?,
            InferenceInput::Post { id, bow, .. } => self.infer_transient_author(id, bow),
        };
        Ok(NativeVector::Batch(vec![row]))
    }
}
