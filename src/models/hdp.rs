// Hierarchical Dirichlet process topic model.
//
// Direct-assignment Gibbs sampler with a truncation cap: a token may open a new
// topic while fewer than `max_topics` exist. Topics left empty after a sweep
// are dropped, so the final topic count is whatever the sampler settled on.
//
// The global topic weights are refreshed after every sweep from the number of
// documents using each topic (a table-count approximation) rather than from an
// auxiliary-variable draw.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corpus::BagOfWords;
use crate::error::PipelineError;

use super::sampler::{expand_bow, fold_in, normalize, sample_discrete};
use super::traits::{InferenceInput, NativeVector, TopicInference};
use super::ModelKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HdpParams {
    /// Truncation level: the sampler never holds more topics than this.
    pub max_topics: usize,
    pub iterations: usize,
    /// Document-level concentration.
    pub alpha: f64,
    /// Corpus-level concentration.
    pub gamma: f64,
    /// Topic-word prior.
    pub eta: f64,
}

impl Default for HdpParams {
    fn default() -> Self {
        Self {
            max_topics: 150,
            iterations: 100,
            alpha: 1.0,
            gamma: 1.0,
            eta: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HdpModel {
    pub params: HdpParams,
    pub inference_iterations: usize,
    /// Document-topic prior for inference: alpha times each topic's global weight.
    pub topic_prior: Vec<f64>,
    pub topic_word: Vec<Vec<f64>>,
}

/// Sampler state. Topic-indexed vectors grow and shrink together.
struct HdpState {
    num_terms: usize,
    words: Vec<Vec<usize>>,
    assignments: Vec<Vec<Option<usize>>>,
    doc_topic: Vec<Vec<u32>>,
    topic_word: Vec<Vec<u32>>,
    topic_total: Vec<u32>,
    /// One weight per topic plus the unassigned mass in the last slot.
    beta: Vec<f64>,
}

impl HdpState {
    fn new(bows: &[BagOfWords], num_terms: usize) -> Self {
        let words: Vec<Vec<usize>> = bows.iter().map(expand_bow).collect();
        Self {
            num_terms,
            assignments: words.iter().map(|w| vec![None; w.len()]).collect(),
            doc_topic: vec![Vec::new(); words.len()],
            topic_word: Vec::new(),
            topic_total: Vec::new(),
            beta: vec![1.0],
            words,
        }
    }

    fn num_topics(&self) -> usize {
        self.topic_total.len()
    }

    fn open_topic<R: Rng>(&mut self, rng: &mut R, gamma: f64) -> usize {
        self.topic_word.push(vec![0; self.num_terms]);
        self.topic_total.push(0);
        for row in &mut self.doc_topic {
            row.push(0);
        }
        // Stick-breaking split of the unassigned mass, b ~ Beta(1, gamma).
        let u: f64 = rng.random();
        let b = 1.0 - (1.0 - u).powf(1.0 / gamma);
        let unassigned = self.beta.pop().unwrap_or(1.0);
        self.beta.push(b * unassigned);
        self.beta.push((1.0 - b) * unassigned);
        self.num_topics() - 1
    }

    fn sweep<R: Rng>(&mut self, rng: &mut R, params: &HdpParams) {
        let v_eta = self.num_terms as f64 * params.eta;
        let mut weights = Vec::new();

        for d in 0..self.words.len() {
            for i in 0..self.words[d].len() {
                let word = self.words[d][i];
                if let Some(old) = self.assignments[d][i] {
                    self.doc_topic[d][old] -= 1;
                    self.topic_word[old][word] -= 1;
                    self.topic_total[old] -= 1;
                }

                let k_count = self.num_topics();
                weights.clear();
                weights.extend((0..k_count).map(|k| {
                    (self.doc_topic[d][k] as f64 + params.alpha * self.beta[k])
                        * (self.topic_word[k][word] as f64 + params.eta)
                        / (self.topic_total[k] as f64 + v_eta)
                }));
                let new_weight = if k_count < params.max_topics {
                    params.alpha * self.beta[k_count] / self.num_terms as f64
                } else {
                    0.0
                };
                weights.push(new_weight);

                let mut topic = sample_discrete(rng, &weights);
                if topic == k_count {
                    topic = self.open_topic(rng, params.gamma);
                }

                self.doc_topic[d][topic] += 1;
                self.topic_word[topic][word] += 1;
                self.topic_total[topic] += 1;
                self.assignments[d][i] = Some(topic);
            }
        }

        self.drop_empty_topics();
        self.refresh_beta(params.gamma);
    }

    fn drop_empty_topics(&mut self) {
        let keep: Vec<usize> = (0..self.num_topics())
            .filter(|&k| self.topic_total[k] > 0)
            .collect();
        if keep.len() == self.num_topics() {
            return;
        }

        let mut remap = vec![None; self.num_topics()];
        for (new, &old) in keep.iter().enumerate() {
            remap[old] = Some(new);
        }

        for doc in &mut self.assignments {
            for slot in doc.iter_mut() {
                *slot = slot.and_then(|old| remap[old]);
            }
        }
        for row in &mut self.doc_topic {
            *row = keep.iter().map(|&k| row[k]).collect();
        }
        self.topic_word = keep.iter().map(|&k| self.topic_word[k].clone()).collect();
        self.topic_total = keep.iter().map(|&k| self.topic_total[k]).collect();
    }

    fn refresh_beta(&mut self, gamma: f64) {
        let mut beta: Vec<f64> = (0..self.num_topics())
            .map(|k| self.doc_topic.iter().filter(|row| row[k] > 0).count() as f64)
            .collect();
        beta.push(gamma);
        normalize(&mut beta);
        self.beta = beta;
    }
}

impl HdpModel {
    pub fn train<R: Rng>(
        rng: &mut R,
        bows: &[BagOfWords],
        num_terms: usize,
        params: &HdpParams,
        inference_iterations: usize,
    ) -> Result<Self, PipelineError> {
        if params.max_topics == 0 {
            return Err(PipelineError::training(ModelKind::Hdp, "max_topics must be positive"));
        }
        if params.alpha <= 0.0 || params.gamma <= 0.0 || params.eta <= 0.0 {
            return Err(PipelineError::training(
                ModelKind::Hdp,
                "alpha, gamma and eta must be positive",
            ));
        }
        if num_terms == 0 || bows.iter().all(Vec::is_empty) {
            return Err(PipelineError::training(ModelKind::Hdp, "corpus has no tokens"));
        }

        let mut state = HdpState::new(bows, num_terms);
        for iteration in 0..params.iterations.max(1) {
            state.sweep(rng, params);
            debug!(
                iteration = iteration + 1,
                topics = state.num_topics(),
                "HDP sweep"
            );
        }

        let v_eta = num_terms as f64 * params.eta;
        let topic_word: Vec<Vec<f64>> = state
            .topic_word
            .iter()
            .zip(&state.topic_total)
            .map(|(row, &total)| {
                let denom = total as f64 + v_eta;
                row.iter().map(|&n| (n as f64 + params.eta) / denom).collect()
            })
            .collect();
        let topic_prior: Vec<f64> = state.beta[..state.num_topics()]
            .iter()
            .map(|b| params.alpha * b)
            .collect();

        if topic_word.is_empty() {
            return Err(PipelineError::training(ModelKind::Hdp, "sampler ended with no topics"));
        }

        Ok(Self {
            params: params.clone(),
            inference_iterations,
            topic_prior,
            topic_word,
        })
    }

    pub fn num_topics(&self) -> usize {
        self.topic_word.len()
    }

    pub fn infer_chunk(&self, chunk: &[&BagOfWords]) -> Vec<Vec<f64>> {
        chunk
            .iter()
            .map(|bow| fold_in(&self.topic_word, &self.topic_prior, bow, self.inference_iterations))
            .collect()
    }
}

impl TopicInference for HdpModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Hdp
    }

    fn dimension(&self) -> usize {
        self.num_topics()
    }

    fn infer_native(&self, input: &InferenceInput<'_>) -> Result<NativeVector, PipelineError> {
        Ok(NativeVector::Batch(self.infer_chunk(&[input.bow()])))
    }
}
