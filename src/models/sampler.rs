// Shared machinery for the Gibbs-sampled topic models.
//
// Training is stochastic and driven by a seeded StdRng owned by the caller.
// Inference is not: `fold_in` is a fixed-point iteration over the trained
// topic-word distributions, so the same model and document always give the
// same vector.

use rand::Rng;

use crate::corpus::BagOfWords;

/// Draw an index with probability proportional to `weights`.
///
/// Weights must be non-negative with a positive sum.
pub(crate) fn sample_discrete<R: Rng>(rng: &mut R, weights: &[f64]) -> usize {
    let total: f64 = weights.iter().sum();
    let mut target = rng.random::<f64>() * total;
    for (i, &w) in weights.iter().enumerate() {
        if target < w {
            return i;
        }
        target -= w;
    }
    // Rounding left us past the end; land on the last index that can be drawn.
    weights
        .iter()
        .rposition(|&w| w > 0.0)
        .unwrap_or(weights.len().saturating_sub(1))
}

/// Scale `values` to sum to 1. An all-zero vector becomes uniform.
pub(crate) fn normalize(values: &mut [f64]) {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        for v in values.iter_mut() {
            *v /= sum;
        }
    } else if !values.is_empty() {
        let uniform = 1.0 / values.len() as f64;
        values.iter_mut().for_each(|v| *v = uniform);
    }
}

/// Expand (token_id, count) pairs into one entry per token occurrence.
pub(crate) fn expand_bow(bow: &BagOfWords) -> Vec<usize> {
    bow.iter()
        .flat_map(|&(id, count)| std::iter::repeat_n(id, count as usize))
        .collect()
}

/// Estimate a document's topic mixture with the topic-word distributions held
/// fixed.
///
/// Starts from the normalized prior and repeats
/// `theta_k <- prior_k + sum_w n_w * theta_k * phi_kw / sum_j theta_j * phi_jw`
/// followed by normalization. Token ids outside the model's vocabulary are
/// ignored. A document with no usable tokens gets the normalized prior.
pub(crate) fn fold_in(
    topic_word: &[Vec<f64>],
    prior: &[f64],
    bow: &BagOfWords,
    iterations: usize,
) -> Vec<f64> {
    let num_topics = topic_word.len();
    let mut theta = prior.to_vec();
    normalize(&mut theta);

    let usable: Vec<(usize, f64)> = bow
        .iter()
        .filter(|(id, _)| topic_word.first().is_some_and(|row| *id < row.len()))
        .map(|&(id, count)| (id, count as f64))
        .collect();
    if usable.is_empty() || num_topics == 0 {
        return theta;
    }

    let mut responsibility = vec![0.0; num_topics];
    for _ in 0..iterations {
        let mut next = prior.to_vec();
        for &(word, count) in &usable {
            let mut denom = 0.0;
            for (k, r) in responsibility.iter_mut().enumerate() {
                *r = theta[k] * topic_word[k][word];
                denom += *r;
            }
            if denom <= 0.0 {
                continue;
            }
            for (k, r) in responsibility.iter().enumerate() {
                next[k] += count * r / denom;
            }
        }
        normalize(&mut next);
        theta = next;
    }
    theta
}

/// Collapsed Gibbs sampler shared by LDA and Labeled-LDA.
///
/// With `allowed` set, document d may only use the topics listed in
/// `allowed[d]` (the Labeled-LDA constraint). Without it every topic is open.
pub(crate) struct CollapsedGibbs {
    num_topics: usize,
    num_terms: usize,
    alpha: f64,
    eta: f64,
    words: Vec<Vec<usize>>,
    assignments: Vec<Vec<usize>>,
    doc_topic: Vec<Vec<u32>>,
    topic_word: Vec<Vec<u32>>,
    topic_total: Vec<u32>,
    allowed: Option<Vec<Vec<usize>>>,
}

impl CollapsedGibbs {
    pub(crate) fn new<R: Rng>(
        rng: &mut R,
        bows: &[BagOfWords],
        num_terms: usize,
        num_topics: usize,
        alpha: f64,
        eta: f64,
        allowed: Option<Vec<Vec<usize>>>,
    ) -> Self {
        let words: Vec<Vec<usize>> = bows.iter().map(expand_bow).collect();
        let mut state = Self {
            num_topics,
            num_terms,
            alpha,
            eta,
            assignments: Vec::with_capacity(words.len()),
            doc_topic: vec![vec![0; num_topics]; words.len()],
            topic_word: vec![vec![0; num_terms]; num_topics],
            topic_total: vec![0; num_topics],
            words,
            allowed,
        };

        for d in 0..state.words.len() {
            let mut doc_assignments = Vec::with_capacity(state.words[d].len());
            for i in 0..state.words[d].len() {
                let topic = match &state.allowed {
                    Some(allowed) => allowed[d][rng.random_range(0..allowed[d].len())],
                    None => rng.random_range(0..num_topics),
                };
                state.add(d, state.words[d][i], topic);
                doc_assignments.push(topic);
            }
            state.assignments.push(doc_assignments);
        }
        state
    }

    fn add(&mut self, doc: usize, word: usize, topic: usize) {
        self.doc_topic[doc][topic] += 1;
        self.topic_word[topic][word] += 1;
        self.topic_total[topic] += 1;
    }

    fn remove(&mut self, doc: usize, word: usize, topic: usize) {
        self.doc_topic[doc][topic] -= 1;
        self.topic_word[topic][word] -= 1;
        self.topic_total[topic] -= 1;
    }

    /// One pass over every token in the corpus.
    pub(crate) fn sweep<R: Rng>(&mut self, rng: &mut R) {
        let v_eta = self.num_terms as f64 * self.eta;
        let mut weights = Vec::with_capacity(self.num_topics);
        let mut candidates: Vec<usize> = Vec::with_capacity(self.num_topics);

        for d in 0..self.words.len() {
            candidates.clear();
            match &self.allowed {
                Some(allowed) => candidates.extend_from_slice(&allowed[d]),
                None => candidates.extend(0..self.num_topics),
            }

            for i in 0..self.words[d].len() {
                let word = self.words[d][i];
                let old = self.assignments[d][i];
                self.remove(d, word, old);

                weights.clear();
                weights.extend(candidates.iter().map(|&k| {
                    (self.doc_topic[d][k] as f64 + self.alpha)
                        * (self.topic_word[k][word] as f64 + self.eta)
                        / (self.topic_total[k] as f64 + v_eta)
                }));
                let topic = candidates[sample_discrete(rng, &weights)];

                self.add(d, word, topic);
                self.assignments[d][i] = topic;
            }
        }
    }

    /// Smoothed topic-word distributions, one row per topic.
    pub(crate) fn topic_word_distribution(&self) -> Vec<Vec<f64>> {
        let v_eta = self.num_terms as f64 * self.eta;
        self.topic_word
            .iter()
            .zip(&self.topic_total)
            .map(|(row, &total)| {
                let denom = total as f64 + v_eta;
                row.iter().map(|&n| (n as f64 + self.eta) / denom).collect()
            })
            .collect()
    }
}
