// Evaluation — mean reciprocal rank of every ranking against human labels.
//
// A seeded base sample of labelled questions is drawn without replacement,
// then optionally bootstrap-resampled with replacement to a larger size.
// Reciprocal rank is 1 / (1 + position of the labelled document). Everything
// here is read-only with respect to the stored artifacts.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::corpus::DocumentId;
use crate::error::PipelineError;
use crate::ranking::{CourseRankings, DistanceMetric, RankingKind};

/// A stored label: a material document id, or negative for "unlabelable".
/// Older label files wrote the id as a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawLabel {
    Id(i64),
    Text(String),
}

impl RawLabel {
    fn value(&self) -> Result<i64, PipelineError> {
        match self {
            RawLabel::Id(v) => Ok(*v),
            RawLabel::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| PipelineError::config(format!("label '{s}' is not an integer"))),
        }
    }
}

/// On-disk shape of a course's label store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelFile {
    #[serde(default)]
    questions: BTreeMap<String, RawLabel>,
}

/// Human-assigned traceability labels for one course's questions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundTruth {
    labels: BTreeMap<String, DocumentId>,
    unlabelable: usize,
}

impl GroundTruth {
    pub fn from_label_file(file: &LabelFile) -> Result<Self, PipelineError> {
        let mut truth = GroundTruth::default();
        for (post_id, raw) in &file.questions {
            let value = raw.value()?;
            if value < 0 {
                truth.unlabelable += 1;
            } else {
                truth.insert(post_id.clone(), DocumentId::new(value as usize));
            }
        }
        Ok(truth)
    }

    pub fn from_json(text: &str) -> Result<Self, PipelineError> {
        let file: LabelFile = serde_json::from_str(text)
            .map_err(|e| PipelineError::config(format!("malformed label file: {e}")))?;
        Self::from_label_file(&file)
    }

    pub fn insert(&mut self, post_id: String, document: DocumentId) {
        self.labels.insert(post_id, document);
    }

    pub fn get(&self, post_id: &str) -> Option<DocumentId> {
        self.labels.get(post_id).copied()
    }

    /// Number of usable labels; "unlabelable" entries are not counted.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn unlabelable(&self) -> usize {
        self.unlabelable
    }

    /// Labelled post ids in sorted order.
    pub fn post_ids(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub seed: u64,
    /// Size of the base sample; also the minimum number of labels required.
    pub sample_size: usize,
    /// Bootstrap resample size. Zero evaluates the base sample as drawn.
    pub bootstrap_size: usize,
    pub metric: DistanceMetric,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            sample_size: 100,
            bootstrap_size: 1000,
            metric: DistanceMetric::Cosine,
        }
    }
}

/// 1 / (1 + zero-based position of `target` in `ranked`).
///
/// Every material document must be in every ranking, so a missing target is
/// an invariant violation rather than a miss.
pub fn reciprocal_rank(ranked: &[(DocumentId, f64)], target: DocumentId) -> Result<f64, PipelineError> {
    ranked
        .iter()
        .position(|(id, _)| *id == target)
        .map(|idx| 1.0 / (idx + 1) as f64)
        .ok_or_else(|| {
            PipelineError::RankingInvariant(format!(
                "document {target} missing from a ranking of {} documents",
                ranked.len()
            ))
        })
}

/// Draw the evaluation sample of labelled post ids.
pub fn draw_sample<'a>(
    truth: &'a GroundTruth,
    config: &EvaluationConfig,
) -> Result<Vec<&'a str>, PipelineError> {
    if config.sample_size == 0 {
        return Err(PipelineError::config("sample size must be positive"));
    }
    if truth.len() < config.sample_size {
        return Err(PipelineError::InsufficientLabels {
            have: truth.len(),
            need: config.sample_size,
        });
    }

    let ids: Vec<&str> = truth.post_ids().collect();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let base: Vec<&str> = index::sample(&mut rng, ids.len(), config.sample_size)
        .into_iter()
        .map(|i| ids[i])
        .collect();

    if config.bootstrap_size == 0 {
        return Ok(base);
    }
    Ok((0..config.bootstrap_size)
        .map(|_| base[rng.random_range(0..base.len())])
        .collect())
}

/// Summary statistics of one ranking's reciprocal ranks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingSummary {
    pub kind: RankingKind,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; zero for fewer than two values.
    pub stdev: f64,
    pub median: f64,
}

impl RankingSummary {
    pub fn from_values(kind: RankingKind, values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                kind,
                count,
                mean: 0.0,
                stdev: 0.0,
                median: 0.0,
            };
        }
        let mean = values.iter().sum::<f64>() / count as f64;
        let stdev = if count < 2 {
            0.0
        } else {
            let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        };
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };
        Self {
            kind,
            count,
            mean,
            stdev,
            median,
        }
    }
}

/// Result of evaluating one course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseEvaluation {
    pub course: String,
    pub metric: DistanceMetric,
    pub labelled: usize,
    pub unlabelable: usize,
    pub evaluated: usize,
    /// One entry per ranking kind, in display order.
    pub summaries: Vec<RankingSummary>,
}

impl CourseEvaluation {
    pub fn summary(&self, kind: RankingKind) -> Option<&RankingSummary> {
        self.summaries.iter().find(|s| s.kind == kind)
    }
}

/// Score every ranking of `rankings` against `truth`.
pub fn evaluate(
    rankings: &CourseRankings,
    truth: &GroundTruth,
    config: &EvaluationConfig,
) -> Result<CourseEvaluation, PipelineError> {
    let sample = draw_sample(truth, config)?;
    debug!(
        course = %rankings.course,
        sample = sample.len(),
        seed = config.seed,
        "Drew evaluation sample"
    );

    let mut reciprocal_ranks: BTreeMap<RankingKind, Vec<f64>> = BTreeMap::new();
    for post_id in &sample {
        let target = truth
            .get(post_id)
            .ok_or_else(|| PipelineError::RankingInvariant(format!("post {post_id} lost its label")))?;
        let lists = rankings.question(config.metric, post_id).ok_or_else(|| {
            PipelineError::RankingInvariant(format!(
                "labelled post {post_id} has no {} ranking",
                config.metric
            ))
        })?;
        for kind in RankingKind::DISPLAY_ORDER {
            let list = lists.get(&kind).ok_or_else(|| {
                PipelineError::RankingInvariant(format!("post {post_id} has no {} list", kind.rank_name()))
            })?;
            reciprocal_ranks
                .entry(kind)
                .or_default()
                .push(reciprocal_rank(list, target)?);
        }
    }

    let summaries: Vec<RankingSummary> = RankingKind::DISPLAY_ORDER
        .iter()
        .map(|kind| {
            let values = reciprocal_ranks.get(kind).map(Vec::as_slice).unwrap_or(&[]);
            RankingSummary::from_values(*kind, values)
        })
        .collect();

    info!(
        course = %rankings.course,
        metric = %config.metric,
        evaluated = sample.len(),
        "Evaluated rankings"
    );

    Ok(CourseEvaluation {
        course: rankings.course.clone(),
        metric: config.metric,
        labelled: truth.len(),
        unlabelable: truth.unlabelable(),
        evaluated: sample.len(),
        summaries,
    })
}
