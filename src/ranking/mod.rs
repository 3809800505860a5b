// Distance ranking — every material document ordered against every post.
//
// Nine lists per post and metric: the five models on their own, plus TF-IDF
// concatenated with each of the four topic models. Lists are sorted ascending
// by distance with a stable sort, so equal distances keep DocumentId order.

pub mod distance;
pub mod forum;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::corpus::{DocLabels, DocumentId};
use crate::error::PipelineError;
use crate::inference::{CourseVectors, EvalRecord};
use crate::models::ModelKind;
use crate::output::progress_bar;

pub use self::distance::DistanceMetric;

/// (material document, distance) pairs, closest first.
pub type RankedList = Vec<(DocumentId, f64)>;

/// The nine named rankings produced for each post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RankingKind {
    #[serde(rename = "atm_rank")]
    Atm,
    #[serde(rename = "hdp_rank")]
    Hdp,
    #[serde(rename = "lda_rank")]
    Lda,
    #[serde(rename = "llda_rank")]
    Llda,
    #[serde(rename = "tfidf_rank")]
    Tfidf,
    #[serde(rename = "tfidf_with_atm_rank")]
    TfidfWithAtm,
    #[serde(rename = "tfidf_with_hdp_rank")]
    TfidfWithHdp,
    #[serde(rename = "tfidf_with_lda_rank")]
    TfidfWithLda,
    #[serde(rename = "tfidf_with_llda_rank")]
    TfidfWithLlda,
}

impl RankingKind {
    /// Order used when presenting results: single models, then fusions.
    pub const DISPLAY_ORDER: [RankingKind; 9] = [
        RankingKind::Tfidf,
        RankingKind::Atm,
        RankingKind::Lda,
        RankingKind::Hdp,
        RankingKind::Llda,
        RankingKind::TfidfWithAtm,
        RankingKind::TfidfWithLda,
        RankingKind::TfidfWithHdp,
        RankingKind::TfidfWithLlda,
    ];

    /// The model whose vectors this ranking compares.
    pub fn model(self) -> ModelKind {
        match self {
            RankingKind::Tfidf => ModelKind::Tfidf,
            RankingKind::Atm | RankingKind::TfidfWithAtm => ModelKind::AuthorTopic,
            RankingKind::Hdp | RankingKind::TfidfWithHdp => ModelKind::Hdp,
            RankingKind::Lda | RankingKind::TfidfWithLda => ModelKind::Lda,
            RankingKind::Llda | RankingKind::TfidfWithLlda => ModelKind::LabeledLda,
        }
    }

    /// True for the TF-IDF concatenations.
    pub fn is_fusion(self) -> bool {
        matches!(
            self,
            RankingKind::TfidfWithAtm
                | RankingKind::TfidfWithHdp
                | RankingKind::TfidfWithLda
                | RankingKind::TfidfWithLlda
        )
    }

    pub fn rank_name(self) -> &'static str {
        match self {
            RankingKind::Atm => "atm_rank",
            RankingKind::Hdp => "hdp_rank",
            RankingKind::Lda => "lda_rank",
            RankingKind::Llda => "llda_rank",
            RankingKind::Tfidf => "tfidf_rank",
            RankingKind::TfidfWithAtm => "tfidf_with_atm_rank",
            RankingKind::TfidfWithHdp => "tfidf_with_hdp_rank",
            RankingKind::TfidfWithLda => "tfidf_with_lda_rank",
            RankingKind::TfidfWithLlda => "tfidf_with_llda_rank",
        }
    }

    /// The vector this ranking compares for one record.
    fn vector(self, record: &EvalRecord) -> Cow<'_, [f64]> {
        let own = record.vectors.get(self.model());
        if self.is_fusion() {
            let tfidf = record.vectors.get(ModelKind::Tfidf);
            let mut joined = Vec::with_capacity(tfidf.len() + own.len());
            joined.extend_from_slice(tfidf);
            joined.extend_from_slice(own);
            Cow::Owned(joined)
        } else {
            Cow::Borrowed(own)
        }
    }
}

impl fmt::Display for RankingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_fusion() {
            write!(f, "TF-IDF + {}", self.model().display_name())
        } else {
            f.write_str(self.model().display_name())
        }
    }
}

/// Rank every material vector against `query`, closest first.
///
/// The sort is stable and has no secondary key: equal distances stay in the
/// order of `material`.
pub fn rank_vectors<'a, I>(
    query: &[f64],
    material: I,
    metric: DistanceMetric,
) -> Result<RankedList, PipelineError>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let mut ranked = material
        .into_iter()
        .enumerate()
        .map(|(i, candidate)| {
            metric
                .distance(query, candidate)
                .map(|d| (DocumentId::new(i), d))
        })
        .collect::<Result<RankedList, PipelineError>>()?;
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    Ok(ranked)
}

/// All nine rankings for one post.
pub fn rank_post(
    query: &EvalRecord,
    material: &[EvalRecord],
    metric: DistanceMetric,
) -> Result<BTreeMap<RankingKind, RankedList>, PipelineError> {
    let mut lists = BTreeMap::new();
    for kind in RankingKind::DISPLAY_ORDER {
        let query_vector = kind.vector(query);
        let material_vectors: Vec<Cow<'_, [f64]>> =
            material.iter().map(|record| kind.vector(record)).collect();
        let ranked = rank_vectors(
            &query_vector,
            material_vectors.iter().map(|v| &**v),
            metric,
        )?;
        lists.insert(kind, ranked);
    }
    Ok(lists)
}

/// post id -> ranking kind -> ranked list.
pub type PostRankings = IndexMap<String, BTreeMap<RankingKind, RankedList>>;

/// The persisted ranking artifact for one course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseRankings {
    pub course: String,
    pub created_at: DateTime<Utc>,
    pub doc_id_to_labels: BTreeMap<DocumentId, DocLabels>,
    pub questions_topic_mapping: BTreeMap<DistanceMetric, PostRankings>,
    /// Empty unless answers were ranked too.
    #[serde(default)]
    pub answers_topic_mapping: BTreeMap<DistanceMetric, PostRankings>,
}

impl CourseRankings {
    pub fn build(
        vectors: &CourseVectors,
        metrics: &[DistanceMetric],
        include_answers: bool,
    ) -> Result<Self, PipelineError> {
        if metrics.is_empty() {
            return Err(PipelineError::config("no distance metric configured"));
        }
        let doc_id_to_labels = vectors.mapping.invert(vectors.material.len())?;

        let mut questions_topic_mapping = BTreeMap::new();
        let mut answers_topic_mapping = BTreeMap::new();
        for &metric in metrics {
            let questions = rank_posts(&vectors.questions, &vectors.material, metric, "Questions")?;
            questions_topic_mapping.insert(metric, questions);
            if include_answers {
                let answers = rank_posts(&vectors.answers, &vectors.material, metric, "Answers")?;
                answers_topic_mapping.insert(metric, answers);
            }
        }

        info!(
            course = %vectors.course,
            metrics = metrics.len(),
            questions = vectors.questions.len(),
            answers = if include_answers { vectors.answers.len() } else { 0 },
            "Ranked course material"
        );

        Ok(Self {
            course: vectors.course.clone(),
            created_at: Utc::now(),
            doc_id_to_labels,
            questions_topic_mapping,
            answers_topic_mapping,
        })
    }

    /// Rankings of one question under one metric.
    pub fn question(
        &self,
        metric: DistanceMetric,
        post_id: &str,
    ) -> Option<&BTreeMap<RankingKind, RankedList>> {
        self.questions_topic_mapping.get(&metric)?.get(post_id)
    }
}

fn rank_posts(
    posts: &IndexMap<String, EvalRecord>,
    material: &[EvalRecord],
    metric: DistanceMetric,
    label: &str,
) -> Result<PostRankings, PipelineError> {
    let pb = progress_bar(label, posts.len());
    let mut ranked = IndexMap::with_capacity(posts.len());
    for (post_id, record) in posts {
        ranked.insert(post_id.clone(), rank_post(record, material, metric)?);
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_ties_keep_material_order() {
        let material: Vec<Vec<f64>> = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]];
        let ranked = rank_vectors(
            &[1.0, 0.0],
            material.iter().map(Vec::as_slice),
            DistanceMetric::Cosine,
        )
        .unwrap();
        let ids: Vec<usize> = ranked.iter().map(|(id, _)| id.index()).collect();
        assert_eq!(ids, vec![0, 2, 1]);
    }

    #[test]
    fn test_fusion_concatenates_tfidf_first() {
        let mut record = EvalRecord {
            vectors: Default::default(),
            all_words: Vec::new(),
            unutilized_words: Vec::new(),
        };
        record.vectors.tfidf = vec![1.0, 2.0];
        record.vectors.lda = vec![0.5];
        assert_eq!(&*RankingKind::TfidfWithLda.vector(&record), &[1.0, 2.0, 0.5]);
        assert_eq!(&*RankingKind::Lda.vector(&record), &[0.5]);
    }

    #[test]
    fn test_rank_names_match_serde() {
        for kind in RankingKind::DISPLAY_ORDER {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.rank_name()));
        }
        assert_eq!(RankingKind::TfidfWithHdp.to_string(), "TF-IDF + HDP-LDA");
    }
}
