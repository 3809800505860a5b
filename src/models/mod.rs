// Topic models — five document representations behind one training façade.
//
// Callers train a ModelSet for a course and then only ever talk to
// `TopicInference`. The TopicModel enum is the tagged form that gets
// persisted; nothing outside this module matches on the variant.

pub mod author_topic;
pub mod hdp;
pub mod labeled_lda;
pub mod lda;
pub(crate) mod sampler;
pub mod tfidf;
pub mod traits;

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::corpus::CourseCorpus;
use crate::error::PipelineError;

use self::author_topic::{author_groups, AuthorTopicModel, AuthorTopicParams};
use self::hdp::{HdpModel, HdpParams};
use self::labeled_lda::{LabeledLdaModel, LabeledLdaParams};
use self::lda::{LdaModel, LdaParams};
use self::tfidf::TfIdfModel;
pub use self::traits::{InferenceInput, NativeVector, TopicInference};

/// The five model variants, in training order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Tfidf,
    Lda,
    Hdp,
    #[serde(rename = "atm")]
    AuthorTopic,
    #[serde(rename = "llda")]
    LabeledLda,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::Tfidf,
        ModelKind::Lda,
        ModelKind::Hdp,
        ModelKind::AuthorTopic,
        ModelKind::LabeledLda,
    ];

    pub fn index(self) -> usize {
        match self {
            ModelKind::Tfidf => 0,
            ModelKind::Lda => 1,
            ModelKind::Hdp => 2,
            ModelKind::AuthorTopic => 3,
            ModelKind::LabeledLda => 4,
        }
    }

    /// Name used in artifact keys and ranking names.
    pub fn short_name(self) -> &'static str {
        match self {
            ModelKind::Tfidf => "tfidf",
            ModelKind::Lda => "lda",
            ModelKind::Hdp => "hdp",
            ModelKind::AuthorTopic => "atm",
            ModelKind::LabeledLda => "llda",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Tfidf => "TF-IDF",
            ModelKind::Lda => "LDA",
            ModelKind::Hdp => "HDP-LDA",
            ModelKind::AuthorTopic => "Author-Topic",
            ModelKind::LabeledLda => "Labeled LDA",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ModelKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.short_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PipelineError::config(format!("unknown model kind '{s}'")))
    }
}

/// A trained model of any variant. This is what gets persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "lowercase")]
pub enum TopicModel {
    Tfidf(TfIdfModel),
    Lda(LdaModel),
    Hdp(HdpModel),
    #[serde(rename = "atm")]
    AuthorTopic(AuthorTopicModel),
    #[serde(rename = "llda")]
    LabeledLda(LabeledLdaModel),
}

impl TopicModel {
    pub fn as_inference(&self) -> &dyn TopicInference {
        match self {
            TopicModel::Tfidf(m) => m,
            TopicModel::Lda(m) => m,
            TopicModel::Hdp(m) => m,
            TopicModel::AuthorTopic(m) => m,
            TopicModel::LabeledLda(m) => m,
        }
    }
}

impl TopicInference for TopicModel {
    fn kind(&self) -> ModelKind {
        self.as_inference().kind()
    }

    fn dimension(&self) -> usize {
        self.as_inference().dimension()
    }

    fn infer_native(&self, input: &InferenceInput<'_>) -> Result<NativeVector, PipelineError> {
        self.as_inference().infer_native(input)
    }
}

/// Hyperparameters for every trainer plus the seed that drives them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub seed: u64,
    pub lda: LdaParams,
    pub hdp: HdpParams,
    pub author_topic: AuthorTopicParams,
    pub labeled_lda: LabeledLdaParams,
    /// Fold-in iterations used when inferring new documents.
    pub inference_iterations: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            lda: LdaParams::default(),
            hdp: HdpParams::default(),
            author_topic: AuthorTopicParams::default(),
            labeled_lda: LabeledLdaParams::default(),
            inference_iterations: 50,
        }
    }
}

impl TrainingConfig {
    /// Each stochastic trainer gets its own stream so adding or reordering one
    /// doesn't shift the others.
    pub fn seed_for(&self, kind: ModelKind) -> u64 {
        self.seed.wrapping_add(kind.index() as u64)
    }
}

/// One trained model per variant, indexed by `ModelKind::index`.
#[derive(Debug, Clone)]
pub struct ModelSet {
    models: [TopicModel; 5],
}

impl ModelSet {
    /// Train all five models in sequence. The first failure aborts.
    pub fn train(corpus: &CourseCorpus, config: &TrainingConfig) -> Result<Self, PipelineError> {
        let num_terms = corpus.dictionary.len();
        let iters = config.inference_iterations;

        let tfidf = timed(ModelKind::Tfidf, || {
            TfIdfModel::train(&corpus.bows, num_terms).map(TopicModel::Tfidf)
        })?;
        let lda = timed(ModelKind::Lda, || {
            let mut rng = StdRng::seed_from_u64(config.seed_for(ModelKind::Lda));
            LdaModel::train(&mut rng, &corpus.bows, num_terms, &config.lda, iters).map(TopicModel::Lda)
        })?;
        let hdp = timed(ModelKind::Hdp, || {
            let mut rng = StdRng::seed_from_u64(config.seed_for(ModelKind::Hdp));
            HdpModel::train(&mut rng, &corpus.bows, num_terms, &config.hdp, iters).map(TopicModel::Hdp)
        })?;
        let atm = timed(ModelKind::AuthorTopic, || {
            let mut rng = StdRng::seed_from_u64(config.seed_for(ModelKind::AuthorTopic));
            let authors = author_groups(&corpus.mapping, corpus.len())?;
            AuthorTopicModel::train(
                &mut rng,
                &corpus.bows,
                num_terms,
                &authors,
                &config.author_topic,
                iters,
            )
            .map(TopicModel::AuthorTopic)
        })?;
        let llda = timed(ModelKind::LabeledLda, || {
            let mut rng = StdRng::seed_from_u64(config.seed_for(ModelKind::LabeledLda));
            LabeledLdaModel::train(
                &mut rng,
                &corpus.documents,
                &corpus.mapping,
                &config.labeled_lda,
                iters,
            )
            .map(TopicModel::LabeledLda)
        })?;

        Ok(Self {
            models: [tfidf, lda, hdp, atm, llda],
        })
    }

    /// Reassemble a set from individually persisted models.
    ///
    /// Each kind must appear exactly once.
    pub fn from_models(models: Vec<TopicModel>) -> Result<Self, PipelineError> {
        let mut slots: [Option<TopicModel>; 5] = Default::default();
        for model in models {
            let kind = model.kind();
            if slots[kind.index()].replace(model).is_some() {
                return Err(PipelineError::config(format!("duplicate {kind} model")));
            }
        }
        let [tfidf, lda, hdp, atm, llda] = slots;
        let missing = |kind: ModelKind| PipelineError::config(format!("missing {kind} model"));
        Ok(Self {
            models: [
                tfidf.ok_or_else(|| missing(ModelKind::Tfidf))?,
                lda.ok_or_else(|| missing(ModelKind::Lda))?,
                hdp.ok_or_else(|| missing(ModelKind::Hdp))?,
                atm.ok_or_else(|| missing(ModelKind::AuthorTopic))?,
                llda.ok_or_else(|| missing(ModelKind::LabeledLda))?,
            ],
        })
    }

    pub fn get(&self, kind: ModelKind) -> &TopicModel {
        &self.models[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &TopicModel> {
        self.models.iter()
    }

    /// Each model's vector length, in `ModelKind::ALL` order.
    pub fn dimensions(&self) -> [usize; 5] {
        ModelKind::ALL.map(|kind| self.get(kind).dimension())
    }
}

fn timed<F>(kind: ModelKind, train: F) -> Result<TopicModel, PipelineError>
where
    F: FnOnce() -> Result<TopicModel, PipelineError>,
{
    let started = Instant::now();
    let model = train()?;
    info!(
        model = kind.short_name(),
        dimension = model.dimension(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Trained model"
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_short_name() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.short_name().parse::<ModelKind>().unwrap(), kind);
            assert_eq!(ModelKind::ALL[kind.index()], kind);
        }
        assert!("bert".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_kind_serializes_as_short_name() {
        let json = serde_json::to_string(&ModelKind::AuthorTopic).unwrap();
        assert_eq!(json, "\"atm\"");
    }

    #[test]
    fn test_from_models_rejects_missing_kind() {
        let tfidf = TfIdfModel::train(&[vec![(0, 1)]], 1).unwrap();
        let err = ModelSet::from_models(vec![TopicModel::Tfidf(tfidf)]).unwrap_err();
        assert!(err.to_string().contains("LDA"));
    }

    #[test]
    fn test_seeds_differ_per_kind() {
        let config = TrainingConfig {
            seed: 7,
            ..Default::default()
        };
        assert_eq!(config.seed_for(ModelKind::Tfidf), 7);
        assert_eq!(config.seed_for(ModelKind::LabeledLda), 11);
    }
}
