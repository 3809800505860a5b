// Inference adapter — every model's answer as one flat vector of fixed length.
//
// Models reply in their native shape (see `NativeVector`). This module scatters
// sparse output, flattens batched rows, and checks every result against the
// model's declared dimension before anything downstream sees it.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::corpus::{CourseCorpus, DocIndexMapping, Document, DocumentId};
use crate::error::PipelineError;
use crate::models::{InferenceInput, ModelKind, ModelSet, NativeVector, TopicInference};
use crate::output::progress_bar;

/// Tokenized discussion posts keyed by post id.
pub type PostTokens = IndexMap<String, Document>;

/// Normalise one inference call to a dense vector of `model.dimension()` values.
pub fn infer_vector(
    model: &dyn TopicInference,
    input: &InferenceInput<'_>,
) -> Result<Vec<f64>, PipelineError> {
    let expected = model.dimension();
    let shape_error = |actual: usize| PipelineError::InferenceShape {
        model: model.kind(),
        expected,
        actual,
    };

    let dense = match model.infer_native(input)? {
        NativeVector::Sparse(pairs) => {
            let mut dense = vec![0.0; expected];
            for (index, weight) in pairs {
                let slot = dense.get_mut(index).ok_or_else(|| shape_error(index + 1))?;
                *slot = weight;
            }
            dense
        }
        NativeVector::Batch(rows) => rows.into_iter().flatten().collect(),
        NativeVector::Dense(values) => values,
    };

    if dense.len() != expected {
        return Err(shape_error(dense.len()));
    }
    Ok(dense)
}

/// One vector per model, each of its model's fixed length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelVectors {
    pub tfidf: Vec<f64>,
    pub lda: Vec<f64>,
    pub hdp: Vec<f64>,
    pub atm: Vec<f64>,
    pub llda: Vec<f64>,
}

impl ModelVectors {
    pub fn get(&self, kind: ModelKind) -> &[f64] {
        match kind {
            ModelKind::Tfidf => &self.tfidf,
            ModelKind::Lda => &self.lda,
            ModelKind::Hdp => &self.hdp,
            ModelKind::AuthorTopic => &self.atm,
            ModelKind::LabeledLda => &self.llda,
        }
    }

    fn slot(&mut self, kind: ModelKind) -> &mut Vec<f64> {
        match kind {
            ModelKind::Tfidf => &mut self.tfidf,
            ModelKind::Lda => &mut self.lda,
            ModelKind::Hdp => &mut self.hdp,
            ModelKind::AuthorTopic => &mut self.atm,
            ModelKind::LabeledLda => &mut self.llda,
        }
    }
}

/// Vectors of one document plus its vocabulary coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    #[serde(flatten)]
    pub vectors: ModelVectors,
    pub all_words: Vec<String>,
    /// Tokens the course dictionary doesn't know, in input order.
    pub unutilized_words: Vec<String>,
}

/// Run `input` through every model.
pub fn infer_record(
    models: &ModelSet,
    input: InferenceInput<'_>,
    unutilized_words: Vec<String>,
) -> Result<EvalRecord, PipelineError> {
    let mut vectors = ModelVectors::default();
    for kind in ModelKind::ALL {
        *vectors.slot(kind) = infer_vector(models.get(kind), &input)?;
    }
    Ok(EvalRecord {
        vectors,
        all_words: input.tokens().to_vec(),
        unutilized_words,
    })
}

/// Records for every training document, in DocumentId order.
pub fn vectorize_material(
    models: &ModelSet,
    corpus: &CourseCorpus,
) -> Result<Vec<EvalRecord>, PipelineError> {
    let pb = progress_bar("Material", corpus.len());
    let mut records = Vec::with_capacity(corpus.len());
    for id in corpus.document_ids() {
        let input = InferenceInput::Material {
            id,
            bow: corpus.bow(id)?,
            tokens: corpus.tokens(id)?,
        };
        records.push(infer_record(models, input, Vec::new())?);
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(records)
}

/// Records for held-out posts. Unknown tokens are recorded, not rejected.
pub fn vectorize_posts(
    models: &ModelSet,
    corpus: &CourseCorpus,
    posts: &PostTokens,
    label: &str,
) -> Result<IndexMap<String, EvalRecord>, PipelineError> {
    let pb = progress_bar(label, posts.len());
    let mut records = IndexMap::with_capacity(posts.len());
    for (post_id, tokens) in posts {
        let (bow, unutilized) = corpus.dictionary.doc2bow_with_unutilized(tokens);
        if bow.is_empty() {
            debug!(post = %post_id, "Post has no in-vocabulary tokens");
        }
        let input = InferenceInput::Post {
            id: post_id,
            bow: &bow,
            tokens,
        };
        records.insert(post_id.clone(), infer_record(models, input, unutilized)?);
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(records)
}

/// Everything the ranking stage needs for one course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseVectors {
    pub course: String,
    pub created_at: DateTime<Utc>,
    pub mapping: DocIndexMapping,
    pub material: Vec<EvalRecord>,
    pub questions: IndexMap<String, EvalRecord>,
    pub answers: IndexMap<String, EvalRecord>,
}

impl CourseVectors {
    pub fn build(
        course: &str,
        models: &ModelSet,
        corpus: &CourseCorpus,
        questions: &PostTokens,
        answers: &PostTokens,
    ) -> Result<Self, PipelineError> {
        let material = vectorize_material(models, corpus)?;
        let questions = vectorize_posts(models, corpus, questions, "Questions")?;
        let answers = vectorize_posts(models, corpus, answers, "Answers")?;

        info!(
            course,
            material = material.len(),
            questions = questions.len(),
            answers = answers.len(),
            "Vectorized course"
        );

        Ok(Self {
            course: course.to_string(),
            created_at: Utc::now(),
            mapping: corpus.mapping.clone(),
            material,
            questions,
            answers,
        })
    }

    pub fn material_record(&self, id: DocumentId) -> Result<&EvalRecord, PipelineError> {
        id.lookup(&self.material)
    }
}
