// Dictionary and bag-of-words corpus.
//
// Token ids are handed out in first-seen order across the document list, so
// building twice from the same documents yields the same ids. Once built the
// dictionary is frozen: tokens of later documents that it doesn't know are
// reported back as "unutilized words" rather than added.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::vocabulary::{DocIndexMapping, Document, DocumentId, ExtractedCourse};
use crate::error::PipelineError;

/// Sparse (token_id, count) pairs, sorted by token id.
pub type BagOfWords = Vec<(usize, u32)>;

/// Token <-> id bijection. The id of a token is its insertion index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    token2id: IndexMap<String, usize>,
}

impl Dictionary {
    pub fn from_documents(documents: &[Document]) -> Self {
        let mut token2id = IndexMap::new();
        for token in documents.iter().flatten() {
            if !token2id.contains_key(token) {
                let id = token2id.len();
                token2id.insert(token.clone(), id);
            }
        }
        Self { token2id }
    }

    pub fn len(&self) -> usize {
        self.token2id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token2id.is_empty()
    }

    pub fn id(&self, token: &str) -> Option<usize> {
        self.token2id.get(token).copied()
    }

    pub fn token(&self, id: usize) -> Option<&str> {
        self.token2id.get_index(id).map(|(token, _)| token.as_str())
    }

    /// Count known tokens; unknown ones are dropped.
    pub fn doc2bow(&self, tokens: &[String]) -> BagOfWords {
        self.doc2bow_with_unutilized(tokens).0
    }

    /// Count known tokens and return the unknown ones in input order.
    pub fn doc2bow_with_unutilized(&self, tokens: &[String]) -> (BagOfWords, Vec<String>) {
        let mut counts: BTreeMap<usize, u32> = BTreeMap::new();
        let mut unutilized = Vec::new();
        for token in tokens {
            match self.id(token) {
                Some(id) => *counts.entry(id).or_insert(0) += 1,
                None => unutilized.push(token.clone()),
            }
        }
        (counts.into_iter().collect(), unutilized)
    }
}

/// Everything a trainer needs for one course.
#[derive(Debug, Clone)]
pub struct CourseCorpus {
    pub documents: Vec<Document>,
    pub dictionary: Dictionary,
    pub bows: Vec<BagOfWords>,
    pub mapping: DocIndexMapping,
}

impl CourseCorpus {
    /// Build the dictionary and one bag of words per document.
    ///
    /// An empty document list is a configuration error: no model can be
    /// trained on it.
    pub fn build(extracted: ExtractedCourse) -> Result<Self, PipelineError> {
        if extracted.documents.is_empty() {
            return Err(PipelineError::config(
                "course has no non-empty documents to build a corpus from",
            ));
        }

        let dictionary = Dictionary::from_documents(&extracted.documents);
        let bows: Vec<BagOfWords> = extracted
            .documents
            .iter()
            .map(|doc| dictionary.doc2bow(doc))
            .collect();

        info!(
            documents = bows.len(),
            terms = dictionary.len(),
            "Built course corpus"
        );

        Ok(Self {
            documents: extracted.documents,
            dictionary,
            bows,
            mapping: extracted.mapping,
        })
    }

    pub fn len(&self) -> usize {
        self.bows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bows.is_empty()
    }

    pub fn document_ids(&self) -> impl Iterator<Item = DocumentId> {
        (0..self.bows.len()).map(DocumentId::new)
    }

    pub fn bow(&self, id: DocumentId) -> Result<&BagOfWords, PipelineError> {
        id.lookup(&self.bows)
    }

    pub fn tokens(&self, id: DocumentId) -> Result<&Document, PipelineError> {
        id.lookup(&self.documents)
    }
}
