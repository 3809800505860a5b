// Course vocabulary flattening.
//
// The content collaborator hands us a nested module -> lesson -> item -> tokens
// mapping. Every non-empty item becomes one document, numbered in traversal
// order. The numbering is the document id used by every later stage, so the
// traversal must follow the input's own key order (IndexMap, never HashMap).

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PipelineError;

/// An ordered sequence of normalized word tokens.
pub type Document = Vec<String>;

/// module name -> lesson name -> item name -> tokens.
pub type CourseVocabulary = IndexMap<String, IndexMap<String, IndexMap<String, Document>>>;

/// Position of a document in the flat course-wide document list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(usize);

impl DocumentId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }

    /// Bounds-checked lookup into a per-document slice.
    pub fn lookup<T>(self, items: &[T]) -> Result<&T, PipelineError> {
        items.get(self.0).ok_or(PipelineError::DocumentOutOfRange {
            id: self,
            len: items.len(),
        })
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One level of the course hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Module,
    Lesson,
    Item,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Module, Level::Lesson, Level::Item];

    /// Prefix used when a hierarchy entity is turned into an author or label name.
    pub fn prefix(self) -> &'static str {
        match self {
            Level::Module => "M",
            Level::Lesson => "L",
            Level::Item => "I",
        }
    }
}

/// For each hierarchy level, entity name -> document ids that belong to it.
///
/// Every id lands in exactly one bucket per level. Items with the same name in
/// different lessons share a bucket, since buckets are keyed by name alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocIndexMapping {
    pub modules: IndexMap<String, Vec<DocumentId>>,
    pub lessons: IndexMap<String, Vec<DocumentId>>,
    pub items: IndexMap<String, Vec<DocumentId>>,
}

impl DocIndexMapping {
    pub fn level(&self, level: Level) -> &IndexMap<String, Vec<DocumentId>> {
        match level {
            Level::Module => &self.modules,
            Level::Lesson => &self.lessons,
            Level::Item => &self.items,
        }
    }

    fn record(&mut self, module: &str, lesson: &str, item: &str, id: DocumentId) {
        self.modules.entry(module.to_string()).or_default().push(id);
        self.lessons.entry(lesson.to_string()).or_default().push(id);
        self.items.entry(item.to_string()).or_default().push(id);
    }

    /// Name of the first bucket at `level` that holds `id`.
    pub fn find(&self, level: Level, id: DocumentId) -> Option<&str> {
        self.level(level)
            .iter()
            .find(|(_, ids)| ids.contains(&id))
            .map(|(name, _)| name.as_str())
    }

    /// Resolve the (module, lesson, item) triple for one document.
    ///
    /// Fails if any level has no bucket for the id; a partial label is never
    /// returned.
    pub fn labels_for(&self, id: DocumentId) -> Result<DocLabels, PipelineError> {
        let resolve = |level: Level| {
            self.find(level, id).map(str::to_string).ok_or_else(|| {
                PipelineError::config(format!(
                    "document {id} has no {level:?} in the course mapping"
                ))
            })
        };
        Ok(DocLabels(
            resolve(Level::Module)?,
            resolve(Level::Lesson)?,
            resolve(Level::Item)?,
        ))
    }

    /// Invert the mapping into document id -> labels for ids `0..doc_count`.
    pub fn invert(&self, doc_count: usize) -> Result<BTreeMap<DocumentId, DocLabels>, PipelineError> {
        let mut partial: BTreeMap<DocumentId, [Option<&str>; 3]> = BTreeMap::new();
        for (slot, level) in Level::ALL.into_iter().enumerate() {
            for (name, ids) in self.level(level) {
                for &id in ids {
                    if id.index() >= doc_count {
                        return Err(PipelineError::DocumentOutOfRange { id, len: doc_count });
                    }
                    let entry = partial.entry(id).or_default();
                    // First bucket wins, matching `find`.
                    if entry[slot].is_none() {
                        entry[slot] = Some(name.as_str());
                    }
                }
            }
        }

        (0..doc_count)
            .map(DocumentId::new)
            .map(|id| match partial.get(&id) {
                Some([Some(m), Some(l), Some(i)]) => {
                    Ok((id, DocLabels(m.to_string(), l.to_string(), i.to_string())))
                }
                _ => Err(PipelineError::config(format!(
                    "document {id} is missing from at least one hierarchy level"
                ))),
            })
            .collect()
    }
}

/// (module, lesson, item) names of one document. Serialized as a 3-element array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocLabels(pub String, pub String, pub String);

impl DocLabels {
    pub fn module(&self) -> &str {
        &self.0
    }

    pub fn lesson(&self) -> &str {
        &self.1
    }

    pub fn item(&self) -> &str {
        &self.2
    }

    /// Supervised label set for Labeled-LDA: "M: ..", "L: ..", "I: ..".
    pub fn label_set(&self) -> [String; 3] {
        [
            format!("{}: {}", Level::Module.prefix(), self.0),
            format!("{}: {}", Level::Lesson.prefix(), self.1),
            format!("{}: {}", Level::Item.prefix(), self.2),
        ]
    }
}

impl fmt::Display for DocLabels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} > {} > {}", self.0, self.1, self.2)
    }
}

/// Flat document list plus the hierarchy mapping that produced it.
#[derive(Debug, Clone)]
pub struct ExtractedCourse {
    pub documents: Vec<Document>,
    pub mapping: DocIndexMapping,
}

/// Flatten a course hierarchy into documents, skipping empty items.
pub fn extract_course_texts(vocabulary: &CourseVocabulary) -> ExtractedCourse {
    let mut documents = Vec::new();
    let mut mapping = DocIndexMapping::default();
    let mut skipped = 0usize;

    for (module, lessons) in vocabulary {
        for (lesson, items) in lessons {
            for (item, tokens) in items {
                if tokens.is_empty() {
                    skipped += 1;
                    continue;
                }
                mapping.record(module, lesson, item, DocumentId::new(documents.len()));
                documents.push(tokens.clone());
            }
        }
    }

    debug!(
        documents = documents.len(),
        skipped_empty = skipped,
        modules = mapping.modules.len(),
        "Extracted course documents"
    );

    ExtractedCourse { documents, mapping }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(words: &[&str]) -> Document {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn sample_vocabulary() -> CourseVocabulary {
        let mut vocab = CourseVocabulary::new();
        let mut intro = IndexMap::new();
        intro.insert("Welcome".to_string(), toks(&["welcome", "course"]));
        intro.insert("Quiz".to_string(), Vec::new());
        intro.insert("Syllabus".to_string(), toks(&["syllabus"]));
        let mut m1 = IndexMap::new();
        m1.insert("Getting Started".to_string(), intro);
        vocab.insert("Module 1".to_string(), m1);

        let mut lesson = IndexMap::new();
        lesson.insert("Welcome".to_string(), toks(&["patterns", "welcome"]));
        let mut m2 = IndexMap::new();
        m2.insert("Patterns".to_string(), lesson);
        vocab.insert("Module 2".to_string(), m2);
        vocab
    }

    #[test]
    fn test_empty_items_are_skipped() {
        let extracted = extract_course_texts(&sample_vocabulary());
        assert_eq!(extracted.documents.len(), 3);
        assert!(extracted.documents.iter().all(|d| !d.is_empty()));
        assert!(!extracted.mapping.items.contains_key("Quiz"));
    }

    #[test]
    fn test_ids_follow_traversal_order() {
        let extracted = extract_course_texts(&sample_vocabulary());
        assert_eq!(extracted.documents[0], toks(&["welcome", "course"]));
        assert_eq!(extracted.documents[1], toks(&["syllabus"]));
        assert_eq!(
            extracted.mapping.modules["Module 2"],
            vec![DocumentId::new(2)]
        );
    }

    #[test]
    fn test_same_item_name_shares_bucket() {
        let extracted = extract_course_texts(&sample_vocabulary());
        assert_eq!(
            extracted.mapping.items["Welcome"],
            vec![DocumentId::new(0), DocumentId::new(2)]
        );
    }

    #[test]
    fn test_invert_resolves_every_document() {
        let extracted = extract_course_texts(&sample_vocabulary());
        let labels = extracted.mapping.invert(3).unwrap();
        assert_eq!(labels.len(), 3);
        let last = &labels[&DocumentId::new(2)];
        assert_eq!(last.module(), "Module 2");
        assert_eq!(last.lesson(), "Patterns");
        assert_eq!(last.item(), "Welcome");
    }

    #[test]
    fn test_invert_fails_on_missing_level() {
        let mut extracted = extract_course_texts(&sample_vocabulary());
        extracted.mapping.lessons.shift_remove("Patterns");
        let err = extracted.mapping.invert(3).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_labels_for_unknown_document_fails() {
        let extracted = extract_course_texts(&sample_vocabulary());
        assert!(extracted.mapping.labels_for(DocumentId::new(9)).is_err());
    }

    #[test]
    fn test_label_set_prefixes() {
        let labels = DocLabels("A".into(), "B".into(), "C".into());
        assert_eq!(labels.label_set(), ["M: A", "L: B", "I: C"]);
        assert_eq!(labels.to_string(), "A > B > C");
    }

    #[test]
    fn test_lookup_is_bounds_checked() {
        let docs = vec![1, 2];
        assert_eq!(*DocumentId::new(1).lookup(&docs).unwrap(), 2);
        assert!(matches!(
            DocumentId::new(2).lookup(&docs),
            Err(PipelineError::DocumentOutOfRange { len: 2, .. })
        ));
    }
}
