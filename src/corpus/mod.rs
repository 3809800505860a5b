// Corpus construction — hierarchy flattening, dictionary, bag-of-words.

pub mod dictionary;
pub mod vocabulary;

pub use dictionary::{BagOfWords, CourseCorpus, Dictionary};
pub use vocabulary::{
    extract_course_texts, CourseVocabulary, DocIndexMapping, DocLabels, Document, DocumentId,
    ExtractedCourse, Level,
};
