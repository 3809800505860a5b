// Forum-only vocabulary — words students use that the course material never does.

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::inference::EvalRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumVocabulary {
    pub course: String,
    pub created_at: DateTime<Utc>,
    /// Distinct tokens across all questions.
    pub discussion_vocabulary_size: usize,
    /// Unutilized words with their counts, most frequent first.
    pub words: Vec<(String, usize)>,
}

impl ForumVocabulary {
    pub fn collect(course: &str, questions: &IndexMap<String, EvalRecord>) -> Self {
        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        let mut discussion: IndexSet<&str> = IndexSet::new();
        for record in questions.values() {
            discussion.extend(record.all_words.iter().map(String::as_str));
            for word in &record.unutilized_words {
                *counts.entry(word.as_str()).or_insert(0) += 1;
            }
        }

        let mut words: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(word, n)| (word.to_string(), n))
            .collect();
        // Stable, so equal counts keep first-seen order.
        words.sort_by(|a, b| b.1.cmp(&a.1));

        info!(
            course,
            forum_only = words.len(),
            discussion_vocabulary = discussion.len(),
            "Collected forum-only vocabulary"
        );

        Self {
            course: course.to_string(),
            created_at: Utc::now(),
            discussion_vocabulary_size: discussion.len(),
            words,
        }
    }

    /// Share of the discussion vocabulary the course material never uses.
    pub fn forum_only_ratio(&self) -> f64 {
        if self.discussion_vocabulary_size == 0 {
            0.0
        } else {
            self.words.len() as f64 / self.discussion_vocabulary_size as f64
        }
    }
}
