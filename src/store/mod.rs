// Artifact store — keyed JSON blobs, one per (course, artifact kind).
//
// Two backends: a directory of JSON files (default) and a single SQLite file.
// Stages only ever see `&dyn ArtifactStore`. A write is a batch that either
// lands whole or leaves the previous artifacts untouched.

pub mod json_dir;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::fmt;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::{Config, StoreBackend};
use crate::models::ModelKind;

pub use self::json_dir::JsonDirStore;
#[cfg(feature = "sqlite")]
pub use self::sqlite::SqliteStore;

/// What a stored blob holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKind {
    Model(ModelKind),
    Vectors,
    Rankings,
    ForumVocabulary,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 8] = [
        ArtifactKind::Model(ModelKind::Tfidf),
        ArtifactKind::Model(ModelKind::Lda),
        ArtifactKind::Model(ModelKind::Hdp),
        ArtifactKind::Model(ModelKind::AuthorTopic),
        ArtifactKind::Model(ModelKind::LabeledLda),
        ArtifactKind::Vectors,
        ArtifactKind::Rankings,
        ArtifactKind::ForumVocabulary,
    ];

    /// Storage key, e.g. `model-lda` or `rankings`.
    pub fn key(self) -> String {
        match self {
            ArtifactKind::Model(kind) => format!("model-{}", kind.short_name()),
            ArtifactKind::Vectors => "vectors".to_string(),
            ArtifactKind::Rankings => "rankings".to_string(),
            ArtifactKind::ForumVocabulary => "forum-vocabulary".to_string(),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Keyed blob storage for pipeline artifacts.
pub trait ArtifactStore {
    /// Store each body under its kind, replacing previous artifacts of the
    /// same key: all of them are replaced, or none are.
    fn put_all(&self, course: &str, artifacts: &[(ArtifactKind, String)]) -> Result<()>;

    fn get(&self, course: &str, kind: ArtifactKind) -> Result<Option<String>>;

    /// When the artifact was last written, if it exists.
    fn updated_at(&self, course: &str, kind: ArtifactKind) -> Result<Option<DateTime<Utc>>>;

    /// Human-readable location, for status output.
    fn describe(&self) -> String;
}

/// Open the backend selected by configuration.
pub fn open(config: &Config) -> Result<Box<dyn ArtifactStore>> {
    match config.store {
        StoreBackend::Json => Ok(Box::new(JsonDirStore::new(&config.data_dir))),
        #[cfg(feature = "sqlite")]
        StoreBackend::Sqlite => Ok(Box::new(SqliteStore::open(&config.db_path)?)),
        #[cfg(not(feature = "sqlite"))]
        StoreBackend::Sqlite => anyhow::bail!(
            "COURSETRACE_STORE=sqlite needs the `sqlite` feature. Rebuild with --features sqlite."
        ),
    }
}

/// Serialize one artifact body for `save_all`.
pub fn encode_json<T: Serialize>(
    course: &str,
    kind: ArtifactKind,
    value: &T,
) -> Result<(ArtifactKind, String)> {
    let body = serde_json::to_string(value)
        .with_context(|| format!("Failed to serialize {kind} for {course}"))?;
    Ok((kind, body))
}

/// Store a batch produced by `encode_json` in one all-or-nothing write.
pub fn save_all(
    store: &dyn ArtifactStore,
    course: &str,
    artifacts: &[(ArtifactKind, String)],
) -> Result<()> {
    store.put_all(course, artifacts)?;
    let bytes: usize = artifacts.iter().map(|(_, body)| body.len()).sum();
    debug!(course, artifacts = artifacts.len(), bytes, "Stored artifact batch");
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(
    store: &dyn ArtifactStore,
    course: &str,
    kind: ArtifactKind,
) -> Result<Option<T>> {
    let Some(body) = store.get(course, kind)? else {
        return Ok(None);
    };
    let value = serde_json::from_str(&body)
        .with_context(|| format!("Stored {kind} for {course} is not valid"))?;
    Ok(Some(value))
}

/// Like `load_json`, but a missing artifact is an error naming the stage to run.
pub fn require_json<T: DeserializeOwned>(
    store: &dyn ArtifactStore,
    course: &str,
    kind: ArtifactKind,
    produced_by: &str,
) -> Result<T> {
    load_json(store, course, kind)?.with_context(|| {
        format!("No {kind} artifact for {course}. Run `coursetrace {produced_by}` first.")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_keys_are_unique() {
        let mut keys: Vec<String> = ArtifactKind::ALL.iter().map(|k| k.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), ArtifactKind::ALL.len());
        assert_eq!(ArtifactKind::Model(ModelKind::AuthorTopic).key(), "model-atm");
    }
}
