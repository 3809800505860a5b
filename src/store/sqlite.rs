// SQLite backend — one `artifacts` row per (course, kind).
//
// rusqlite with the "bundled" feature, so there's no system SQLite
// dependency. A batch of artifacts is a set of upserts inside one
// transaction.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{ArtifactKind, ArtifactStore};

pub struct SqliteStore {
    conn: Connection,
    location: String,
}

impl SqliteStore {
    /// Open (or create) the database file and make sure the schema exists.
    pub fn open(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory for database: {db_path}"))?;
            }
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {db_path}"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        create_tables(&conn)?;

        Ok(Self {
            conn,
            location: db_path.to_string(),
        })
    }

    #[cfg(test)]
    fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        create_tables(&conn)?;
        Ok(Self {
            conn,
            location: ":memory:".to_string(),
        })
    }
}

/// Create the schema if it doesn't exist yet. Safe to call on every open.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Serialized pipeline artifacts, one per course and kind
        CREATE TABLE IF NOT EXISTS artifacts (
            course TEXT NOT NULL,
            kind TEXT NOT NULL,            -- e.g. model-lda, vectors, rankings
            body TEXT NOT NULL,            -- JSON
            updated_at TEXT NOT NULL,      -- RFC 3339
            PRIMARY KEY (course, kind)
        );
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute("INSERT OR IGNORE INTO schema_version (version) VALUES (?1)", [1])?;
    Ok(())
}

fn upsert(
    conn: &Connection,
    course: &str,
    kind: ArtifactKind,
    body: &str,
    at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO artifacts (course, kind, body, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(course, kind) DO UPDATE SET body = ?3, updated_at = ?4",
        params![course, kind.key(), body, at.to_rfc3339()],
    )
    .with_context(|| format!("Failed to store {kind} for {course}"))?;
    Ok(())
}

impl ArtifactStore for SqliteStore {
    fn put_all(&self, course: &str, artifacts: &[(ArtifactKind, String)]) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to start artifact transaction")?;
        let now = Utc::now();
        for (kind, body) in artifacts {
            upsert(&tx, course, *kind, body, now)?;
        }
        // Dropping `tx` without commit rolls the whole batch back.
        tx.commit()
            .with_context(|| format!("Failed to commit artifacts for {course}"))?;
        Ok(())
    }

    fn get(&self, course: &str, kind: ArtifactKind) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM artifacts WHERE course = ?1 AND kind = ?2")?;
        let body = stmt
            .query_row(params![course, kind.key()], |row| row.get(0))
            .optional()?;
        Ok(body)
    }

    fn updated_at(&self, course: &str, kind: ArtifactKind) -> Result<Option<DateTime<Utc>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT updated_at FROM artifacts WHERE course = ?1 AND kind = ?2")?;
        let raw: Option<String> = stmt
            .query_row(params![course, kind.key()], |row| row.get(0))
            .optional()?;
        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .with_context(|| format!("Bad timestamp '{s}' on {kind} for {course}"))
        })
        .transpose()
    }

    fn describe(&self) -> String {
        format!("SQLite database at {}", self.location)
    }
}
