// JSON directory backend — `<data_dir>/<kind>.<course>.json`.
//
// Writes go to a `.tmp` sibling first and are renamed into place, so a crash
// mid-write never clobbers the previous artifact. A batch stages every `.tmp`
// before the first rename; a failed staging write discards the whole batch.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::warn;

use super::{ArtifactKind, ArtifactStore};

pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, course: &str, kind: ArtifactKind) -> PathBuf {
        self.root.join(format!("{}.{course}.json", kind.key()))
    }

    /// Write every body to its `.tmp` sibling; returns (tmp, final) pairs.
    fn stage(
        &self,
        course: &str,
        artifacts: &[(ArtifactKind, String)],
    ) -> Result<Vec<(PathBuf, PathBuf)>> {
        let mut staged = Vec::with_capacity(artifacts.len());
        for (kind, body) in artifacts {
            let path = self.path_for(course, *kind);
            let tmp = path.with_extension("json.tmp");
            if let Err(e) = fs::write(&tmp, body) {
                discard(&staged);
                return Err(e).with_context(|| format!("Failed to write {}", tmp.display()));
            }
            staged.push((tmp, path));
        }
        Ok(staged)
    }
}

fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (tmp, _) in staged {
        if let Err(e) = fs::remove_file(tmp) {
            warn!(path = %tmp.display(), error = %e, "Could not remove staged artifact");
        }
    }
}

impl ArtifactStore for JsonDirStore {
    fn put_all(&self, course: &str, artifacts: &[(ArtifactKind, String)]) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create {}", self.root.display()))?;

        let staged = self.stage(course, artifacts)?;
        for (i, (tmp, path)) in staged.iter().enumerate() {
            if let Err(e) = fs::rename(tmp, path) {
                discard(&staged[i..]);
                return Err(e)
                    .with_context(|| format!("Failed to move {} into place", path.display()));
            }
        }
        Ok(())
    }

    fn get(&self, course: &str, kind: ArtifactKind) -> Result<Option<String>> {
        let path = self.path_for(course, kind);
        if !path.exists() {
            return Ok(None);
        }
        let body =
            fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(body))
    }

    fn updated_at(&self, course: &str, kind: ArtifactKind) -> Result<Option<DateTime<Utc>>> {
        let path = self.path_for(course, kind);
        if !path.exists() {
            return Ok(None);
        }
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        Ok(Some(DateTime::<Utc>::from(modified)))
    }

    fn describe(&self) -> String {
        format!("JSON files in {}", self.root.display())
    }
}
