// Artifact status — which stages have run for each course, and when.

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::store::{ArtifactKind, ArtifactStore};

/// Presence and age of every artifact kind for one course.
#[derive(Debug, Clone)]
pub struct CourseStatus {
    pub course: String,
    pub artifacts: Vec<(ArtifactKind, Option<DateTime<Utc>>)>,
}

impl CourseStatus {
    pub fn collect(store: &dyn ArtifactStore, course: &str) -> Result<Self> {
        let artifacts = ArtifactKind::ALL
            .into_iter()
            .map(|kind| -> Result<_> { Ok((kind, store.updated_at(course, kind)?)) })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            course: course.to_string(),
            artifacts,
        })
    }

    fn updated(&self, kind: ArtifactKind) -> Option<DateTime<Utc>> {
        self.artifacts
            .iter()
            .find(|(k, _)| *k == kind)
            .and_then(|(_, at)| *at)
    }

    /// The command to run next, or `None` if everything exists and the
    /// rankings were computed from the current vectors.
    pub fn next_step(&self) -> Option<&'static str> {
        let models_built = ArtifactKind::ALL
            .into_iter()
            .filter(|k| matches!(k, ArtifactKind::Model(_)))
            .all(|k| self.updated(k).is_some());
        if !models_built {
            return Some("build");
        }
        match (self.updated(ArtifactKind::Vectors), self.updated(ArtifactKind::Rankings)) {
            (None, _) => Some("build"),
            (Some(_), None) => Some("rank"),
            (Some(vectors), Some(rankings)) if rankings < vectors => Some("rank"),
            _ => None,
        }
    }
}

/// Display artifact status for each course to the terminal.
pub fn show(store: &dyn ArtifactStore, courses: &[String]) -> Result<()> {
    println!("Store: {}", store.describe());
    if courses.is_empty() {
        println!("Courses: none configured");
        println!("  Set COURSETRACE_COURSES in your .env file or pass --course");
        return Ok(());
    }

    for course in courses {
        let status = CourseStatus::collect(store, course)?;
        println!("\n{}", course.bold());
        for (kind, at) in &status.artifacts {
            match at {
                Some(at) => println!(
                    "  {:<18} {}",
                    kind.key(),
                    at.format("%Y-%m-%d %H:%M:%S UTC").to_string().green()
                ),
                None => println!("  {:<18} {}", kind.key(), "missing".dimmed()),
            }
        }
        if let Some(step) = status.next_step() {
            println!("  Run `coursetrace {step} --course {course}` next");
        }
    }

    Ok(())
}
