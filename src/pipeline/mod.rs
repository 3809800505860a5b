// Per-course pipeline stages: build -> rank -> evaluate.
//
// Each stage reads what the previous one stored, so stages can be rerun on
// their own. Courses are independent: one failing doesn't stop the rest.

pub mod build;
pub mod evaluate;
pub mod rank;

use anyhow::Result;
use colored::Colorize;
use tracing::error;

/// Run `stage` for every course, reporting failures and carrying on.
///
/// Returns the number of courses that failed.
pub fn for_each_course<F>(courses: &[String], mut stage: F) -> usize
where
    F: FnMut(&str) -> Result<()>,
{
    let mut failures = 0;
    for course in courses {
        if let Err(e) = stage(course) {
            failures += 1;
            error!(course = %course, error = %format!("{e:#}"), "Course failed");
            eprintln!("{} {course}: {e:#}", "Failed".red().bold());
        }
    }
    failures
}
