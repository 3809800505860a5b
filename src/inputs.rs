// Input files for one course, as written by the content-extraction side.
//
//   vocabulary.<course>.json    module -> lesson -> item -> tokens
//   questions.<course>.json     post id -> tokens
//   answers.<course>.json       post id -> tokens (optional)
//   manual_label.<course>.json  {"questions": {post id: doc id or -1}}

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::corpus::CourseVocabulary;
use crate::evaluation::GroundTruth;
use crate::inference::PostTokens;

pub fn input_path(data_dir: &Path, stem: &str, course: &str) -> PathBuf {
    data_dir.join(format!("{stem}.{course}.json"))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_vocabulary(data_dir: &Path, course: &str) -> Result<CourseVocabulary> {
    read_json(&input_path(data_dir, "vocabulary", course))
}

pub fn load_questions(data_dir: &Path, course: &str) -> Result<PostTokens> {
    let questions: PostTokens = read_json(&input_path(data_dir, "questions", course))?;
    info!(course, questions = questions.len(), "Loaded questions");
    Ok(questions)
}

/// Answers are optional: a course without an answers file gets none.
pub fn load_answers(data_dir: &Path, course: &str) -> Result<PostTokens> {
    let path = input_path(data_dir, "answers", course);
    if !path.exists() {
        warn!(course, path = %path.display(), "No answers file, continuing without answers");
        return Ok(PostTokens::new());
    }
    read_json(&path)
}

/// Ground-truth labels. A course nobody has labelled yet has an empty set.
pub fn load_ground_truth(data_dir: &Path, course: &str) -> Result<GroundTruth> {
    let path = input_path(data_dir, "manual_label", course);
    if !path.exists() {
        warn!(course, path = %path.display(), "No label file");
        return Ok(GroundTruth::default());
    }
    let text =
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    let truth = GroundTruth::from_json(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    info!(
        course,
        labelled = truth.len(),
        unlabelable = truth.unlabelable(),
        "Loaded ground truth"
    );
    Ok(truth)
}
