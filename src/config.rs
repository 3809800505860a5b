use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::evaluation::EvaluationConfig;
use crate::models::author_topic::AuthorTopicParams;
use crate::models::hdp::HdpParams;
use crate::models::labeled_lda::LabeledLdaParams;
use crate::models::lda::LdaParams;
use crate::models::TrainingConfig;
use crate::ranking::DistanceMetric;

/// Where artifacts are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// One JSON file per artifact under the data directory (default)
    Json,
    /// A single SQLite database at COURSETRACE_DB_PATH
    Sqlite,
}

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. Every value
/// has a default; a value that is set but doesn't parse is an error.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the input JSON files (and JSON artifacts).
    pub data_dir: PathBuf,
    /// Courses processed when a command isn't given `--course`.
    pub courses: Vec<String>,
    pub store: StoreBackend,
    pub db_path: String,
    pub training: TrainingConfig,
    /// Metrics computed by `rank`.
    pub metrics: Vec<DistanceMetric>,
    pub evaluation: EvaluationConfig,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup. `load` passes the environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = get("COURSETRACE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let courses = get("COURSETRACE_COURSES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let store = match get("COURSETRACE_STORE").as_deref().map(str::trim) {
            None | Some("json") => StoreBackend::Json,
            Some("sqlite") => StoreBackend::Sqlite,
            Some(other) => anyhow::bail!(
                "COURSETRACE_STORE must be `json` or `sqlite`, got `{other}`"
            ),
        };

        let seed = parse_or(&get, "COURSETRACE_SEED", 0u64)?;
        let inference_iterations = parse_or(&get, "COURSETRACE_INFERENCE_ITERATIONS", 50usize)?;

        let training = TrainingConfig {
            seed,
            lda: LdaParams {
                num_topics: parse_or(&get, "COURSETRACE_LDA_TOPICS", 100)?,
                iterations: parse_or(&get, "COURSETRACE_LDA_ITERATIONS", 100)?,
                ..LdaParams::default()
            },
            hdp: HdpParams {
                max_topics: parse_or(&get, "COURSETRACE_HDP_MAX_TOPICS", 150)?,
                iterations: parse_or(&get, "COURSETRACE_HDP_ITERATIONS", 100)?,
                ..HdpParams::default()
            },
            author_topic: AuthorTopicParams {
                num_topics: parse_or(&get, "COURSETRACE_ATM_TOPICS", 100)?,
                iterations: parse_or(&get, "COURSETRACE_ATM_ITERATIONS", 100)?,
                ..AuthorTopicParams::default()
            },
            labeled_lda: LabeledLdaParams {
                alpha: parse_or(&get, "COURSETRACE_LLDA_ALPHA", 0.01)?,
                beta: parse_or(&get, "COURSETRACE_LLDA_BETA", 0.001)?,
                iterations: parse_or(&get, "COURSETRACE_LLDA_ITERATIONS", 50)?,
            },
            inference_iterations,
        };

        let metrics = match get("COURSETRACE_METRICS") {
            Some(raw) => raw
                .split(',')
                .filter(|m| !m.trim().is_empty())
                .map(|m| m.parse::<DistanceMetric>())
                .collect::<Result<Vec<_>, _>>()
                .context("Invalid COURSETRACE_METRICS")?,
            None => vec![DistanceMetric::Cosine],
        };
        if metrics.is_empty() {
            anyhow::bail!("COURSETRACE_METRICS is set but names no metric");
        }

        let evaluation = EvaluationConfig {
            seed,
            sample_size: parse_or(&get, "COURSETRACE_SAMPLE_SIZE", 100)?,
            bootstrap_size: parse_or(&get, "COURSETRACE_BOOTSTRAP_SIZE", 1000)?,
            metric: metrics[0],
        };

        Ok(Self {
            data_dir,
            courses,
            store,
            db_path: get("COURSETRACE_DB_PATH")
                .unwrap_or_else(|| "./data/coursetrace.db".to_string()),
            training,
            metrics,
            evaluation,
        })
    }

    /// Courses to process: the explicit selection if given, else the configured list.
    pub fn select_courses(&self, explicit: &[String]) -> Result<Vec<String>> {
        let courses = if explicit.is_empty() {
            self.courses.clone()
        } else {
            explicit.to_vec()
        };
        if courses.is_empty() {
            anyhow::bail!(
                "No courses selected. Pass --course or set COURSETRACE_COURSES in your .env file."
            );
        }
        Ok(courses)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key}=`{raw}` is invalid: {e}")),
    }
}
