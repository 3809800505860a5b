use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use coursetrace::config::Config;
use coursetrace::evaluation::EvaluationConfig;
use coursetrace::output::terminal;
use coursetrace::pipeline::{self, build, evaluate, rank};
use coursetrace::ranking::DistanceMetric;
use coursetrace::store::{self, ArtifactStore};

/// Coursetrace: trace discussion-forum questions to course material.
///
/// Trains five topic representations of a course (TF-IDF, LDA, HDP,
/// Author-Topic, Labeled LDA), ranks the material against every forum
/// question, and scores the rankings against human labels.
#[derive(Parser)]
#[command(name = "coursetrace", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct CourseArgs {
    /// Course to process (repeatable). Defaults to COURSETRACE_COURSES.
    #[arg(long = "course")]
    courses: Vec<String>,
}

#[derive(Args, Clone)]
struct EvalArgs {
    /// Seed for the evaluation sample (default: COURSETRACE_SEED)
    #[arg(long)]
    seed: Option<u64>,

    /// Base sample size; courses with fewer labels are skipped
    #[arg(long)]
    sample: Option<usize>,

    /// Bootstrap resample size (0 disables bootstrapping)
    #[arg(long)]
    bootstrap: Option<usize>,

    /// Distance metric whose rankings are evaluated
    #[arg(long)]
    metric: Option<DistanceMetric>,
}

impl EvalArgs {
    fn apply(&self, base: &EvaluationConfig) -> EvaluationConfig {
        EvaluationConfig {
            seed: self.seed.unwrap_or(base.seed),
            sample_size: self.sample.unwrap_or(base.sample_size),
            bootstrap_size: self.bootstrap.unwrap_or(base.bootstrap_size),
            metric: self.metric.unwrap_or(base.metric),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Train the five models and vectorize material, questions and answers
    Build {
        #[command(flatten)]
        courses: CourseArgs,

        /// Override COURSETRACE_SEED for training
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Rank course material against every question
    Rank {
        #[command(flatten)]
        courses: CourseArgs,

        /// Also rank answers
        #[arg(long)]
        answers: bool,
    },

    /// Score rankings against the manual labels (mean reciprocal rank)
    Evaluate {
        #[command(flatten)]
        courses: CourseArgs,

        #[command(flatten)]
        eval: EvalArgs,
    },

    /// Build, rank and evaluate in one go
    Run {
        #[command(flatten)]
        courses: CourseArgs,

        /// Also rank answers
        #[arg(long)]
        answers: bool,

        #[command(flatten)]
        eval: EvalArgs,
    },

    /// Show the closest material for a question (labeling aid)
    Suggest {
        /// Course the question belongs to
        #[arg(long)]
        course: String,

        /// Question post id
        #[arg(long)]
        post: String,

        /// Number of suggestions (default: 3)
        #[arg(long, default_value = "3")]
        top: usize,

        /// Distance metric to read rankings for
        #[arg(long, default_value = "cosine")]
        metric: DistanceMetric,
    },

    /// Show which artifacts exist for each course
    Status {
        #[command(flatten)]
        courses: CourseArgs,
    },
}

fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("coursetrace=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    let store = store::open(&config)?;

    let failures = match cli.command {
        Commands::Build { courses, seed } => {
            if let Some(seed) = seed {
                config.training.seed = seed;
            }
            let courses = config.select_courses(&courses.courses)?;
            run_build(&config, &*store, &courses)
        }

        Commands::Rank { courses, answers } => {
            let courses = config.select_courses(&courses.courses)?;
            run_rank(&config, &*store, &courses, answers)
        }

        Commands::Evaluate { courses, eval } => {
            let courses = config.select_courses(&courses.courses)?;
            let eval = eval.apply(&config.evaluation);
            run_evaluate(&config, &*store, &courses, &eval)
        }

        Commands::Run {
            courses,
            answers,
            eval,
        } => {
            let courses = config.select_courses(&courses.courses)?;
            let eval = eval.apply(&config.evaluation);
            info!(courses = courses.len(), "Running full pipeline");
            pipeline::for_each_course(&courses, |course| {
                let one = [course.to_string()];
                // Later stages would read stale artifacts after a failure.
                if run_build(&config, &*store, &one) > 0
                    || run_rank(&config, &*store, &one, answers) > 0
                    || run_evaluate(&config, &*store, &one, &eval) > 0
                {
                    anyhow::bail!("pipeline stopped after a failed stage");
                }
                Ok(())
            })
        }

        Commands::Suggest {
            course,
            post,
            top,
            metric,
        } => {
            let suggestions = evaluate::suggest(&*store, &course, &post, metric, top)?;
            terminal::display_suggestions(&course, &post, &suggestions);
            0
        }

        Commands::Status { courses } => {
            let courses = if courses.courses.is_empty() {
                config.courses.clone()
            } else {
                courses.courses
            };
            coursetrace::status::show(&*store, &courses)?;
            0
        }
    };

    if failures > 0 {
        anyhow::bail!("{failures} course(s) failed");
    }
    Ok(())
}

fn run_build(config: &Config, store: &dyn ArtifactStore, courses: &[String]) -> usize {
    pipeline::for_each_course(courses, |course| {
        println!("Building {}...", course.bold());
        let report = build::run(config, store, course)?;
        terminal::display_build_report(&report);
        Ok(())
    })
}

fn run_rank(config: &Config, store: &dyn ArtifactStore, courses: &[String], answers: bool) -> usize {
    pipeline::for_each_course(courses, |course| {
        println!("Ranking {}...", course.bold());
        let report = rank::run(store, course, &config.metrics, answers)?;
        terminal::display_rank_report(&report);
        Ok(())
    })
}

fn run_evaluate(
    config: &Config,
    store: &dyn ArtifactStore,
    courses: &[String],
    eval: &EvaluationConfig,
) -> usize {
    pipeline::for_each_course(courses, |course| {
        match evaluate::run(config, store, course, eval)? {
            Some(result) => terminal::display_evaluation(&result),
            None => terminal::display_skipped(
                course,
                &format!("fewer than {} labelled questions", eval.sample_size),
            ),
        }
        Ok(())
    })
}
