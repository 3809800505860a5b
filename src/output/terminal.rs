// Colored terminal output for stage reports, evaluation tables and suggestions.
//
// main.rs delegates all display here so the stages themselves only log.

use colored::Colorize;

use crate::evaluation::CourseEvaluation;
use crate::models::ModelKind;
use crate::pipeline::build::BuildReport;
use crate::pipeline::evaluate::Suggestion;
use crate::pipeline::rank::RankReport;

use super::truncate_chars;

pub fn display_build_report(report: &BuildReport) {
    println!("\n{}", format!("=== Built {} ===", report.course).bold());
    println!(
        "  {} documents, {} terms, {} questions, {} answers",
        report.documents, report.terms, report.questions, report.answers
    );
    for kind in ModelKind::ALL {
        println!(
            "  {:<14} {:>6} dimensions",
            kind.display_name(),
            report.dimensions[kind.index()]
        );
    }
}

pub fn display_rank_report(report: &RankReport) {
    println!("\n{}", format!("=== Ranked {} ===", report.course).bold());
    println!(
        "  {} questions against {} material documents",
        report.questions, report.material
    );
    if report.answers_ranked > 0 {
        println!("  {} answers ranked", report.answers_ranked);
    }
    println!(
        "  Forum-only vocabulary: {} of {} discussion words",
        report.forum_only_words, report.discussion_vocabulary
    );
}

/// Display per-ranking reciprocal-rank statistics, best mean highlighted.
pub fn display_evaluation(eval: &CourseEvaluation) {
    println!(
        "\n{}",
        format!("=== {} ({} distance) ===", eval.course, eval.metric).bold()
    );
    println!(
        "  {} labelled, {} unlabelable, {} evaluated",
        eval.labelled, eval.unlabelable, eval.evaluated
    );
    println!();

    println!(
        "  {:<28} {:>7} {:>7} {:>7}",
        "Ranking".dimmed(),
        "MRR".dimmed(),
        "Stdev".dimmed(),
        "Median".dimmed(),
    );
    println!("  {}", "-".repeat(52).dimmed());

    let best = eval
        .summaries
        .iter()
        .map(|s| s.mean)
        .fold(f64::NEG_INFINITY, f64::max);

    for summary in &eval.summaries {
        let name = summary.kind.to_string();
        let mean = format!("{:>7.3}", summary.mean);
        let mean = if (summary.mean - best).abs() < 1e-12 {
            mean.green().bold()
        } else {
            mean.normal()
        };
        println!(
            "  {:<28} {} {:>7.3} {:>7.3}",
            name, mean, summary.stdev, summary.median
        );
    }
}

pub fn display_skipped(course: &str, reason: &str) {
    println!("{} {course}: {reason}", "Skipped".yellow());
}

/// Display the top TF-IDF matches for a question.
pub fn display_suggestions(course: &str, post_id: &str, suggestions: &[Suggestion]) {
    println!(
        "\n{}",
        format!("=== Suggestions for {post_id} ({course}) ===").bold()
    );
    if suggestions.is_empty() {
        println!("  No material to suggest.");
        return;
    }
    for (i, s) in suggestions.iter().enumerate() {
        println!(
            "  {}. [{:>4}] {:<60} {}",
            i + 1,
            s.document.index(),
            truncate_chars(&s.labels.to_string(), 60),
            format!("{:.3}", s.distance).dimmed()
        );
    }
}
