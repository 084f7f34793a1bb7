//! Colored CLI display utilities for run output.
//!
//! This module provides functions for printing colored, formatted output
//! to the terminal at the end of an archive run.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::fetch::Outcome;
use crate::orchestrator::{JobReport, RunSummary};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Maximum length for truncated display strings.
const DEFAULT_MAX_LEN: usize = 80;

/// Truncate a string to a maximum length, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

/// Print one job's line of the run summary.
fn print_job(report: &JobReport) {
    let ts = timestamp();
    match (&report.outcome, &report.error) {
        (_, Some(error)) => {
            println!(
                "{} {} {} {}",
                ts.dimmed(),
                "[ERROR]".red().bold(),
                report.creator.cyan(),
                truncate(error, DEFAULT_MAX_LEN).red()
            );
        }
        (Some(Outcome::Success), _) => {
            let detail = pipeline_detail(report);
            println!(
                "{} {} {} {}",
                ts.dimmed(),
                "[OK]".green().bold(),
                report.creator.cyan(),
                detail.dimmed()
            );
        }
        (Some(Outcome::DegradedBenign { benign }), _) => {
            let detail = pipeline_detail(report);
            println!(
                "{} {} {} {} posts without media {}",
                ts.dimmed(),
                "[OK]".yellow().bold(),
                report.creator.cyan(),
                benign,
                detail.dimmed()
            );
        }
        (Some(Outcome::Failed { diagnosis }), _) => {
            println!(
                "{} {} {} {} {}",
                ts.dimmed(),
                "[FAIL]".red().bold(),
                report.creator.cyan(),
                diagnosis.tag().red(),
                diagnosis.remediation().dimmed()
            );
        }
        (None, None) => {
            println!(
                "{} {} {}",
                ts.dimmed(),
                "[SKIP]".yellow().bold(),
                report.creator.cyan()
            );
        }
    }
}

fn pipeline_detail(report: &JobReport) -> String {
    match (&report.pipeline, &report.skip_reason) {
        (Some(p), _) => format!("{} items organized, {} with metadata", p.items, p.injected),
        (None, Some(reason)) => format!("post-processing skipped: {reason}"),
        (None, None) => String::new(),
    }
}

/// Print the final run summary.
pub fn print_run_summary(summary: &RunSummary) {
    let ts = timestamp();
    println!(
        "{} {} {} succeeded, {} degraded, {} failed",
        ts.dimmed(),
        "[RUN]".blue().bold(),
        summary.succeeded().green(),
        summary.degraded().yellow(),
        summary.failed().red()
    );
    for report in &summary.reports {
        print_job(report);
    }
    let _ = io::stdout().flush();
}
