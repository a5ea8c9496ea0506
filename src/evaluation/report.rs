//! Plain-text export of evaluation results and analyses.
//!
//! A header (title, timestamp, target) is followed by one section per
//! criterion or analysis, each closed by a fixed delimiter line. The output
//! is meant for people; nothing parses it back.

use crate::core::{AnalysisReport, EvaluationResult};
use chrono::{DateTime, Utc};
use std::fmt::Write;

/// Line closing every section.
pub const SECTION_DELIMITER: &str =
    "================================================================================";

/// Line under each section title.
pub const TITLE_RULE: &str =
    "--------------------------------------------------------------------------------";

/// Title of an evaluation export.
pub const EVALUATION_REPORT_TITLE: &str = "Stewardship Principles Evaluation Report";

/// Title of an analysis export.
pub const ANALYSIS_REPORT_TITLE: &str = "Pension Fund Sustainability Analysis Report";

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Renders evaluation results for one target, in the order given.
#[must_use]
pub fn evaluation_report<'r, I>(
    target_label: &str,
    results: I,
    generated_at: DateTime<Utc>,
) -> String
where
    I: IntoIterator<Item = &'r EvaluationResult>,
{
    let mut out = String::new();
    let _ = writeln!(out, "{EVALUATION_REPORT_TITLE}");
    let _ = writeln!(out, "Generated: {}", timestamp(generated_at));
    let _ = writeln!(out, "Target: {target_label}");
    let _ = writeln!(out, "\n{SECTION_DELIMITER}\n");

    for result in results {
        let _ = writeln!(out, "{}: {}", result.criterion_key, result.criterion_title);
        let _ = writeln!(out, "{TITLE_RULE}\n");
        let _ = writeln!(out, "[Evaluation]");
        let _ = writeln!(out, "{}\n", result.generated_text.trim_end());

        if !result.citations.is_empty() {
            let _ = writeln!(out, "[Sources]");
            for citation in &result.citations {
                let _ = write!(out, "[{}] {}", citation.rank, citation.display_title());
                if let Some(page) = &citation.locator {
                    let _ = write!(out, " (page {page})");
                }
                out.push('\n');
            }
            out.push('\n');
        }

        let _ = writeln!(out, "[Referenced documents]");
        let _ = writeln!(out, "{}\n", result.citations.len());
        let _ = writeln!(out, "{SECTION_DELIMITER}\n");
    }

    out
}

/// Renders analyses (summaries, trends, gaps) in the order given.
#[must_use]
pub fn analysis_report<'r, I>(reports: I, generated_at: DateTime<Utc>) -> String
where
    I: IntoIterator<Item = &'r AnalysisReport>,
{
    let mut out = String::new();
    let _ = writeln!(out, "{ANALYSIS_REPORT_TITLE}");
    let _ = writeln!(out, "Generated: {}", timestamp(generated_at));
    let _ = writeln!(out, "\n{SECTION_DELIMITER}\n");

    for report in reports {
        let _ = writeln!(out, "{} ({})", report.subject, report.kind);
        let _ = writeln!(out, "{TITLE_RULE}\n");
        let _ = writeln!(out, "{}\n", report.body.trim_end());
        let _ = writeln!(out, "{SECTION_DELIMITER}\n");
    }

    out
}
