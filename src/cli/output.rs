//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::conversation::Conversation;
use crate::core::{
    AnalysisReport, ConversationTurn, EvaluationResult, KnownEntity, Rubric, referenced_ranks,
};
use crate::error::Error;
use crate::io::{single_line, truncate_graphemes};
use crate::retrieval::CollectionConfig;
use crate::storage::{SessionInfo, StorageStats};
use serde::Serialize;
use std::fmt::Write;

/// Graphemes of an evaluation shown in listings.
const PREVIEW_GRAPHEMES: usize = 240;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Formats a status response.
#[must_use]
pub fn format_status(stats: &StorageStats, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_status_text(stats),
        OutputFormat::Json => format_json(stats),
    }
}

fn format_status_text(stats: &StorageStats) -> String {
    let mut output = String::new();
    output.push_str("steward-rs Status\n");
    output.push_str("=================\n\n");
    let _ = writeln!(output, "  Sessions:      {}", stats.session_count);
    let _ = writeln!(output, "  Turns:         {}", stats.turn_count);
    let _ = writeln!(output, "  Evaluations:   {}", stats.evaluation_count);
    let _ = writeln!(output, "  Targets:       {}", stats.target_count);
    let _ = writeln!(output, "  Analyses:      {}", stats.analysis_count);
    let _ = writeln!(output, "  Schema:        v{}", stats.schema_version);
    if let Some(size) = stats.db_size {
        let _ = writeln!(output, "  DB size:       {}", format_size(size));
    }
    output
}

/// Formats a freshly answered turn.
#[must_use]
pub fn format_turn(turn: &ConversationTurn, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "{}", turn.answer.trim_end());
            write_sources(&mut output, turn);
            output
        }
        OutputFormat::Json => format_json(turn),
    }
}

fn write_sources(output: &mut String, turn: &ConversationTurn) {
    if turn.citations.is_empty() {
        return;
    }
    // Sources the answer refers to as `[n]` are starred.
    let cited = referenced_ranks(&turn.answer);
    output.push_str("\nSources:\n");
    for citation in &turn.citations {
        let marker = if cited.contains(&citation.rank) { '*' } else { ' ' };
        let _ = write!(
            output,
            " {marker}[{}] {}",
            citation.rank,
            citation.display_title()
        );
        if let Some(page) = &citation.locator {
            let _ = write!(output, " (page {page})");
        }
        output.push('\n');
    }
}

/// Formats a whole conversation.
#[must_use]
pub fn format_history(conversation: &Conversation, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if conversation.is_empty() {
                return format!("No turns in session {}.\n", conversation.session());
            }
            let mut output = String::new();
            let _ = writeln!(
                output,
                "Session {} ({} turns)\n",
                conversation.session(),
                conversation.len()
            );
            for (i, turn) in conversation.turns().iter().enumerate() {
                let _ = writeln!(
                    output,
                    "#{} {}",
                    i + 1,
                    turn.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
                );
                let _ = writeln!(output, "User: {}", turn.question);
                let _ = writeln!(output, "Assistant: {}", turn.answer.trim_end());
                write_sources(&mut output, turn);
                output.push('\n');
            }
            output
        }
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct History<'a> {
                session: &'a str,
                turns: &'a [ConversationTurn],
            }
            format_json(&History {
                session: conversation.session(),
                turns: conversation.turns(),
            })
        }
    }
}

/// Formats the session list.
#[must_use]
pub fn format_sessions(sessions: &[SessionInfo], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if sessions.is_empty() {
                return "No sessions found.\n".to_string();
            }
            let mut output = String::new();
            let _ = writeln!(output, "{:<30} Turns", "Session");
            output.push_str(&"-".repeat(40));
            output.push('\n');
            for info in sessions {
                let _ = writeln!(output, "{:<30} {}", info.session, info.turn_count);
            }
            output
        }
        OutputFormat::Json => format_json(&sessions),
    }
}

/// Formats the rubric.
#[must_use]
pub fn format_rubric(rubric: &Rubric, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            for criterion in rubric.iter() {
                let _ = writeln!(output, "{}: {}", criterion.key, criterion.title);
                for requirement in criterion.requirements() {
                    let _ = writeln!(output, "  - {requirement}");
                }
                output.push('\n');
            }
            output
        }
        OutputFormat::Json => format_json(&rubric.criteria()),
    }
}

/// Formats evaluation results as a short listing.
#[must_use]
pub fn format_evaluations(
    target_label: &str,
    results: &[EvaluationResult],
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "Target: {target_label}\n");
            for result in results {
                let status = if result.failed { "failed" } else { "ok" };
                let _ = writeln!(
                    output,
                    "{}: {} [{status}, {} sources]",
                    result.criterion_key,
                    result.criterion_title,
                    result.citations.len()
                );
                let preview = single_line(&result.generated_text);
                let _ = writeln!(
                    output,
                    "  {}\n",
                    truncate_graphemes(&preview, PREVIEW_GRAPHEMES)
                );
            }
            let failed = results.iter().filter(|r| r.failed).count();
            let _ = writeln!(
                output,
                "{} criteria evaluated, {failed} failed.",
                results.len()
            );
            output
        }
        OutputFormat::Json => format_json(&results),
    }
}

/// Formats analyses.
#[must_use]
pub fn format_analyses(reports: &[AnalysisReport], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if reports.is_empty() {
                return "No analyses found.\n".to_string();
            }
            let mut output = String::new();
            for report in reports {
                let _ = writeln!(output, "== {} ({}) ==", report.subject, report.kind);
                let _ = writeln!(output, "{}\n", report.body.trim_end());
            }
            output
        }
        OutputFormat::Json => format_json(&reports),
    }
}

/// Formats configured collections and entities.
#[must_use]
pub fn format_collections(
    collections: &[CollectionConfig],
    default_collection: &str,
    entities: &[KnownEntity],
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            output.push_str("Collections:\n");
            for collection in collections {
                let marker = if collection.name == default_collection {
                    "*"
                } else {
                    " "
                };
                let _ = writeln!(
                    output,
                    "{marker} {:<20} {}",
                    collection.name, collection.service
                );
            }
            output.push_str("\nEntities:\n");
            for entity in entities {
                let _ = writeln!(output, "  {:<10} {}", entity.code, entity.name);
            }
            output
        }
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Listing<'a> {
                default_collection: &'a str,
                collections: &'a [CollectionConfig],
                entities: &'a [KnownEntity],
            }
            format_json(&Listing {
                default_collection,
                collections,
                entities,
            })
        }
    }
}

/// Formats a one-line confirmation.
#[must_use]
pub fn format_message(message: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("{message}\n"),
        OutputFormat::Json => format_json(&serde_json::json!({ "message": message })),
    }
}

/// Formats an error for display.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json => format_json(&serde_json::json!({
            "error": error.to_string(),
        })),
    }
}

/// Formats a value as JSON.
fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats a byte size as human-readable.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
