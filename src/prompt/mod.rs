//! Prompt composition.
//!
//! Every prompt sent to the completion service is built here from four
//! labeled sections in a fixed order: instruction, history, retrieved
//! context, user question. Passages are numbered by rank, and that number is
//! the `[n]` a generated answer uses to cite them. The composer never
//! truncates; capping source text is the retrieval side's job.

pub mod templates;

pub use templates::{PromptSet, render};

use crate::core::{ConversationTurn, Passage};
use crate::error::CompositionError;
use std::fmt::Write;

/// Label of the instruction section.
pub const INSTRUCTION_LABEL: &str = "[System Instruction]";
/// Label of the history section.
pub const HISTORY_LABEL: &str = "[Conversation History]";
/// Label of the context section.
pub const CONTEXT_LABEL: &str = "[Retrieved Context]";
/// Label of the question section.
pub const QUESTION_LABEL: &str = "[User Question]";

/// Rendered in place of an empty history.
pub const NO_HISTORY_MARKER: &str = "(none)";

/// Rendered in place of passages when retrieval found nothing.
pub const NO_CONTEXT_MARKER: &str = "(no matching context: the documents contain no information \
     for this question. Say that the information could not be found in the documents.)";

/// Typed inputs of one prompt.
#[derive(Debug, Clone, Copy)]
pub struct Prompt<'a> {
    /// Fixed system instruction.
    pub instruction: &'a str,
    /// History window, oldest first.
    pub history: &'a [ConversationTurn],
    /// Retrieved passages in rank order.
    pub passages: &'a [Passage],
    /// The current question.
    pub query: &'a str,
}

impl Prompt<'_> {
    /// Renders the prompt text.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::EmptyQuery`] for a blank question and
    /// [`CompositionError::RankMismatch`] if a passage rank differs from its
    /// 1-based position.
    pub fn compose(&self) -> Result<String, CompositionError> {
        if self.query.trim().is_empty() {
            return Err(CompositionError::EmptyQuery);
        }

        let sections = [
            format!("{INSTRUCTION_LABEL}\n{}", self.instruction.trim_end()),
            format!("{HISTORY_LABEL}\n{}", render_history(self.history)),
            format!("{CONTEXT_LABEL}\n{}", render_passages(self.passages)?),
            format!("{QUESTION_LABEL}\n{}", self.query.trim()),
        ];
        Ok(sections.join("\n\n"))
    }
}

/// Composes a prompt from its four parts.
///
/// # Errors
///
/// See [`Prompt::compose`].
///
/// # Examples
///
/// ```
/// use steward_rs::prompt::{NO_CONTEXT_MARKER, compose};
///
/// let prompt = compose("Answer from context only.", &[], &[], "What is P1?").unwrap();
/// assert!(prompt.contains(NO_CONTEXT_MARKER));
/// assert!(prompt.ends_with("What is P1?"));
/// ```
pub fn compose(
    instruction: &str,
    history: &[ConversationTurn],
    passages: &[Passage],
    query: &str,
) -> Result<String, CompositionError> {
    Prompt {
        instruction,
        history,
        passages,
        query,
    }
    .compose()
}

fn render_history(history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        return NO_HISTORY_MARKER.to_string();
    }
    history
        .iter()
        .map(|turn| format!("User: {}\nAssistant: {}", turn.question, turn.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_passages(passages: &[Passage]) -> Result<String, CompositionError> {
    if passages.is_empty() {
        return Ok(NO_CONTEXT_MARKER.to_string());
    }

    let mut out = String::new();
    for (index, passage) in passages.iter().enumerate() {
        let position = index + 1;
        if passage.rank != position {
            return Err(CompositionError::RankMismatch {
                position,
                rank: passage.rank,
            });
        }
        if index > 0 {
            out.push('\n');
        }
        let _ = write!(out, "--- Document {position} [File: {}", passage.source.title);
        if let Some(page) = &passage.source.page {
            let _ = write!(out, ", Page: {page}");
        }
        let _ = writeln!(out, "] ---\n{}", passage.text.trim_end());
    }
    Ok(out)
}
