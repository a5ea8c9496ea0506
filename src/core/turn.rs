//! Conversation turns.

use super::citation::Citation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Answer text recorded when a turn could not be generated.
pub const FAILED_TURN_PREFIX: &str = "Sorry, the answer could not be generated.";

/// One question/answer exchange.
///
/// Turns are immutable once appended to a [`crate::conversation::Conversation`].
/// A failed exchange is still recorded as a turn so questions and answers
/// never drift out of step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// The user's question.
    pub question: String,
    /// Generated answer, or an apology carrying the error detail.
    pub answer: String,
    /// Citations in retrieval rank order.
    pub citations: Vec<Citation>,
    /// When the turn was created.
    pub timestamp: DateTime<Utc>,
    /// Model that produced the answer.
    pub model: Option<String>,
    /// Whether retrieval or generation failed for this turn.
    pub failed: bool,
}

impl ConversationTurn {
    /// Creates a successful turn.
    #[must_use]
    pub fn answered(
        question: impl Into<String>,
        answer: impl Into<String>,
        citations: Vec<Citation>,
        model: Option<String>,
    ) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            citations,
            timestamp: Utc::now(),
            model,
            failed: false,
        }
    }

    /// Creates an error turn with empty citations.
    #[must_use]
    pub fn failure(question: impl Into<String>, detail: &str, model: Option<String>) -> Self {
        Self {
            question: question.into(),
            answer: format!("{FAILED_TURN_PREFIX} ({detail})"),
            citations: Vec::new(),
            timestamp: Utc::now(),
            model,
            failed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_turn() {
        let turn = ConversationTurn::failure("What is the policy?", "timed out", None);
        assert!(turn.failed);
        assert!(turn.citations.is_empty());
        assert!(turn.answer.starts_with(FAILED_TURN_PREFIX));
        assert!(turn.answer.contains("timed out"));
        assert_eq!(turn.question, "What is the policy?");
    }

    #[test]
    fn test_answered_turn() {
        let turn = ConversationTurn::answered("q", "a", Vec::new(), Some("m".to_string()));
        assert!(!turn.failed);
        assert_eq!(turn.model.as_deref(), Some("m"));
    }
}
