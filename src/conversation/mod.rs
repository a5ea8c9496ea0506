//! Conversation state.
//!
//! An ordered, append-only log of [`ConversationTurn`]s scoped to one named
//! session. Prompts only ever see a read-time window of the most recent
//! turns; nothing is evicted except by an explicit [`Conversation::clear`].

use crate::core::ConversationTurn;
use serde::{Deserialize, Serialize};

/// Session name used when none is given.
pub const DEFAULT_SESSION: &str = "default";

/// Append-only log of turns for one session.
///
/// # Examples
///
/// ```
/// use steward_rs::conversation::Conversation;
/// use steward_rs::core::ConversationTurn;
///
/// let mut conv = Conversation::new("default");
/// conv.append(ConversationTurn::answered("q1", "a1", Vec::new(), None));
/// conv.append(ConversationTurn::answered("q2", "a2", Vec::new(), None));
/// assert_eq!(conv.window(1)[0].question, "q2");
/// assert!(conv.window(0).is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    session: String,
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    /// Creates an empty conversation.
    #[must_use]
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            turns: Vec::new(),
        }
    }

    /// Restores a conversation from turns in creation order.
    #[must_use]
    pub fn from_turns(session: impl Into<String>, turns: Vec<ConversationTurn>) -> Self {
        Self {
            session: session.into(),
            turns,
        }
    }

    /// Session name.
    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Appends a turn.
    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// The last `k` turns in chronological order (oldest first).
    ///
    /// `k == 0` yields an empty slice; `k` larger than the log yields every turn.
    #[must_use]
    pub fn window(&self, k: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(k);
        &self.turns[start..]
    }

    /// Removes every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// All turns in creation order.
    #[must_use]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Number of turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns true if no turns have been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn conversation_of(n: usize) -> Conversation {
        let mut conv = Conversation::default();
        for i in 0..n {
            conv.append(ConversationTurn::answered(
                format!("q{i}"),
                format!("a{i}"),
                Vec::new(),
                None,
            ));
        }
        conv
    }

    #[test]
    fn test_window_returns_most_recent_in_order() {
        let conv = conversation_of(5);
        let questions: Vec<&str> = conv.window(3).iter().map(|t| t.question.as_str()).collect();
        assert_eq!(questions, vec!["q2", "q3", "q4"]);
    }

    #[test]
    fn test_window_zero_is_empty() {
        assert!(conversation_of(4).window(0).is_empty());
        assert!(Conversation::default().window(3).is_empty());
    }

    #[test]
    fn test_clear() {
        let mut conv = conversation_of(3);
        conv.clear();
        assert!(conv.is_empty());
        assert_eq!(conv.session(), DEFAULT_SESSION);
    }

    proptest! {
        #[test]
        fn prop_window_bound(len in 0usize..40, k in 0usize..60) {
            let conv = conversation_of(len);
            let window = conv.window(k);

            prop_assert!(window.len() <= k);
            prop_assert_eq!(window.len(), k.min(len));

            // Most recent turns, oldest of the window first.
            for (offset, turn) in window.iter().enumerate() {
                let expected = len - window.len() + offset;
                prop_assert_eq!(&turn.question, &format!("q{expected}"));
            }
        }
    }
}
