//! Storage trait definition.
//!
//! Defines the interface for persistent storage backends. In-memory
//! [`Conversation`] and [`EvaluationBook`] values stay the source of truth
//! while a command runs; storage is the load/save boundary between commands.
//!
//! [`EvaluationBook`]: crate::core::EvaluationBook

use crate::conversation::Conversation;
use crate::core::{AnalysisKind, AnalysisReport, ConversationTurn, EvaluationResult, Target};
use crate::error::Result;
use serde::Serialize;

/// Trait for persistent storage backends.
pub trait Storage: Send {
    /// Initializes storage (creates schema, runs migrations).
    ///
    /// Should be idempotent - safe to call multiple times.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation or migration fails.
    fn init(&mut self) -> Result<()>;

    /// Checks if storage is initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be performed.
    fn is_initialized(&self) -> Result<bool>;

    /// Deletes all data but preserves the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn reset(&mut self) -> Result<()>;

    /// Gets storage statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be gathered.
    fn stats(&self) -> Result<StorageStats>;

    // ==================== Conversation Operations ====================

    /// Appends a turn to a session.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the insert fails.
    fn append_turn(&mut self, session: &str, turn: &ConversationTurn) -> Result<()>;

    /// Loads a session's turns in order. An unknown session is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or deserialization fails.
    fn load_conversation(&self, session: &str) -> Result<Conversation>;

    /// Deletes a session's turns, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn clear_conversation(&mut self, session: &str) -> Result<usize>;

    /// Lists sessions with their turn counts, most recently used first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_sessions(&self) -> Result<Vec<SessionInfo>>;

    // ==================== Evaluation Operations ====================

    /// Saves a result, replacing any earlier one for the same criterion and
    /// target while keeping its position.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the upsert fails.
    fn save_evaluation(&mut self, result: &EvaluationResult) -> Result<()>;

    /// Loads results in creation order, for one target or all of them.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or deserialization fails.
    fn load_evaluations(&self, target: Option<&Target>) -> Result<Vec<EvaluationResult>>;

    /// Deletes a target's results, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn delete_evaluations(&mut self, target: &Target) -> Result<usize>;

    // ==================== Analysis Operations ====================

    /// Saves an analysis, replacing any earlier one of the same kind and subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    fn save_analysis(&mut self, report: &AnalysisReport) -> Result<()>;

    /// Loads analyses in creation order, of one kind or all kinds.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn load_analyses(&self, kind: Option<AnalysisKind>) -> Result<Vec<AnalysisReport>>;
}

/// A stored conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    /// Session name.
    pub session: String,
    /// Number of stored turns.
    pub turn_count: usize,
}

/// Storage statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageStats {
    /// Number of conversation sessions.
    pub session_count: usize,
    /// Number of stored turns across sessions.
    pub turn_count: usize,
    /// Number of stored evaluation results.
    pub evaluation_count: usize,
    /// Number of distinct evaluated targets.
    pub target_count: usize,
    /// Number of stored analyses.
    pub analysis_count: usize,
    /// Schema version.
    pub schema_version: u32,
    /// Database file size in bytes (if applicable).
    pub db_size: Option<u64>,
}
