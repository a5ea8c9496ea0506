//! Core domain models for steward-rs.
//!
//! This module contains the data structures shared by every layer: passages
//! and citations, conversation turns, the rubric, evaluation targets and
//! results, and report analyses. These are pure domain models with no I/O
//! dependencies.

pub mod analysis;
pub mod citation;
pub mod evaluation;
pub mod rubric;
pub mod target;
pub mod turn;

pub use analysis::{AnalysisKind, AnalysisReport};
pub use citation::{Citation, Passage, SourceMetadata, cite, referenced_ranks};
pub use evaluation::{EVALUATION_FAILURE_PREFIX, EvaluationBook, EvaluationResult};
pub use rubric::{Rubric, RubricCriterion};
pub use target::{KnownEntity, Target, default_entities};
pub use turn::{ConversationTurn, FAILED_TURN_PREFIX};
