//! # steward-rs
//!
//! Retrieval-augmented analysis of pension-fund sustainability reports.
//!
//! Every answer is produced by one retrieval → composition → completion
//! cycle: passages are fetched from a semantic search service, composed into
//! a prompt with numbered document markers, and sent to a completion
//! service. Citations always come from the retrieval result, in rank order.
//!
//! ## Features
//!
//! - **Chat**: multi-turn questions with a bounded history window
//! - **Evaluation**: a rubric of stewardship principles applied to a
//!   document, an entity, or every known entity at once
//! - **Analysis**: report summaries, cross-report trends and gap analysis
//! - **`SQLite` Storage**: sessions, results and analyses persist between runs

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod analysis;
pub mod cli;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod core;
pub mod error;
pub mod evaluation;
pub mod io;
pub mod prompt;
pub mod rag;
pub mod retrieval;
pub mod storage;

#[cfg(test)]
mod testing;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use core::{
    AnalysisKind, AnalysisReport, Citation, ConversationTurn, EvaluationBook, EvaluationResult,
    KnownEntity, Passage, Rubric, RubricCriterion, SourceMetadata, Target,
};

// Re-export service contracts and orchestration
pub use analysis::Analyzer;
pub use completion::{Completer, HttpCompleter};
#[cfg(feature = "openai")]
pub use completion::OpenAiCompleter;
pub use config::AppConfig;
pub use conversation::Conversation;
pub use evaluation::EvaluationDriver;
pub use prompt::PromptSet;
pub use rag::{ChatRequest, RagPipeline, RagSettings};
pub use retrieval::{CollectionConfig, Filter, HttpRetriever, RetrievalQuery, Retriever};

// Re-export storage types
pub use storage::{DEFAULT_DB_PATH, SqliteStorage, Storage};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
