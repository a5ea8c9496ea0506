//! Error types for steward-rs operations.
//!
//! This module provides the error hierarchy using `thiserror`. Retrieval and
//! generation errors are recoverable at the orchestration boundary (a chat
//! turn or a single rubric criterion); everything else propagates to the CLI.

use thiserror::Error;

/// Result type alias for steward-rs operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Semantic search failures.
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Text generation failures.
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Prompt composition failures.
    #[error("composition error: {0}")]
    Composition(#[from] CompositionError),

    /// Storage-related errors (database operations).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Invalid state errors.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },
}

/// Errors raised by a [`crate::retrieval::Retriever`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    /// The search query was empty or whitespace.
    #[error("search query is empty")]
    EmptyQuery,

    /// The collection reference is malformed or unknown to the service.
    #[error("invalid collection reference: {collection}")]
    InvalidCollection {
        /// Collection name as given.
        collection: String,
    },

    /// The search service could not be reached.
    #[error("search service unreachable: {0}")]
    Unreachable(String),

    /// The search service answered with a non-success status.
    #[error("search service returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },

    /// The response payload could not be decoded.
    #[error("malformed search response: {0}")]
    MalformedResponse(String),

    /// The call exceeded its time budget.
    #[error("search timed out after {seconds}s")]
    Timeout {
        /// Configured timeout in seconds.
        seconds: u64,
    },
}

/// Errors raised by a [`crate::completion::Completer`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The prompt was empty.
    #[error("prompt is empty")]
    EmptyPrompt,

    /// The completion service could not be reached.
    #[error("completion service unreachable: {0}")]
    Unreachable(String),

    /// The completion service answered with a non-success status.
    #[error("completion service returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },

    /// The response payload could not be decoded.
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),

    /// The service answered without any text content.
    #[error("completion response carried no text")]
    NonText,

    /// The service reported a failure inside a well-formed payload.
    #[error("completion service failure ({kind}): {detail}")]
    Service {
        /// Failure category reported by the service.
        kind: String,
        /// Failure detail.
        detail: String,
    },

    /// The call exceeded its time budget.
    #[error("completion timed out after {seconds}s")]
    Timeout {
        /// Configured timeout in seconds.
        seconds: u64,
    },
}

/// Errors raised while composing a prompt.
///
/// Well-typed inputs never produce these; they guard the citation numbering.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositionError {
    /// The user query was empty.
    #[error("user query is empty")]
    EmptyQuery,

    /// A passage rank does not match its position in the retrieval result.
    #[error("passage at position {position} carries rank {rank}")]
    RankMismatch {
        /// 1-based position in the passage list.
        position: usize,
        /// Rank carried by the passage.
        rank: usize,
    },
}

/// Storage-specific errors for database operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Storage not initialized (init command not run).
    #[error("steward-rs not initialized. Run: steward-rs init")]
    NotInitialized,

    /// Conversation session not found.
    #[error("session not found: {session}")]
    SessionNotFound {
        /// Session name.
        session: String,
    },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read {path}: {reason}")]
    Read {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to parse a configuration file.
    #[error("failed to parse {path}: {reason}")]
    Parse {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// A setting has an invalid value.
    #[error("invalid setting: {0}")]
    Invalid(String),

    /// Two rubric criteria share a key.
    #[error("duplicate rubric criterion key: {key}")]
    DuplicateCriterion {
        /// The repeated key.
        key: String,
    },

    /// A criterion key is not part of the rubric.
    #[error("unknown rubric criterion: {key}")]
    UnknownCriterion {
        /// The requested key.
        key: String,
    },

    /// A collection name is not configured.
    #[error("unknown collection: {name}")]
    UnknownCollection {
        /// The requested collection.
        name: String,
    },

    /// A required credential environment variable is not set.
    #[error("environment variable {variable} is not set")]
    MissingCredential {
        /// Environment variable name.
        variable: String,
    },
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// Failed to write file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Directory creation error.
    #[error("failed to create directory: {path}: {reason}")]
    DirectoryFailed {
        /// Path to the directory.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing required argument.
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),
}

// Implement From traits for library errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for RetrievalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}
