//! Storage layer for steward-rs.
//!
//! Persists conversation turns, evaluation results and report analyses in
//! `SQLite` so that state survives between CLI invocations.

pub mod schema;
pub mod sqlite;
pub mod traits;

pub use schema::{CURRENT_SCHEMA_VERSION, SCHEMA_SQL};
pub use sqlite::SqliteStorage;
pub use traits::{SessionInfo, Storage, StorageStats};

/// Default database file name.
pub const DEFAULT_DB_NAME: &str = "steward.db";

/// Default database path relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".steward/steward.db";
