//! Database schema definitions.
//!
//! Contains SQL schema and migration logic for the steward-rs `SQLite` database.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// SQL schema for initial database setup.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Conversation turns, append-only per session
CREATE TABLE IF NOT EXISTS turns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session TEXT NOT NULL,
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    citations TEXT NOT NULL,  -- JSON array of citations
    model TEXT,
    failed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

-- Index for turn lookup by session
CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(session, id);

-- Rubric evaluation results, one row per (criterion, target)
CREATE TABLE IF NOT EXISTS evaluations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    criterion_key TEXT NOT NULL,
    target_kind TEXT NOT NULL,
    target_id TEXT NOT NULL,
    criterion_title TEXT NOT NULL,
    generated_text TEXT NOT NULL,
    citations TEXT NOT NULL,  -- JSON array of citations
    failed INTEGER NOT NULL DEFAULT 0,
    model TEXT,
    evaluated_at TEXT NOT NULL,
    UNIQUE (criterion_key, target_kind, target_id)
);

-- Index for result lookup by target
CREATE INDEX IF NOT EXISTS idx_evaluations_target ON evaluations(target_kind, target_id);

-- Report analyses, one row per (kind, subject)
CREATE TABLE IF NOT EXISTS analyses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    subject TEXT NOT NULL,
    body TEXT NOT NULL,
    failed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE (kind, subject)
);
";

/// SQL to check if schema is initialized.
pub const CHECK_SCHEMA_SQL: &str = r"
SELECT COUNT(*) FROM sqlite_master
WHERE type='table' AND name='schema_info';
";

/// SQL to get schema version.
pub const GET_VERSION_SQL: &str = r"
SELECT value FROM schema_info WHERE key = 'version';
";

/// SQL to set schema version.
pub const SET_VERSION_SQL: &str = r"
INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?);
";

/// Migrations from older schema versions.
pub struct Migration {
    /// Version this migration upgrades from.
    pub from_version: u32,
    /// Version this migration upgrades to.
    pub to_version: u32,
    /// SQL statements to execute.
    pub sql: &'static str,
}

/// SQL for v1 to v2 migration (adds report analyses).
const MIGRATION_V1_TO_V2: &str = r"
CREATE TABLE IF NOT EXISTS analyses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    subject TEXT NOT NULL,
    body TEXT NOT NULL,
    failed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE (kind, subject)
);
";

/// Available migrations.
pub const MIGRATIONS: &[Migration] = &[Migration {
    from_version: 1,
    to_version: 2,
    sql: MIGRATION_V1_TO_V2,
}];

/// Gets migrations needed to upgrade from a version.
#[must_use]
pub fn get_migrations_from(current_version: u32) -> Vec<&'static Migration> {
    MIGRATIONS
        .iter()
        .filter(|m| m.from_version >= current_version && m.to_version <= CURRENT_SCHEMA_VERSION)
        .collect()
}
