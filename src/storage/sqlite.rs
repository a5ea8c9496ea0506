//! `SQLite` storage implementation.
//!
//! Provides persistent storage using `SQLite` with proper transaction
//! management and migration support.

// SQLite stores all integers as i64. These casts are intentional and safe
// because we only store non-negative counts that fit in usize.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::conversation::Conversation;
use crate::core::{
    AnalysisKind, AnalysisReport, Citation, ConversationTurn, EvaluationResult, Target,
};
use crate::error::{Result, StorageError};
use crate::storage::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL,
};
use crate::storage::traits::{SessionInfo, Storage, StorageStats};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use tracing::debug;

/// SQLite-based storage implementation.
///
/// # Examples
///
/// ```no_run
/// use steward_rs::storage::{SqliteStorage, Storage};
///
/// let mut storage = SqliteStorage::open(".steward/steward.db").unwrap();
/// storage.init().unwrap();
/// ```
pub struct SqliteStorage {
    /// `SQLite` connection.
    conn: Connection,
    /// Path to the database file (None for in-memory).
    path: Option<PathBuf>,
}

/// Raw `evaluations` row before JSON and target decoding.
struct EvaluationRow {
    criterion_key: String,
    target_kind: String,
    target_id: String,
    criterion_title: String,
    generated_text: String,
    citations: String,
    failed: bool,
    model: Option<String>,
    evaluated_at: DateTime<Utc>,
}

impl EvaluationRow {
    fn into_result(self) -> Result<EvaluationResult> {
        let target = Target::from_parts(&self.target_kind, &self.target_id).ok_or_else(|| {
            StorageError::Serialization(format!("unknown target kind: {}", self.target_kind))
        })?;
        Ok(EvaluationResult {
            criterion_key: self.criterion_key,
            criterion_title: self.criterion_title,
            target,
            generated_text: self.generated_text,
            citations: decode_citations(&self.citations)?,
            failed: self.failed,
            model: self.model,
            evaluated_at: self.evaluated_at,
        })
    }
}

fn encode_citations(citations: &[Citation]) -> Result<String> {
    Ok(serde_json::to_string(citations).map_err(StorageError::from)?)
}

fn decode_citations(json: &str) -> Result<Vec<Citation>> {
    Ok(serde_json::from_str(json).map_err(StorageError::from)?)
}

impl SqliteStorage {
    /// Opens or creates a `SQLite` database at the given path.
    ///
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Database(e.to_string()))?;
        }

        let conn = Connection::open(&path).map_err(StorageError::from)?;

        // WAL returns the resulting mode as a row.
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        debug!(path = %path.display(), "Opened database");
        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Creates an in-memory `SQLite` database.
    ///
    /// Useful for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        Ok(Self { conn, path: None })
    }

    /// Loads every stored evaluation into an ordered book.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or deserialization fails.
    pub fn load_book(&self) -> Result<crate::core::EvaluationBook> {
        Ok(crate::core::EvaluationBook::from_results(
            self.load_evaluations(None)?,
        ))
    }

    /// Gets the current schema version.
    fn get_schema_version(&self) -> Result<Option<u32>> {
        let version: Option<String> = self
            .conn
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;

        Ok(version.and_then(|v| v.parse().ok()))
    }

    /// Sets the schema version.
    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.conn
            .execute(SET_VERSION_SQL, params![version.to_string()])
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn count(&self, sql: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(sql, [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count as usize)
    }
}

impl Storage for SqliteStorage {
    fn init(&mut self) -> Result<()> {
        let is_init: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;

        if is_init == 0 {
            self.conn
                .execute_batch(SCHEMA_SQL)
                .map_err(StorageError::from)?;
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        } else if let Some(current) = self.get_schema_version()?
            && current < CURRENT_SCHEMA_VERSION
        {
            for migration in crate::storage::schema::get_migrations_from(current) {
                debug!(
                    from = migration.from_version,
                    to = migration.to_version,
                    "Running migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
            }
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        }

        Ok(())
    }

    fn is_initialized(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count > 0)
    }

    fn reset(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r"
            DELETE FROM turns;
            DELETE FROM evaluations;
            DELETE FROM analyses;
        ",
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn stats(&self) -> Result<StorageStats> {
        let schema_version = self.get_schema_version()?.unwrap_or(0);
        let db_size = self
            .path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok().map(|m| m.len()));

        Ok(StorageStats {
            session_count: self.count("SELECT COUNT(DISTINCT session) FROM turns")?,
            turn_count: self.count("SELECT COUNT(*) FROM turns")?,
            evaluation_count: self.count("SELECT COUNT(*) FROM evaluations")?,
            target_count: self.count(
                "SELECT COUNT(*) FROM (SELECT DISTINCT target_kind, target_id FROM evaluations)",
            )?,
            analysis_count: self.count("SELECT COUNT(*) FROM analyses")?,
            schema_version,
            db_size,
        })
    }

    // ==================== Conversation Operations ====================

    fn append_turn(&mut self, session: &str, turn: &ConversationTurn) -> Result<()> {
        self.conn
            .execute(
                r"
            INSERT INTO turns (session, question, answer, citations, model, failed, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
                params![
                    session,
                    turn.question,
                    turn.answer,
                    encode_citations(&turn.citations)?,
                    turn.model,
                    turn.failed,
                    turn.timestamp,
                ],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn load_conversation(&self, session: &str) -> Result<Conversation> {
        let mut stmt = self
            .conn
            .prepare(
                r"
            SELECT question, answer, citations, model, failed, created_at
            FROM turns WHERE session = ? ORDER BY id
        ",
            )
            .map_err(StorageError::from)?;

        let rows = stmt
            .query_map(params![session], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, DateTime<Utc>>(5)?,
                ))
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        let mut turns = Vec::with_capacity(rows.len());
        for (question, answer, citations, model, failed, timestamp) in rows {
            turns.push(ConversationTurn {
                question,
                answer,
                citations: decode_citations(&citations)?,
                timestamp,
                model,
                failed,
            });
        }

        Ok(Conversation::from_turns(session, turns))
    }

    fn clear_conversation(&mut self, session: &str) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM turns WHERE session = ?", params![session])
            .map_err(StorageError::from)?;
        Ok(removed)
    }

    fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        let mut stmt = self
            .conn
            .prepare(
                r"
            SELECT session, COUNT(*) FROM turns
            GROUP BY session ORDER BY MAX(id) DESC
        ",
            )
            .map_err(StorageError::from)?;

        let sessions = stmt
            .query_map([], |row| {
                Ok(SessionInfo {
                    session: row.get(0)?,
                    turn_count: row.get::<_, i64>(1)? as usize,
                })
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        Ok(sessions)
    }

    // ==================== Evaluation Operations ====================

    fn save_evaluation(&mut self, result: &EvaluationResult) -> Result<()> {
        self.conn
            .execute(
                r"
            INSERT INTO evaluations (
                criterion_key, target_kind, target_id, criterion_title,
                generated_text, citations, failed, model, evaluated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (criterion_key, target_kind, target_id) DO UPDATE SET
                criterion_title = excluded.criterion_title,
                generated_text = excluded.generated_text,
                citations = excluded.citations,
                failed = excluded.failed,
                model = excluded.model,
                evaluated_at = excluded.evaluated_at
        ",
                params![
                    result.criterion_key,
                    result.target.kind(),
                    result.target.identifier(),
                    result.criterion_title,
                    result.generated_text,
                    encode_citations(&result.citations)?,
                    result.failed,
                    result.model,
                    result.evaluated_at,
                ],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn load_evaluations(&self, target: Option<&Target>) -> Result<Vec<EvaluationResult>> {
        const COLUMNS: &str = r"
            SELECT criterion_key, target_kind, target_id, criterion_title,
                   generated_text, citations, failed, model, evaluated_at
            FROM evaluations";

        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<EvaluationRow> {
            Ok(EvaluationRow {
                criterion_key: row.get(0)?,
                target_kind: row.get(1)?,
                target_id: row.get(2)?,
                criterion_title: row.get(3)?,
                generated_text: row.get(4)?,
                citations: row.get(5)?,
                failed: row.get(6)?,
                model: row.get(7)?,
                evaluated_at: row.get(8)?,
            })
        };

        let rows = match target {
            Some(target) => {
                let mut stmt = self
                    .conn
                    .prepare(&format!(
                        "{COLUMNS} WHERE target_kind = ? AND target_id = ? ORDER BY id"
                    ))
                    .map_err(StorageError::from)?;
                stmt.query_map(params![target.kind(), target.identifier()], map_row)
                    .map_err(StorageError::from)?
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(StorageError::from)?
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("{COLUMNS} ORDER BY id"))
                    .map_err(StorageError::from)?;
                stmt.query_map([], map_row)
                    .map_err(StorageError::from)?
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(StorageError::from)?
            }
        };

        rows.into_iter().map(EvaluationRow::into_result).collect()
    }

    fn delete_evaluations(&mut self, target: &Target) -> Result<usize> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM evaluations WHERE target_kind = ? AND target_id = ?",
                params![target.kind(), target.identifier()],
            )
            .map_err(StorageError::from)?;
        Ok(removed)
    }

    // ==================== Analysis Operations ====================

    fn save_analysis(&mut self, report: &AnalysisReport) -> Result<()> {
        self.conn
            .execute(
                r"
            INSERT INTO analyses (kind, subject, body, failed, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (kind, subject) DO UPDATE SET
                body = excluded.body,
                failed = excluded.failed,
                created_at = excluded.created_at
        ",
                params![
                    report.kind.as_str(),
                    report.subject,
                    report.body,
                    report.failed,
                    report.created_at,
                ],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn load_analyses(&self, kind: Option<AnalysisKind>) -> Result<Vec<AnalysisReport>> {
        let mut stmt = self
            .conn
            .prepare(
                r"
            SELECT kind, subject, body, failed, created_at FROM analyses
            WHERE ?1 IS NULL OR kind = ?1
            ORDER BY id
        ",
            )
            .map_err(StorageError::from)?;

        let rows = stmt
            .query_map(params![kind.map(AnalysisKind::as_str)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, DateTime<Utc>>(4)?,
                ))
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        rows.into_iter()
            .map(|(kind, subject, body, failed, created_at)| -> Result<AnalysisReport> {
                let kind = AnalysisKind::parse(&kind).ok_or_else(|| {
                    StorageError::Serialization(format!("unknown analysis kind: {kind}"))
                })?;
                Ok(AnalysisReport {
                    kind,
                    subject,
                    body,
                    failed,
                    created_at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EvaluationBook, RubricCriterion};
    use tempfile::TempDir;

    fn setup() -> SqliteStorage {
        let mut storage = SqliteStorage::in_memory().unwrap();
        storage.init().unwrap();
        storage
    }

    fn citation(rank: usize) -> Citation {
        Citation {
            source_id: format!("doc{rank}.pdf"),
            title: format!("doc{rank}.pdf"),
            snippet: "snippet".to_string(),
            locator: Some(rank.to_string()),
            rank,
        }
    }

    fn result(key: &str, target: Target, text: &str) -> EvaluationResult {
        let criterion = RubricCriterion::new(key, format!("title {key}"), "");
        EvaluationResult::completed(&criterion, target, text, vec![citation(1)], None)
    }

    #[test]
    fn test_init() {
        let mut storage = SqliteStorage::in_memory().unwrap();
        assert!(!storage.is_initialized().unwrap());
        assert!(storage.init().is_ok());
        assert!(storage.is_initialized().unwrap());
    }

    #[test]
    fn test_init_idempotent() {
        let mut storage = SqliteStorage::in_memory().unwrap();
        assert!(storage.init().is_ok());
        assert!(storage.init().is_ok());
    }

    #[test]
    fn test_conversation_roundtrip() {
        let mut storage = setup();

        storage
            .append_turn(
                "default",
                &ConversationTurn::answered("q1", "a1 [1]", vec![citation(1)], Some("m".into())),
            )
            .unwrap();
        storage
            .append_turn("default", &ConversationTurn::failure("q2", "timed out", None))
            .unwrap();
        storage
            .append_turn("other", &ConversationTurn::answered("x", "y", Vec::new(), None))
            .unwrap();

        let conversation = storage.load_conversation("default").unwrap();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.turns()[0].question, "q1");
        assert_eq!(conversation.turns()[0].citations, vec![citation(1)]);
        assert!(conversation.turns()[1].failed);

        let sessions = storage.list_sessions().unwrap();
        assert_eq!(sessions[0].session, "other");
        assert_eq!(sessions[1].turn_count, 2);

        assert_eq!(storage.clear_conversation("default").unwrap(), 2);
        assert!(storage.load_conversation("default").unwrap().is_empty());
        assert_eq!(storage.load_conversation("other").unwrap().len(), 1);
    }

    #[test]
    fn test_evaluation_upsert_keeps_position() {
        let mut storage = setup();
        let fund = Target::Entity("AMOne".to_string());

        storage.save_evaluation(&result("P1", fund.clone(), "first")).unwrap();
        storage.save_evaluation(&result("P2", fund.clone(), "p2")).unwrap();
        storage.save_evaluation(&result("P1", fund.clone(), "second")).unwrap();
        storage.save_evaluation(&result("P1", Target::All, "all")).unwrap();

        let loaded = storage.load_evaluations(Some(&fund)).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].criterion_key, "P1");
        assert_eq!(loaded[0].generated_text, "second");
        assert_eq!(loaded[0].citations, vec![citation(1)]);

        let all = storage.load_evaluations(None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].target, Target::All);

        let book: EvaluationBook = storage.load_book().unwrap();
        assert_eq!(book.len(), 3);

        assert_eq!(storage.delete_evaluations(&fund).unwrap(), 2);
        assert_eq!(storage.load_evaluations(None).unwrap().len(), 1);
    }

    #[test]
    fn test_document_and_entity_targets_are_distinct() {
        let mut storage = setup();
        storage
            .save_evaluation(&result("P1", Target::Document("AMOne".into()), "doc"))
            .unwrap();
        storage
            .save_evaluation(&result("P1", Target::Entity("AMOne".into()), "entity"))
            .unwrap();
        assert_eq!(storage.load_evaluations(None).unwrap().len(), 2);
    }

    #[test]
    fn test_analysis_upsert_and_filter() {
        let mut storage = setup();

        storage
            .save_analysis(&AnalysisReport::new(AnalysisKind::Summary, "a.pdf", "one"))
            .unwrap();
        storage
            .save_analysis(&AnalysisReport::new(AnalysisKind::Trend, "selected reports", "t"))
            .unwrap();
        storage
            .save_analysis(&AnalysisReport::new(AnalysisKind::Summary, "a.pdf", "two"))
            .unwrap();

        let summaries = storage.load_analyses(Some(AnalysisKind::Summary)).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].body, "two");
        assert_eq!(storage.load_analyses(None).unwrap().len(), 2);
    }

    #[test]
    fn test_reset_and_stats() {
        let mut storage = setup();
        storage
            .append_turn("s", &ConversationTurn::answered("q", "a", Vec::new(), None))
            .unwrap();
        storage.save_evaluation(&result("P1", Target::All, "x")).unwrap();
        storage
            .save_analysis(&AnalysisReport::new(AnalysisKind::Gap, "a.pdf", "g"))
            .unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.session_count, 1);
        assert_eq!(stats.turn_count, 1);
        assert_eq!(stats.evaluation_count, 1);
        assert_eq!(stats.target_count, 1);
        assert_eq!(stats.analysis_count, 1);
        assert_eq!(stats.schema_version, CURRENT_SCHEMA_VERSION);

        storage.reset().unwrap();
        let stats = storage.stats().unwrap();
        assert_eq!(stats.turn_count + stats.evaluation_count + stats.analysis_count, 0);
        assert!(storage.is_initialized().unwrap());
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("steward.db");

        let mut storage = SqliteStorage::open(&path).unwrap();
        storage.init().unwrap();
        storage
            .append_turn("s", &ConversationTurn::answered("q", "a", Vec::new(), None))
            .unwrap();
        drop(storage);

        let reopened = SqliteStorage::open(&path).unwrap();
        assert_eq!(reopened.load_conversation("s").unwrap().len(), 1);
        assert!(reopened.stats().unwrap().db_size.is_some_and(|size| size > 0));
    }
}
