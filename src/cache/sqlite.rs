//! SQLite-backed result cache.
//!
//! A connection is opened per operation and dropped when it returns; nothing
//! is held across calls. Every append is a single `INSERT`, so an interrupted
//! process never leaves a partial entry behind.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};

use super::schema::{apply_schema, read_schema_version};
use super::types::{CachedResult, LatestInfo, Row};

/// Append-only store of fetch results keyed by logical name.
#[derive(Debug, Clone)]
pub struct ResultCache {
    db_path: PathBuf,
}

impl ResultCache {
    /// Open (or create) the cache database at `db_path`.
    ///
    /// Creates missing parent directories and applies the schema.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Io(e.to_string()))?;
        }
        let conn = Connection::open(&db_path)?;
        apply_schema(&conn)?;
        Ok(Self { db_path })
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Read the schema version stamp.
    pub fn schema_version(&self) -> Result<Option<u32>, CacheError> {
        let conn = self.connect()?;
        Ok(read_schema_version(&conn)?)
    }

    /// Store a new fetch result and return its id.
    ///
    /// `row_count` is taken from `rows.len()`.
    pub fn append(
        &self,
        logical_name: &str,
        query_id: i64,
        rows: &[Row],
        timestamp: &str,
    ) -> Result<i64, CacheError> {
        let data = serde_json::to_string(rows).map_err(|e| CacheError::Serialize(e.to_string()))?;
        self.insert_payload(logical_name, query_id, &data, rows.len() as i64, timestamp)
    }

    /// Insert a raw, already serialized payload.
    pub(crate) fn insert_payload(
        &self,
        logical_name: &str,
        query_id: i64,
        data: &str,
        row_count: i64,
        timestamp: &str,
    ) -> Result<i64, CacheError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO query_results (logical_name, query_id, data, timestamp, row_count) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![logical_name, query_id, data, timestamp, row_count],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Latest entry for `logical_name`: greatest timestamp, then greatest id.
    pub fn latest(&self, logical_name: &str) -> Result<Option<CachedResult>, CacheError> {
        let conn = self.connect()?;
        let result = conn
            .query_row(
                "SELECT id, logical_name, query_id, data, timestamp, row_count \
                 FROM query_results WHERE logical_name = ?1 \
                 ORDER BY timestamp DESC, id DESC LIMIT 1",
                params![logical_name],
                row_to_result,
            )
            .optional()?;
        Ok(result)
    }

    /// Timestamp and row count of the latest entry, without the payload.
    pub fn latest_info(&self, logical_name: &str) -> Result<Option<LatestInfo>, CacheError> {
        let conn = self.connect()?;
        let info = conn
            .query_row(
                "SELECT timestamp, row_count FROM query_results WHERE logical_name = ?1 \
                 ORDER BY timestamp DESC, id DESC LIMIT 1",
                params![logical_name],
                |row| {
                    Ok(LatestInfo {
                        timestamp: row.get(0)?,
                        row_count: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(info)
    }

    /// Total number of stored entries.
    pub fn count(&self) -> Result<u64, CacheError> {
        let conn = self.connect()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM query_results", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    /// Number of stored entries for one logical name.
    pub fn count_for(&self, logical_name: &str) -> Result<u64, CacheError> {
        let conn = self.connect()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM query_results WHERE logical_name = ?1",
            params![logical_name],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }

    fn connect(&self) -> Result<Connection, CacheError> {
        Ok(Connection::open(&self.db_path)?)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from the result cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("failed to serialize rows: {0}")]
    Serialize(String),

    #[error("cached entry {id} has a malformed payload: {reason}")]
    MalformedPayload { id: i64, reason: String },
}

fn row_to_result(row: &rusqlite::Row<'_>) -> rusqlite::Result<CachedResult> {
    Ok(CachedResult {
        id: row.get(0)?,
        logical_name: row.get(1)?,
        query_id: row.get(2)?,
        data: row.get(3)?,
        timestamp: row.get(4)?,
        row_count: row.get(5)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
