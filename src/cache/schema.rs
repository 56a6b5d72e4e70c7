//! SQLite DDL for the result cache.
//!
//! All `CREATE TABLE` / `CREATE INDEX` statements live here so they are
//! reviewable and testable in isolation.

use rusqlite::Connection;

use super::types::CURRENT_SCHEMA_VERSION;

/// Complete DDL for the cache database.
///
/// Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
-- Readers never block the single writer.
PRAGMA journal_mode = WAL;

-- Schema version tracking.
CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Append-only fetch results. Rows are never updated or deleted.
CREATE TABLE IF NOT EXISTS query_results (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    logical_name TEXT NOT NULL,
    query_id     INTEGER NOT NULL,
    data         TEXT NOT NULL,      -- JSON array of row objects
    timestamp    TEXT NOT NULL,      -- RFC 3339 UTC, microsecond precision
    row_count    INTEGER NOT NULL,
    created_at   TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_logical_name ON query_results(logical_name);
CREATE INDEX IF NOT EXISTS idx_timestamp    ON query_results(timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_query_id     ON query_results(query_id);
"#;

/// Apply the full schema to an open connection.
///
/// Safe to call multiple times. Seeds the schema version on a fresh database.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Read the current schema version.
///
/// Returns `None` if the key is missing.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}
