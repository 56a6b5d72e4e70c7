//! Core types for the result cache.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

use super::CacheError;

/// Current cache schema version.
pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

/// One result row: an ordered mapping of column name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// One stored fetch outcome.
///
/// `data` holds the serialized row array exactly as written; it is parsed
/// on demand by [`CachedResult::rows`] so that a damaged payload can be
/// reported per entry instead of failing the whole read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    /// Monotonically increasing row id.
    pub id: i64,
    /// Catalog name the result was fetched for.
    pub logical_name: String,
    /// Remote query identifier at fetch time.
    pub query_id: i64,
    /// Serialized JSON array of rows.
    pub data: String,
    /// Fetch completion time, RFC 3339 UTC.
    pub timestamp: String,
    /// Number of rows at write time.
    pub row_count: i64,
}

impl CachedResult {
    /// Parse the stored payload.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::MalformedPayload`] if `data` is not a JSON array
    /// of objects.
    pub fn rows(&self) -> Result<Vec<Row>, CacheError> {
        serde_json::from_str(&self.data).map_err(|e| CacheError::MalformedPayload {
            id: self.id,
            reason: e.to_string(),
        })
    }
}

/// Fetch metadata for the latest entry of a name, without its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestInfo {
    /// Fetch completion time.
    pub timestamp: String,
    /// Rows stored with that fetch.
    pub row_count: i64,
}

static LAST_STAMP_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Timestamp for a completed fetch.
///
/// Strictly increasing within the process even when the wall clock repeats
/// a microsecond, so lexical order of stamps matches fetch order.
pub fn fetch_timestamp() -> String {
    let now = Utc::now().timestamp_micros();
    let mut prev = LAST_STAMP_MICROS.load(Ordering::Relaxed);
    let issued = loop {
        let candidate = now.max(prev.saturating_add(1));
        match LAST_STAMP_MICROS.compare_exchange_weak(
            prev,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break candidate,
            Err(actual) => prev = actual,
        }
    };
    format_micros(issued)
}

fn format_micros(micros: i64) -> String {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}
