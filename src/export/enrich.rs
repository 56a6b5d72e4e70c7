//! Row enrichment with tracking metadata.

use serde_json::Value;

use crate::cache::Row;

/// Reserved tracking columns added to every exported row.
pub const QUERY_NAME_FIELD: &str = "_query_name";
pub const QUERY_ID_FIELD: &str = "_query_id";
pub const FETCHED_AT_FIELD: &str = "_fetched_at";
pub const EXPORTED_AT_FIELD: &str = "_exported_at";

pub const RESERVED_FIELDS: [&str; 4] = [
    QUERY_NAME_FIELD,
    QUERY_ID_FIELD,
    FETCHED_AT_FIELD,
    EXPORTED_AT_FIELD,
];

/// Tracking values for one cached entry within one export.
#[derive(Debug, Clone, Copy)]
pub struct Provenance<'a> {
    pub query_name: &'a str,
    pub query_id: i64,
    pub fetched_at: &'a str,
    pub exported_at: &'a str,
}

impl Provenance<'_> {
    /// Source row plus the reserved fields.
    ///
    /// Reserved fields always win over same-named source fields. A colliding
    /// source column keeps its position; new ones are appended.
    pub fn apply(&self, row: &Row) -> Row {
        let mut out = row.clone();
        out.insert(QUERY_NAME_FIELD.into(), Value::from(self.query_name));
        out.insert(QUERY_ID_FIELD.into(), Value::from(self.query_id));
        out.insert(FETCHED_AT_FIELD.into(), Value::from(self.fetched_at));
        out.insert(EXPORTED_AT_FIELD.into(), Value::from(self.exported_at));
        out
    }
}
