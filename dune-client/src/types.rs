//! Wire types for the Dune execution and results endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One result row: an ordered mapping of column name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Lifecycle state of a remote query execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionState {
    /// Queued, not started.
    #[serde(rename = "QUERY_STATE_PENDING")]
    Pending,
    /// Running.
    #[serde(rename = "QUERY_STATE_EXECUTING")]
    Executing,
    /// Finished; results are available.
    #[serde(rename = "QUERY_STATE_COMPLETED")]
    Completed,
    /// Finished with a truncated result set.
    #[serde(rename = "QUERY_STATE_COMPLETED_PARTIAL")]
    CompletedPartial,
    /// Failed on the remote side.
    #[serde(rename = "QUERY_STATE_FAILED")]
    Failed,
    /// Cancelled before completion.
    #[serde(rename = "QUERY_STATE_CANCELLED")]
    Cancelled,
    /// Results expired and are no longer retrievable.
    #[serde(rename = "QUERY_STATE_EXPIRED")]
    Expired,
    /// Any state this client does not recognise.
    #[serde(other)]
    Unknown,
}

impl ExecutionState {
    /// Returns the API's string form of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "QUERY_STATE_PENDING",
            Self::Executing => "QUERY_STATE_EXECUTING",
            Self::Completed => "QUERY_STATE_COMPLETED",
            Self::CompletedPartial => "QUERY_STATE_COMPLETED_PARTIAL",
            Self::Failed => "QUERY_STATE_FAILED",
            Self::Cancelled => "QUERY_STATE_CANCELLED",
            Self::Expired => "QUERY_STATE_EXPIRED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns `true` when polling can stop.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Executing | Self::Unknown)
    }

    /// Returns `true` when results can be read.
    pub fn has_results(&self) -> bool {
        matches!(self, Self::Completed | Self::CompletedPartial)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of `POST /api/v1/query/{id}/execute`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteResponse {
    /// Handle for status and result lookups.
    pub execution_id: String,
    /// Initial state.
    pub state: ExecutionState,
}

/// Response of `GET /api/v1/execution/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    /// Handle this status belongs to.
    pub execution_id: String,
    /// Current state.
    pub state: ExecutionState,
}

/// Response of the results endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultsResponse {
    /// Handle the results belong to, when reported.
    #[serde(default)]
    pub execution_id: Option<String>,
    /// State at the time of the read, when reported.
    #[serde(default)]
    pub state: Option<ExecutionState>,
    /// Result payload; absent when the execution produced nothing.
    #[serde(default)]
    pub result: Option<QueryResult>,
}

impl ResultsResponse {
    /// Consume the response, returning its rows (empty when absent).
    pub fn into_rows(self) -> Vec<Row> {
        self.result
            .and_then(|r| r.rows)
            .unwrap_or_default()
    }
}

/// The `result` object of a results response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResult {
    /// Result rows in API order.
    #[serde(default)]
    pub rows: Option<Vec<Row>>,
    /// Column metadata, kept opaque.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_state_deserializes() {
        let state: ExecutionState = serde_json::from_str("\"QUERY_STATE_SOMETHING_NEW\"").unwrap();
        assert_eq!(state, ExecutionState::Unknown);
        assert!(!state.is_terminal());
    }

    #[test]
    fn terminal_states() {
        assert!(ExecutionState::Completed.is_terminal());
        assert!(ExecutionState::Failed.is_terminal());
        assert!(!ExecutionState::Executing.is_terminal());
        assert!(ExecutionState::CompletedPartial.has_results());
        assert!(!ExecutionState::Cancelled.has_results());
    }

    #[test]
    fn missing_result_yields_no_rows() {
        let resp: ResultsResponse =
            serde_json::from_str(r#"{"execution_id":"e1","state":"QUERY_STATE_COMPLETED"}"#)
                .unwrap();
        assert!(resp.into_rows().is_empty());
    }

    #[test]
    fn rows_keep_column_order() {
        let resp: ResultsResponse = serde_json::from_str(
            r#"{"result":{"rows":[{"zeta":1,"alpha":2}],"metadata":{}}}"#,
        )
        .unwrap();
        let rows = resp.into_rows();
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }
}
