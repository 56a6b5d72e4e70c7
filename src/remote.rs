//! Narrow contract with the remote query-execution service.
//!
//! The fetcher only needs "give me the rows for query N", in one of two
//! modes. [`QueryService`] is that seam; [`dune_client::DuneClient`] is the
//! production implementation and tests substitute their own.

use crate::cache::Row;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type returned by remote calls.
pub type RemoteError = dune_client::DuneError;

/// How rows are obtained from the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchMode {
    /// Trigger a new execution and wait for it. Consumes remote quota.
    #[default]
    ExecuteAndWait,
    /// Read the most recent execution without triggering a new one.
    GetLatest,
}

impl FetchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExecuteAndWait => "execute-and-wait",
            Self::GetLatest => "get-latest",
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "execute-and-wait" => Ok(Self::ExecuteAndWait),
            "get-latest" => Ok(Self::GetLatest),
            other => Err(format!(
                "unknown fetch mode '{other}' (expected execute-and-wait or get-latest)"
            )),
        }
    }
}

/// A source of query result rows.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Fetch the rows of `query_id`. An absent result is an empty vector.
    async fn fetch_rows(&self, query_id: i64, mode: FetchMode) -> Result<Vec<Row>, RemoteError>;
}

#[async_trait]
impl QueryService for dune_client::DuneClient {
    async fn fetch_rows(&self, query_id: i64, mode: FetchMode) -> Result<Vec<Row>, RemoteError> {
        let response = match mode {
            FetchMode::ExecuteAndWait => self.run_query(query_id).await?,
            FetchMode::GetLatest => self.latest_results(query_id).await?,
        };
        Ok(response.into_rows())
    }
}
