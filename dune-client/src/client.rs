//! Async client for the Dune query execution API.
//!
//! Two read paths are supported:
//!
//! - [`DuneClient::run_query`] triggers a fresh execution, polls its status
//!   until a terminal state and then reads the results. This consumes
//!   execution credits on the remote side.
//! - [`DuneClient::latest_results`] reads whatever the most recent execution
//!   of a query produced, without starting a new one.

use crate::config::DuneConfig;
use crate::error::{DuneError, Result};
use crate::http::build_client;
use crate::types::{ExecuteResponse, ResultsResponse, StatusResponse};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Longest response-body excerpt kept in error messages.
const ERROR_BODY_LIMIT: usize = 500;

/// Dune API client.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct DuneClient {
    config: DuneConfig,
    http: reqwest::Client,
}

impl DuneClient {
    /// Create a client after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`DuneError::Config`] for an invalid configuration.
    pub fn new(config: DuneConfig) -> Result<Self> {
        config.validate()?;
        let http = build_client(&config)?;
        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Start a new execution of `query_id`.
    pub async fn execute(&self, query_id: i64) -> Result<ExecuteResponse> {
        let url = self.url(&format!("query/{query_id}/execute"));
        debug!(query_id, "starting remote execution");
        self.send_json(self.http.post(&url).json(&serde_json::json!({})))
            .await
    }

    /// Read the current state of an execution.
    pub async fn status(&self, execution_id: &str) -> Result<StatusResponse> {
        let url = self.url(&format!("execution/{execution_id}/status"));
        self.send_json(self.http.get(&url)).await
    }

    /// Read the results of a finished execution.
    pub async fn execution_results(&self, execution_id: &str) -> Result<ResultsResponse> {
        let url = self.url(&format!("execution/{execution_id}/results"));
        self.send_json(self.http.get(&url)).await
    }

    /// Read the results of the most recent execution of `query_id`.
    pub async fn latest_results(&self, query_id: i64) -> Result<ResultsResponse> {
        let url = self.url(&format!("query/{query_id}/results"));
        debug!(query_id, "reading latest remote results");
        self.send_json(self.http.get(&url)).await
    }

    /// Execute `query_id`, wait for it to finish and return its results.
    ///
    /// # Errors
    ///
    /// - [`DuneError::ExecutionFailed`] if the execution ends failed, cancelled
    ///   or expired.
    /// - [`DuneError::Timeout`] if it does not finish within
    ///   `execution_timeout_seconds`.
    pub async fn run_query(&self, query_id: i64) -> Result<ResultsResponse> {
        let started = self.execute(query_id).await?;
        let execution_id = started.execution_id;
        let deadline = execution_deadline(
            Instant::now(),
            Duration::from_secs(self.config.execution_timeout_seconds),
        );
        let poll = Duration::from_millis(self.config.poll_interval_ms);

        let mut state = started.state;
        while !state.is_terminal() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(DuneError::Timeout(format!(
                    "execution {execution_id} still {state} after {}s",
                    self.config.execution_timeout_seconds
                )));
            }
            tokio::time::sleep(poll).await;
            state = self.status(&execution_id).await?.state;
            trace!(%execution_id, %state, "polled execution state");
        }

        if !state.has_results() {
            return Err(DuneError::ExecutionFailed {
                execution_id,
                state: state.to_string(),
            });
        }

        self.execution_results(&execution_id).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(DuneError::from_reqwest)?;
        let status = response.status();
        let body = response.text().await.map_err(DuneError::from_reqwest)?;

        if !status.is_success() {
            return Err(DuneError::Status {
                code: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        serde_json::from_str(&body).map_err(|e| DuneError::Decode(e.to_string()))
    }
}

/// `None` when the timeout reaches past what an `Instant` can hold, which
/// means no deadline.
fn execution_deadline(start: Instant, timeout: Duration) -> Option<Instant> {
    start.checked_add(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_execution_timeout_means_no_deadline() {
        let now = Instant::now();
        assert_eq!(
            execution_deadline(now, Duration::from_secs(5)),
            Some(now + Duration::from_secs(5))
        );
        assert_eq!(execution_deadline(now, Duration::from_secs(u64::MAX)), None);
    }

    #[test]
    fn new_rejects_invalid_config() {
        let result = DuneClient::new(DuneConfig::new(""));
        assert!(matches!(result, Err(DuneError::Config(_))));
    }

    #[test]
    fn url_strips_trailing_slash() {
        let client =
            DuneClient::new(DuneConfig::new("k").with_base_url("http://localhost:9/")).unwrap();
        assert_eq!(
            client.url("query/1/results"),
            "http://localhost:9/api/v1/query/1/results"
        );
    }

    #[test]
    fn client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DuneClient>();
    }
}
