//! Client configuration with sensible defaults.
//!
//! [`DuneConfig`] controls the API endpoint, request timeouts and the
//! cadence used while waiting for a query execution to finish.

use crate::error::DuneError;

/// Public Dune API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.dune.com";

/// Configuration for a [`DuneClient`](crate::DuneClient).
#[derive(Clone)]
pub struct DuneConfig {
    /// API key sent as `X-Dune-API-Key`.
    pub api_key: String,
    /// Base URL of the API (no trailing `/api/v1`).
    pub base_url: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Delay between execution status polls in milliseconds.
    pub poll_interval_ms: u64,
    /// Upper bound on how long to wait for one execution, in seconds.
    pub execution_timeout_seconds: u64,
}

impl std::fmt::Debug for DuneConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuneConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("execution_timeout_seconds", &self.execution_timeout_seconds)
            .finish()
    }
}

impl DuneConfig {
    /// Create a config for the public endpoint with the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout_seconds: 30,
            poll_interval_ms: 5_000,
            execution_timeout_seconds: 900,
        }
    }

    /// Point the client at a different endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the per-request timeout in seconds.
    pub fn with_timeout_seconds(mut self, secs: u64) -> Self {
        self.timeout_seconds = secs;
        self
    }

    /// Set the status poll interval in milliseconds.
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the execution wait limit in seconds.
    pub fn with_execution_timeout_seconds(mut self, secs: u64) -> Self {
        self.execution_timeout_seconds = secs;
        self
    }

    /// Validates this configuration.
    ///
    /// Checks:
    /// - `api_key` must not be blank
    /// - `base_url` must parse as an absolute URL
    /// - `timeout_seconds` and `execution_timeout_seconds` must be greater than 0
    pub fn validate(&self) -> Result<(), DuneError> {
        if self.api_key.trim().is_empty() {
            return Err(DuneError::Config("api_key must not be empty".into()));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| DuneError::Config(format!("invalid base_url: {e}")))?;
        if self.timeout_seconds == 0 {
            return Err(DuneError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.execution_timeout_seconds == 0 {
            return Err(DuneError::Config(
                "execution_timeout_seconds must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
