//! Error types for the dune-client crate.
//!
//! Messages never include the API key. Every variant reports whether a
//! retry has a reasonable chance of succeeding via [`DuneError::is_transient`].

/// Errors that can occur while talking to the Dune API.
#[derive(Debug, thiserror::Error)]
pub enum DuneError {
    /// Transport-level failure (DNS, connect, reset, TLS).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The API answered with a non-success status code.
    #[error("API returned HTTP {code}: {body}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Truncated response body.
        body: String,
    },

    /// A request or an execution wait exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The remote execution ended in a non-completed terminal state.
    #[error("execution {execution_id} ended in state {state}")]
    ExecutionFailed {
        /// Remote execution handle.
        execution_id: String,
        /// Terminal state reported by the API.
        state: String,
    },

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl DuneError {
    /// Returns `true` when the failure is worth retrying.
    ///
    /// Transport failures, timeouts, rate limiting (429), server errors (5xx)
    /// and failed executions are transient. Other 4xx responses, decode
    /// failures and configuration errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) | Self::ExecutionFailed { .. } => true,
            Self::Status { code, .. } => *code == 429 || *code >= 500,
            Self::Decode(_) | Self::Config(_) => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// Convenience type alias for dune-client results.
pub type Result<T> = std::result::Result<T, DuneError>;
