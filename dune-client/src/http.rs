//! Shared HTTP client construction for Dune API requests.

use crate::config::DuneConfig;
use crate::error::DuneError;
use reqwest::header::{HeaderMap, HeaderValue};
use std::time::Duration;

/// Header carrying the API key on every request.
pub const API_KEY_HEADER: &str = "X-Dune-API-Key";

/// Build a [`reqwest::Client`] configured for the Dune API.
///
/// The client has:
/// - The API key installed as a sensitive default header
/// - Timeout from config
/// - A crate-identifying User-Agent
/// - gzip decompression
///
/// # Errors
///
/// Returns [`DuneError::Config`] if the key is not a valid header value, or
/// [`DuneError::Http`] if the client cannot be constructed.
pub fn build_client(config: &DuneConfig) -> Result<reqwest::Client, DuneError> {
    let mut key = HeaderValue::from_str(&config.api_key)
        .map_err(|_| DuneError::Config("api_key contains invalid header characters".into()))?;
    key.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(API_KEY_HEADER, key);

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(concat!("dune-client/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| DuneError::Http(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_client_with_default_config() {
        let client = build_client(&DuneConfig::new("key"));
        assert!(client.is_ok());
    }

    #[test]
    fn newline_in_key_is_rejected() {
        let err = build_client(&DuneConfig::new("bad\nkey")).unwrap_err();
        assert!(matches!(err, DuneError::Config(_)));
    }
}
