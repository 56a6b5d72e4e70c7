//! Remote service credential.
//!
//! The key comes from an explicit override (the `--api-key` flag) or the
//! `DUNE_API_KEY` environment variable, in that order. Blank values count as
//! missing. The key never appears in `Debug` or `Display` output.

use std::fmt;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "DUNE_API_KEY";

/// Credential errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("API key required: set {API_KEY_ENV} or pass --api-key")]
    Missing,
}

/// API key for the remote query service.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The secret value, for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Resolve from `override_key`, then the environment.
    ///
    /// # Errors
    ///
    /// [`CredentialError::Missing`] when neither source has a non-blank key.
    pub fn resolve(override_key: Option<&str>) -> Result<Self, CredentialError> {
        Self::resolve_from(override_key, std::env::var(API_KEY_ENV).ok().as_deref())
    }

    fn resolve_from(override_key: Option<&str>, env_key: Option<&str>) -> Result<Self, CredentialError> {
        override_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or_else(|| env_key.map(str::trim).filter(|k| !k.is_empty()))
            .map(Self::new)
            .ok_or(CredentialError::Missing)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&"[REDACTED]").finish()
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}
