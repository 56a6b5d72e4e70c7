//! Error types for the x402 pipeline.

use crate::access::AccessError;
use crate::cache::CacheError;
use crate::catalog::CatalogError;
use crate::credentials::CredentialError;
use crate::export::ExportError;
use crate::fetcher::FetchError;

/// Top-level error type for the fetch–cache–export pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Missing or unusable credential.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Unknown logical query name.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Remote fetch failed after retries, or could not be stored.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Result cache read/write error.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Pagination / tail lookup error.
    #[error("access error: {0}")]
    Access(#[from] AccessError),

    /// Snapshot export error.
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// Remote client construction error.
    #[error("remote error: {0}")]
    Remote(#[from] dune_client::DuneError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PipelineError>;
