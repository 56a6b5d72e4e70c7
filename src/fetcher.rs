//! Retrying fetcher: one remote call per logical name, stored on success.
//!
//! Lookup failures never reach the network and never write to the cache.
//! Remote failures are retried per [`RetryPolicy`] and, once retries are
//! spent, handed back as a [`RetryFailure`] carrying the attempt count.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::cache::{CacheError, ResultCache, Row, fetch_timestamp};
use crate::catalog::{CatalogError, QueryCatalog};
use crate::remote::{FetchMode, QueryService, RemoteError};
use crate::retry::{RetryFailure, RetryPolicy, retry_with_backoff};

/// Default pause between consecutive remote calls in [`Fetcher::fetch_all`].
pub const DEFAULT_FETCH_DELAY_MS: u64 = 1_000;

/// Errors from a single fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    NotFound(#[from] CatalogError),

    #[error("remote fetch failed: {0}")]
    Remote(#[from] RetryFailure<RemoteError>),

    #[error("cache write failed: {0}")]
    Cache(#[from] CacheError),
}

/// A successful fetch that has been written to the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub logical_name: String,
    pub query_id: i64,
    /// Id of the new cache entry.
    pub entry_id: i64,
    pub timestamp: String,
    pub rows: Vec<Row>,
}

impl Fetched {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Outcome for one name in a fetch-all run.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub logical_name: String,
    pub query_id: i64,
    /// Rows stored on success, the error message otherwise.
    pub result: Result<usize, String>,
}

/// Per-name outcomes of [`Fetcher::fetch_all`], in catalog order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchAllReport {
    pub outcomes: Vec<FetchOutcome>,
}

impl FetchAllReport {
    /// Number of names fetched and stored.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Number of names attempted.
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Names whose fetch failed.
    pub fn failed(&self) -> impl Iterator<Item = &FetchOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Resolves names, calls the remote service with retries and appends results
/// to the cache.
#[derive(Clone)]
pub struct Fetcher {
    catalog: Arc<QueryCatalog>,
    cache: ResultCache,
    service: Arc<dyn QueryService>,
    policy: RetryPolicy,
    mode: FetchMode,
    fetch_delay: Duration,
}

impl Fetcher {
    pub fn new(
        catalog: Arc<QueryCatalog>,
        cache: ResultCache,
        service: Arc<dyn QueryService>,
    ) -> Self {
        Self {
            catalog,
            cache,
            service,
            policy: RetryPolicy::default(),
            mode: FetchMode::default(),
            fetch_delay: Duration::from_millis(DEFAULT_FETCH_DELAY_MS),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Mode used by [`Fetcher::fetch_all`].
    pub fn with_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    /// Fetch `logical_name` and append the rows to the cache.
    ///
    /// # Errors
    ///
    /// - [`FetchError::NotFound`] for a name missing from the catalog. No
    ///   remote call is made and nothing is written.
    /// - [`FetchError::Remote`] when the remote call failed for good.
    /// - [`FetchError::Cache`] when the rows could not be stored.
    pub async fn fetch(&self, logical_name: &str, mode: FetchMode) -> Result<Fetched, FetchError> {
        let query_id = self.catalog.resolve(logical_name)?;
        info!(query = %logical_name, query_id, %mode, "fetching");

        let service = Arc::clone(&self.service);
        let rows = retry_with_backoff(&self.policy, |_attempt| {
            let service = Arc::clone(&service);
            async move { service.fetch_rows(query_id, mode).await }
        })
        .await?;

        let timestamp = fetch_timestamp();
        let entry_id = self
            .cache
            .append(logical_name, query_id, &rows, &timestamp)?;
        info!(query = %logical_name, query_id, rows = rows.len(), entry_id, "stored");

        Ok(Fetched {
            logical_name: logical_name.to_owned(),
            query_id,
            entry_id,
            timestamp,
            rows,
        })
    }

    /// Fetch every catalog entry in order, one at a time, pausing
    /// `fetch_delay` between consecutive calls.
    ///
    /// Individual failures are logged and recorded; they do not stop the run.
    pub async fn fetch_all(&self) -> FetchAllReport {
        let mut report = FetchAllReport::default();
        for (i, entry) in self.catalog.entries().iter().enumerate() {
            if i > 0 && !self.fetch_delay.is_zero() {
                tokio::time::sleep(self.fetch_delay).await;
            }
            let result = match self.fetch(&entry.name, self.mode).await {
                Ok(fetched) => Ok(fetched.row_count()),
                Err(e) => {
                    error!(query = %entry.name, query_id = entry.query_id, "fetch failed: {e}");
                    Err(e.to_string())
                }
            };
            report.outcomes.push(FetchOutcome {
                logical_name: entry.name.clone(),
                query_id: entry.query_id,
                result,
            });
        }

        if report.succeeded() < report.total() {
            warn!(
                succeeded = report.succeeded(),
                total = report.total(),
                "fetch-all finished with failures"
            );
        } else {
            info!(total = report.total(), "fetch-all finished");
        }
        report
    }
}
