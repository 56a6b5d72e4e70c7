//! Read-side views over the latest cached result of a name.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::cache::{CacheError, ResultCache, Row};
use crate::catalog::{CatalogError, QueryCatalog};

/// Errors from the access layer.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error(transparent)]
    NotFound(#[from] CatalogError),

    /// The name is known but has no usable cached entry.
    #[error("no cached data for '{name}'")]
    NoData { name: String },

    #[error("cache read failed: {0}")]
    Cache(#[from] CacheError),
}

/// A slice of the latest cached data plus its context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub rows: Vec<Row>,
    /// Rows in the full latest entry.
    pub total_rows: usize,
    /// Fetch timestamp of the latest entry.
    pub last_updated: String,
}

/// One line of [`Access::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryListing {
    pub logical_name: String,
    pub query_id: i64,
    pub last_fetch: Option<String>,
    pub row_count: i64,
}

/// Pagination, tail and listing over the cache.
#[derive(Debug, Clone)]
pub struct Access {
    catalog: Arc<QueryCatalog>,
    cache: ResultCache,
}

impl Access {
    pub fn new(catalog: Arc<QueryCatalog>, cache: ResultCache) -> Self {
        Self { catalog, cache }
    }

    /// `data[offset..offset + limit]` of the latest entry, clamped to its
    /// length.
    pub fn get(&self, logical_name: &str, limit: usize, offset: usize) -> Result<Page, AccessError> {
        let (rows, last_updated) = self.latest_rows(logical_name)?;
        let total_rows = rows.len();
        let start = offset.min(total_rows);
        let end = start.saturating_add(limit).min(total_rows);
        Ok(Page {
            rows: rows[start..end].to_vec(),
            total_rows,
            last_updated,
        })
    }

    /// The last `n` rows of the latest entry, or all of them when there are
    /// `n` or fewer.
    pub fn tail(&self, logical_name: &str, n: usize) -> Result<Page, AccessError> {
        let (mut rows, last_updated) = self.latest_rows(logical_name)?;
        let total_rows = rows.len();
        let start = total_rows.saturating_sub(n);
        Ok(Page {
            rows: rows.split_off(start),
            total_rows,
            last_updated,
        })
    }

    /// Every catalog entry with its latest fetch time and row count.
    pub fn list(&self) -> Result<Vec<QueryListing>, AccessError> {
        self.catalog
            .entries()
            .iter()
            .map(|entry| {
                let info = self.cache.latest_info(&entry.name)?;
                Ok(QueryListing {
                    logical_name: entry.name.clone(),
                    query_id: entry.query_id,
                    last_fetch: info.as_ref().map(|i| i.timestamp.clone()),
                    row_count: info.map_or(0, |i| i.row_count),
                })
            })
            .collect()
    }

    fn latest_rows(&self, logical_name: &str) -> Result<(Vec<Row>, String), AccessError> {
        self.catalog.resolve(logical_name)?;
        let no_data = || AccessError::NoData {
            name: logical_name.to_owned(),
        };
        let entry = self.cache.latest(logical_name)?.ok_or_else(no_data)?;
        match entry.rows() {
            Ok(rows) => Ok((rows, entry.timestamp)),
            Err(e) => {
                warn!(query = %logical_name, "{e}");
                Err(no_data())
            }
        }
    }
}
