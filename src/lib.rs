//! x402 pipeline: scheduled fetch, cache and export of Dune Analytics
//! query results.
//!
//! Query results flow through independent stages:
//! Catalog → Fetcher → Cache → Access / Exporter → Transform
//!
//! # Architecture
//!
//! - **Catalog**: immutable logical-name → query-id table
//! - **Fetcher**: one remote call per name, bounded exponential backoff
//! - **Cache**: append-only SQLite store; latest entry per name wins
//! - **Access**: pagination and tail over the latest cached rows
//! - **Exporter**: enriched Parquet/CSV snapshot plus a JSON schema descriptor
//! - **Transform**: external `dbt run`, best-effort
//! - **Scheduler**: interval loop with a shortened retry after failed runs

pub mod access;
pub mod app_dirs;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod credentials;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod logging;
pub mod pipeline;
pub mod remote;
pub mod retry;
pub mod scheduler;
pub mod transform;

pub use access::Access;
pub use cache::ResultCache;
pub use catalog::{CatalogEntry, QueryCatalog};
pub use config::PipelineConfig;
pub use credentials::ApiKey;
pub use error::{PipelineError, Result};
pub use export::{ExportCapability, ExportFormat, Exporter};
pub use fetcher::Fetcher;
pub use pipeline::{Pipeline, RunReport};
pub use remote::{FetchMode, QueryService};
pub use scheduler::Scheduler;
pub use transform::{DbtTransform, TransformTrigger};
