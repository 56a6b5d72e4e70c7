//! # dune-client
//!
//! Minimal async client for the Dune Analytics query API, embedded in the
//! x402 pipeline as a library dependency.
//!
//! ## Design
//!
//! - One [`DuneClient`] per API key; the key travels as a sensitive header
//!   and never appears in `Debug` output or error messages
//! - `run_query` executes, polls status on a fixed cadence and reads results
//! - `latest_results` reads the most recent execution without spending credits
//! - Every [`DuneError`] classifies itself as transient or permanent so callers
//!   can drive their own retry policy
//!
//! ```no_run
//! # async fn example() -> dune_client::Result<()> {
//! let client = dune_client::DuneClient::new(dune_client::DuneConfig::new("api-key"))?;
//! let rows = client.run_query(6084845).await?.into_rows();
//! println!("{} rows", rows.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use client::DuneClient;
pub use config::DuneConfig;
pub use error::{DuneError, Result};
pub use types::{ExecutionState, ResultsResponse, Row};
