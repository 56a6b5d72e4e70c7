//! Result cache: durable, append-only storage of fetch results.

mod schema;
mod sqlite;
mod types;

pub use sqlite::{CacheError, ResultCache};
pub use types::{CachedResult, LatestInfo, Row, fetch_timestamp};
