//! Snapshot exporter.
//!
//! Joins the latest cached result of every catalog entry into one enriched
//! dataset and writes it as Parquet and/or CSV next to a JSON schema
//! descriptor. Every run gets fresh, timestamp-suffixed file names, so
//! earlier exports are never overwritten.
//!
//! Entries with no cache row, an unreadable payload or zero rows are skipped
//! with a warning. If nothing survives, no file is written and the summary
//! comes back empty.

pub mod enrich;
pub mod schema;
mod writer;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::{CacheError, ResultCache, Row};
use crate::catalog::QueryCatalog;
use enrich::Provenance;
use schema::{IntegrationNotes, SchemaDescriptor, infer_columns};
use writer::{TabularTargets, write_tabular};

pub use writer::ExportCapability;

/// Default export directory.
pub const DEFAULT_OUTPUT_DIR: &str = "data/exports";

/// Which tabular files an export writes. The schema descriptor is always
/// written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExportFormat {
    /// Parquet only.
    #[serde(rename = "parquet")]
    Columnar,
    /// CSV only.
    #[serde(rename = "csv")]
    Text,
    #[default]
    #[serde(rename = "both")]
    Both,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Columnar => "parquet",
            Self::Text => "csv",
            Self::Both => "both",
        }
    }

    pub fn columnar(&self) -> bool {
        matches!(self, Self::Columnar | Self::Both)
    }

    pub fn text(&self) -> bool {
        matches!(self, Self::Text | Self::Both)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parquet" => Ok(Self::Columnar),
            "csv" => Ok(Self::Text),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "unknown export format '{other}' (expected parquet, csv or both)"
            )),
        }
    }
}

/// Naming and descriptor text for exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSettings {
    /// Prefix of every exported file name.
    pub file_prefix: String,
    pub dataset_name: String,
    pub description: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            file_prefix: "x402_dune".into(),
            dataset_name: "x402_dune_analytics".into(),
            description: "x402 Dune Analytics query results with fetch tracking metadata".into(),
        }
    }
}

/// Export record for one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryExport {
    pub logical_name: String,
    pub query_id: i64,
    pub row_count: i64,
    pub last_fetch: String,
}

/// Result of one export call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub timestamp: String,
    pub queries_exported: Vec<QueryExport>,
    /// Sum of `row_count` over exported entries.
    pub total_rows: i64,
    /// Columnar file, text file, schema file; each only if written.
    pub files_created: Vec<PathBuf>,
    /// One line per skipped entry.
    pub warnings: Vec<String>,
}

impl ExportSummary {
    fn new(timestamp: String) -> Self {
        Self {
            timestamp,
            queries_exported: Vec::new(),
            total_rows: 0,
            files_created: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn skip(&mut self, name: &str, reason: &str) {
        warn!(query = %name, "skipping: {reason}");
        self.warnings.push(format!("skipped '{name}': {reason}"));
    }
}

/// Errors from the exporter.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Tabular export support is missing from this build.
    #[error("tabular export support is not available in this build (enable the `export` feature)")]
    CapabilityUnavailable,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Arrow error: {0}")]
    Arrow(String),

    #[error("Parquet error: {0}")]
    Parquet(String),

    #[error("failed to serialize schema descriptor: {0}")]
    Serialize(String),

    #[error("cache read failed: {0}")]
    Cache(#[from] CacheError),
}

/// Builds snapshots from the cache.
#[derive(Debug, Clone)]
pub struct Exporter {
    catalog: Arc<QueryCatalog>,
    cache: ResultCache,
    capability: ExportCapability,
    settings: ExportSettings,
}

impl Exporter {
    pub fn new(catalog: Arc<QueryCatalog>, cache: ResultCache, capability: ExportCapability) -> Self {
        Self {
            catalog,
            cache,
            capability,
            settings: ExportSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ExportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Export the latest result of every catalog entry into `output_dir`.
    ///
    /// # Errors
    ///
    /// [`ExportError::CapabilityUnavailable`] before anything is read when
    /// export support is missing; I/O, Arrow or Parquet errors while writing.
    pub fn export(&self, output_dir: &Path, format: ExportFormat) -> Result<ExportSummary, ExportError> {
        self.capability.ensure()?;
        self.export_at(output_dir, format, Utc::now())
    }

    fn export_at(
        &self,
        output_dir: &Path,
        format: ExportFormat,
        now: DateTime<Utc>,
    ) -> Result<ExportSummary, ExportError> {
        let exported_at = now.to_rfc3339_opts(SecondsFormat::Micros, true);
        let mut summary = ExportSummary::new(exported_at.clone());
        let mut aggregate: Vec<Row> = Vec::new();

        for entry in self.catalog.entries() {
            let name = entry.name.as_str();
            let Some(cached) = self.cache.latest(name)? else {
                summary.skip(name, "no cached data");
                continue;
            };
            let rows = match cached.rows() {
                Ok(rows) => rows,
                Err(e) => {
                    summary.skip(name, &e.to_string());
                    continue;
                }
            };
            if rows.is_empty() {
                summary.skip(name, "empty result");
                continue;
            }

            let provenance = Provenance {
                query_name: name,
                query_id: entry.query_id,
                fetched_at: &cached.timestamp,
                exported_at: &exported_at,
            };
            aggregate.extend(rows.iter().map(|row| provenance.apply(row)));

            info!(query = %name, rows = cached.row_count, "exporting");
            summary.total_rows += cached.row_count;
            summary.queries_exported.push(QueryExport {
                logical_name: name.to_owned(),
                query_id: entry.query_id,
                row_count: cached.row_count,
                last_fetch: cached.timestamp.clone(),
            });
        }

        if aggregate.is_empty() {
            warn!("nothing to export; run fetch-all first");
            return Ok(summary);
        }

        std::fs::create_dir_all(output_dir).map_err(|e| ExportError::Io(e.to_string()))?;
        let paths = ExportPaths::reserve(output_dir, &self.settings.file_prefix, now, format);

        let columns = infer_columns(&aggregate);
        write_tabular(
            &aggregate,
            &columns,
            &TabularTargets {
                columnar: paths.columnar.as_deref(),
                text: paths.text.as_deref(),
            },
        )?;

        let descriptor = SchemaDescriptor {
            dataset_name: self.settings.dataset_name.clone(),
            description: self.settings.description.clone(),
            export_timestamp: exported_at,
            total_rows: aggregate.len(),
            columns,
            queries: summary.queries_exported.clone(),
            integration: IntegrationNotes::default(),
        };
        let json = serde_json::to_string_pretty(&descriptor)
            .map_err(|e| ExportError::Serialize(e.to_string()))?;
        std::fs::write(&paths.schema, json).map_err(|e| ExportError::Io(e.to_string()))?;

        summary.files_created.extend(paths.columnar);
        summary.files_created.extend(paths.text);
        summary.files_created.push(paths.schema);

        info!(
            queries = summary.queries_exported.len(),
            total_rows = summary.total_rows,
            files = summary.files_created.len(),
            "export complete"
        );
        Ok(summary)
    }
}

/// File names for one export run.
#[derive(Debug)]
struct ExportPaths {
    columnar: Option<PathBuf>,
    text: Option<PathBuf>,
    schema: PathBuf,
}

impl ExportPaths {
    /// Pick the first stamp (`YYYYmmdd_HHMMSS`, then `_1`, `_2`, ...) for
    /// which none of the target files exist.
    fn reserve(dir: &Path, prefix: &str, now: DateTime<Utc>, format: ExportFormat) -> Self {
        let base = now.format("%Y%m%d_%H%M%S").to_string();
        let mut n = 0u32;
        loop {
            let stamp = if n == 0 {
                base.clone()
            } else {
                format!("{base}_{n}")
            };
            let paths = Self {
                columnar: format
                    .columnar()
                    .then(|| dir.join(format!("{prefix}_data_{stamp}.parquet"))),
                text: format
                    .text()
                    .then(|| dir.join(format!("{prefix}_data_{stamp}.csv"))),
                schema: dir.join(format!("{prefix}_schema_{stamp}.json")),
            };
            if !paths.any_exists() {
                return paths;
            }
            n += 1;
        }
    }

    fn any_exists(&self) -> bool {
        self.columnar.iter().chain(self.text.iter()).any(|p| p.exists()) || self.schema.exists()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::cache::fetch_timestamp;
    use crate::catalog::CatalogEntry;
    use chrono::TimeZone;
    use serde_json::{Value, json};

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| json!({ "day": i, "amount": i as f64 * 1.5 }).as_object().cloned().unwrap())
            .collect()
    }

    fn setup(capability: ExportCapability) -> (tempfile::TempDir, Exporter, ResultCache) {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = ResultCache::open(dir.path().join("cache.db")).unwrap();
        let catalog = QueryCatalog::new(vec![
            CatalogEntry::new("A", 1),
            CatalogEntry::new("B", 2),
        ])
        .unwrap();
        let exporter = Exporter::new(Arc::new(catalog), cache.clone(), capability);
        (dir, exporter, cache)
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap()
    }

    #[test]
    fn format_parses_cli_spelling() {
        assert_eq!("parquet".parse::<ExportFormat>(), Ok(ExportFormat::Columnar));
        assert_eq!("csv".parse::<ExportFormat>(), Ok(ExportFormat::Text));
        assert_eq!("both".parse::<ExportFormat>(), Ok(ExportFormat::Both));
        assert!("xlsx".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::default(), ExportFormat::Both);
    }

    #[test]
    fn unavailable_capability_fails_before_reading() {
        let (dir, exporter, cache) = setup(ExportCapability::unavailable());
        cache.append("A", 1, &rows(5), &fetch_timestamp()).unwrap();

        let err = exporter
            .export(&dir.path().join("out"), ExportFormat::Both)
            .unwrap_err();

        assert!(matches!(err, ExportError::CapabilityUnavailable));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn empty_cache_is_a_no_op() {
        let (dir, exporter, _cache) = setup(ExportCapability::detect());
        let out = dir.path().join("out");

        let summary = exporter.export_at(&out, ExportFormat::Both, fixed_now()).unwrap();

        assert_eq!(summary.total_rows, 0);
        assert!(summary.files_created.is_empty());
        assert_eq!(summary.warnings.len(), 2);
        assert!(!out.exists());
    }

    #[test]
    fn empty_and_malformed_entries_are_skipped() {
        let (dir, exporter, cache) = setup(ExportCapability::detect());
        cache.append("A", 1, &[], &fetch_timestamp()).unwrap();
        cache.insert_payload("B", 2, "not json", 3, &fetch_timestamp()).unwrap();

        let summary = exporter
            .export_at(&dir.path().join("out"), ExportFormat::Both, fixed_now())
            .unwrap();

        assert!(summary.queries_exported.is_empty());
        assert_eq!(summary.total_rows, 0);
        assert!(summary.files_created.is_empty());
        assert_eq!(summary.warnings.len(), 2);
    }

    #[test]
    fn file_names_avoid_existing_exports() {
        let dir = tempfile::TempDir::new().unwrap();
        let first = ExportPaths::reserve(dir.path(), "p", fixed_now(), ExportFormat::Text);
        assert_eq!(
            first.text.as_deref(),
            Some(dir.path().join("p_data_20250304_050607.csv").as_path())
        );
        assert!(first.columnar.is_none());
        std::fs::write(&first.schema, "{}").unwrap();

        let second = ExportPaths::reserve(dir.path(), "p", fixed_now(), ExportFormat::Text);
        assert_eq!(second.schema, dir.path().join("p_schema_20250304_050607_1.json"));
    }

    #[cfg(feature = "export")]
    #[test]
    fn exports_only_entries_with_data() {
        let (dir, exporter, cache) = setup(ExportCapability::detect());
        cache.append("A", 1, &rows(5), &fetch_timestamp()).unwrap();
        let out = dir.path().join("out");

        let summary = exporter.export_at(&out, ExportFormat::Both, fixed_now()).unwrap();

        assert_eq!(summary.total_rows, 5);
        assert_eq!(summary.queries_exported.len(), 1);
        assert_eq!(summary.queries_exported[0].logical_name, "A");
        assert_eq!(summary.warnings, vec!["skipped 'B': no cached data".to_owned()]);

        let names: Vec<String> = summary
            .files_created
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "x402_dune_data_20250304_050607.parquet",
                "x402_dune_data_20250304_050607.csv",
                "x402_dune_schema_20250304_050607.json",
            ]
        );
        for path in &summary.files_created {
            assert!(path.exists(), "{} missing", path.display());
        }

        let descriptor: Value =
            serde_json::from_str(&std::fs::read_to_string(&summary.files_created[2]).unwrap())
                .unwrap();
        assert_eq!(descriptor["total_rows"], json!(5));
        assert_eq!(descriptor["dataset_name"], json!("x402_dune_analytics"));
        assert_eq!(descriptor["queries"][0]["query_id"], json!(1));
        let columns: Vec<&str> = descriptor["columns"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            columns,
            vec!["day", "amount", "_query_name", "_query_id", "_fetched_at", "_exported_at"]
        );
        assert_eq!(descriptor["integration"]["recommended_format"], json!("parquet"));
    }

    #[cfg(feature = "export")]
    #[test]
    fn reserved_fields_win_in_exported_data() {
        let (dir, exporter, cache) = setup(ExportCapability::detect());
        let row = json!({ "x": 1, "_query_name": "collision" })
            .as_object()
            .cloned()
            .unwrap();
        cache.append("A", 1, &[row], &fetch_timestamp()).unwrap();

        let summary = exporter
            .export_at(&dir.path().join("out"), ExportFormat::Text, fixed_now())
            .unwrap();

        assert_eq!(summary.files_created.len(), 2);
        let csv = std::fs::read_to_string(&summary.files_created[0]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("x,_query_name,_query_id,_fetched_at,_exported_at")
        );
        let record = lines.next().unwrap();
        assert!(record.starts_with("1,A,1,"), "{record}");
        assert!(!csv.contains("collision"));
    }

    #[cfg(feature = "export")]
    #[test]
    fn repeated_exports_never_overwrite() {
        let (dir, exporter, cache) = setup(ExportCapability::detect());
        cache.append("A", 1, &rows(2), &fetch_timestamp()).unwrap();
        let out = dir.path().join("out");

        let first = exporter.export_at(&out, ExportFormat::Both, fixed_now()).unwrap();
        let second = exporter.export_at(&out, ExportFormat::Both, fixed_now()).unwrap();

        for path in &second.files_created {
            assert!(!first.files_created.contains(path));
        }
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 6);
    }
}
