//! Pipeline configuration.
//!
//! Loaded from TOML; every field has a default so an absent or partial file
//! is fine. Command-line flags override individual values after loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogEntry, QueryCatalog};
use crate::credentials::ApiKey;
use crate::error::{PipelineError, Result};
use crate::export::{DEFAULT_OUTPUT_DIR, ExportFormat, ExportSettings};
use crate::fetcher::DEFAULT_FETCH_DELAY_MS;
use crate::remote::FetchMode;
use crate::retry::RetryPolicy;
use crate::scheduler::SchedulerSettings;
use crate::transform::TransformSettings;

/// Default cache database location.
pub const DEFAULT_DB_PATH: &str = "data/databases/x402_data.db";

/// Longest accepted run interval: one year.
pub const MAX_INTERVAL_HOURS: u64 = 24 * 365;

/// Longest accepted retry interval, poll interval or remote timeout: one day.
pub const MAX_WAIT_SECS: u64 = 86_400;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// SQLite cache database file.
    pub db_path: PathBuf,
    /// Pause between consecutive remote calls during fetch-all.
    pub fetch_delay_ms: u64,
    pub remote: RemoteConfig,
    pub retry: RetryPolicy,
    pub export: ExportConfig,
    pub transform: TransformSettings,
    pub scheduler: SchedulerSettings,
    /// Catalog override. The built-in catalog is used when empty.
    pub queries: Vec<CatalogEntry>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            fetch_delay_ms: DEFAULT_FETCH_DELAY_MS,
            remote: RemoteConfig::default(),
            retry: RetryPolicy::default(),
            export: ExportConfig::default(),
            transform: TransformSettings::default(),
            scheduler: SchedulerSettings::default(),
            queries: Vec::new(),
        }
    }
}

/// Remote service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub poll_interval_ms: u64,
    pub execution_timeout_seconds: u64,
    /// Mode used by fetch-all and scheduled runs.
    pub fetch_mode: FetchMode,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        let client = dune_client::DuneConfig::new("");
        Self {
            base_url: client.base_url,
            timeout_seconds: client.timeout_seconds,
            poll_interval_ms: client.poll_interval_ms,
            execution_timeout_seconds: client.execution_timeout_seconds,
            fetch_mode: FetchMode::default(),
        }
    }
}

/// Export destination and naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub format: ExportFormat,
    pub file_prefix: String,
    pub dataset_name: String,
    pub description: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let settings = ExportSettings::default();
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            format: ExportFormat::default(),
            file_prefix: settings.file_prefix,
            dataset_name: settings.dataset_name,
            description: settings.description,
        }
    }
}

impl ExportConfig {
    pub fn settings(&self) -> ExportSettings {
        ExportSettings {
            file_prefix: self.file_prefix.clone(),
            dataset_name: self.dataset_name.clone(),
            description: self.description.clone(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_file()
    }

    /// Load `path` if given, else the default file if it exists, else
    /// defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default = Self::default_config_path();
                if default.is_file() {
                    Self::from_file(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(PipelineError::Config(msg.to_owned()));
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        if !(1..=MAX_INTERVAL_HOURS).contains(&self.scheduler.interval_hours) {
            return invalid("scheduler.interval_hours must be between 1 and 8760");
        }
        if !(1..=MAX_WAIT_SECS).contains(&self.scheduler.retry_interval_secs) {
            return invalid("scheduler.retry_interval_secs must be between 1 and 86400");
        }
        if !(1..=MAX_WAIT_SECS).contains(&self.scheduler.poll_interval_secs) {
            return invalid("scheduler.poll_interval_secs must be between 1 and 86400");
        }
        if !(1..=MAX_WAIT_SECS).contains(&self.remote.timeout_seconds)
            || !(1..=MAX_WAIT_SECS).contains(&self.remote.execution_timeout_seconds)
        {
            return invalid("remote timeouts must be between 1 and 86400 seconds");
        }
        if self.export.file_prefix.trim().is_empty() {
            return invalid("export.file_prefix must not be empty");
        }
        self.catalog()?;
        Ok(())
    }

    /// The query catalog: the `[[queries]]` override or the built-in table.
    pub fn catalog(&self) -> Result<QueryCatalog> {
        if self.queries.is_empty() {
            Ok(QueryCatalog::builtin())
        } else {
            Ok(QueryCatalog::new(self.queries.clone())?)
        }
    }

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }

    /// Remote client settings for `api_key`.
    pub fn dune_config(&self, api_key: &ApiKey) -> dune_client::DuneConfig {
        dune_client::DuneConfig::new(api_key.expose())
            .with_base_url(self.remote.base_url.clone())
            .with_timeout_seconds(self.remote.timeout_seconds)
            .with_poll_interval_ms(self.remote.poll_interval_ms)
            .with_execution_timeout_seconds(self.remote.execution_timeout_seconds)
    }
}
