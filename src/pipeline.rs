//! One full pipeline run: fetch every catalog entry, export a snapshot, then
//! trigger the downstream transform.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::ResultCache;
use crate::config::PipelineConfig;
use crate::credentials::ApiKey;
use crate::error::Result;
use crate::export::{ExportCapability, ExportFormat, Exporter};
use crate::fetcher::Fetcher;
use crate::scheduler::PipelineRunner;
use crate::transform::{DbtTransform, TransformTrigger};

/// Outcome of one successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub fetched: usize,
    pub total_queries: usize,
    pub exported_rows: i64,
    pub files_created: Vec<PathBuf>,
    pub transform_ok: bool,
    pub fetch_duration: Duration,
    pub export_duration: Duration,
    pub transform_duration: Duration,
}

impl RunReport {
    pub fn total_duration(&self) -> Duration {
        self.fetch_duration + self.export_duration + self.transform_duration
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched {}/{} queries, exported {} rows to {} file(s), transform {}, took {:.2}s",
            self.fetched,
            self.total_queries,
            self.exported_rows,
            self.files_created.len(),
            if self.transform_ok { "ok" } else { "failed or skipped" },
            self.total_duration().as_secs_f64()
        )
    }
}

/// Fetcher, exporter and transform wired for repeated runs.
#[derive(Clone)]
pub struct Pipeline {
    fetcher: Fetcher,
    exporter: Exporter,
    transform: Arc<dyn TransformTrigger>,
    output_dir: PathBuf,
    format: ExportFormat,
}

impl Pipeline {
    pub fn new(
        fetcher: Fetcher,
        exporter: Exporter,
        transform: Arc<dyn TransformTrigger>,
        output_dir: impl Into<PathBuf>,
        format: ExportFormat,
    ) -> Self {
        Self {
            fetcher,
            exporter,
            transform,
            output_dir: output_dir.into(),
            format,
        }
    }

    /// Wire the production pipeline: SQLite cache, Dune client, Arrow
    /// exporter and the `dbt` transform.
    ///
    /// # Errors
    ///
    /// Fails on an invalid catalog override, an unopenable cache, or a bad
    /// remote client configuration.
    pub fn from_config(config: &PipelineConfig, api_key: &ApiKey) -> Result<Self> {
        let catalog = Arc::new(config.catalog()?);
        let cache = ResultCache::open(&config.db_path)?;
        let client = dune_client::DuneClient::new(config.dune_config(api_key))?;

        let fetcher = Fetcher::new(Arc::clone(&catalog), cache.clone(), Arc::new(client))
            .with_policy(config.retry)
            .with_mode(config.remote.fetch_mode)
            .with_fetch_delay(config.fetch_delay());
        let exporter = Exporter::new(catalog, cache, ExportCapability::detect())
            .with_settings(config.export.settings());
        let transform = Arc::new(DbtTransform::new(config.transform.clone()));

        Ok(Self::new(
            fetcher,
            exporter,
            transform,
            config.export.output_dir.clone(),
            config.export.format,
        ))
    }

    /// Run fetch-all, export and transform once.
    ///
    /// Individual fetch failures and a failed transform are logged but do not
    /// fail the run. Export errors do.
    pub async fn run_once(&self) -> Result<RunReport> {
        info!("starting pipeline run");

        let started = Instant::now();
        let fetched = self.fetcher.fetch_all().await;
        let fetch_duration = started.elapsed();
        info!(
            succeeded = fetched.succeeded(),
            total = fetched.total(),
            secs = fetch_duration.as_secs_f64(),
            "fetch phase complete"
        );

        let started = Instant::now();
        let summary = self.exporter.export(&self.output_dir, self.format)?;
        let export_duration = started.elapsed();
        info!(
            rows = summary.total_rows,
            files = summary.files_created.len(),
            secs = export_duration.as_secs_f64(),
            "export phase complete"
        );

        let started = Instant::now();
        let transform_ok = self.transform.run_transform().await;
        let transform_duration = started.elapsed();
        if !transform_ok {
            warn!(
                secs = transform_duration.as_secs_f64(),
                "transform failed or skipped"
            );
        }

        let report = RunReport {
            fetched: fetched.succeeded(),
            total_queries: fetched.total(),
            exported_rows: summary.total_rows,
            files_created: summary.files_created,
            transform_ok,
            fetch_duration,
            export_duration,
            transform_duration,
        };
        info!("pipeline run succeeded: {report}");
        Ok(report)
    }
}

#[async_trait]
impl PipelineRunner for Pipeline {
    async fn run_pipeline(&self) -> Result<RunReport> {
        self.run_once().await
    }
}

/// Runner that wires a fresh [`Pipeline`] from configuration at the start
/// of every run. Setup errors, such as an unopenable cache, fail that run
/// only and are rescheduled like any other failure.
#[derive(Debug, Clone)]
pub struct ConfiguredPipeline {
    config: PipelineConfig,
    api_key: ApiKey,
}

impl ConfiguredPipeline {
    pub fn new(config: PipelineConfig, api_key: ApiKey) -> Self {
        Self { config, api_key }
    }
}

#[async_trait]
impl PipelineRunner for ConfiguredPipeline {
    async fn run_pipeline(&self) -> Result<RunReport> {
        Pipeline::from_config(&self.config, &self.api_key)?
            .run_once()
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::cache::ResultCache;
    use crate::catalog::{CatalogEntry, QueryCatalog};
    use crate::error::PipelineError;
    use crate::export::{ExportCapability, ExportError};
    use crate::fetcher::tests::{ScriptedService, rows};
    use crate::remote::RemoteError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTransform {
        ok: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TransformTrigger for CountingTransform {
        async fn run_transform(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.ok
        }
    }

    fn pipeline(
        dir: &tempfile::TempDir,
        service: ScriptedService,
        capability: ExportCapability,
        transform: Arc<CountingTransform>,
    ) -> Pipeline {
        let cache = ResultCache::open(dir.path().join("cache.db")).unwrap();
        let catalog = Arc::new(
            QueryCatalog::new(vec![CatalogEntry::new("A", 1), CatalogEntry::new("B", 2)]).unwrap(),
        );
        let fetcher = Fetcher::new(catalog.clone(), cache.clone(), Arc::new(service))
            .with_fetch_delay(Duration::ZERO);
        let exporter = Exporter::new(catalog, cache, capability);
        Pipeline::new(
            fetcher,
            exporter,
            transform,
            dir.path().join("exports"),
            ExportFormat::Both,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn setup_failure_fails_only_that_run() {
        use crate::scheduler::{ScheduleState, Scheduler, SchedulerSettings};

        let dir = tempfile::TempDir::new().unwrap();
        let not_a_dir = dir.path().join("volume");
        std::fs::write(&not_a_dir, "").unwrap();
        let mut config = PipelineConfig::default();
        config.db_path = not_a_dir.join("cache.db");
        config.transform.enabled = false;

        let runner = ConfiguredPipeline::new(config, ApiKey::new("test-key"));
        let mut scheduler = Scheduler::new(runner, SchedulerSettings::default());
        let start = tokio::time::Instant::now();

        let result = scheduler.run_if_due().await.unwrap();

        assert!(matches!(result, Err(PipelineError::Cache(_))));
        assert_eq!(
            scheduler.state(),
            ScheduleState::Idle {
                next_run: start + Duration::from_secs(3600)
            }
        );
    }

    fn transform(ok: bool) -> Arc<CountingTransform> {
        Arc::new(CountingTransform {
            ok,
            calls: AtomicUsize::new(0),
        })
    }

    #[cfg(feature = "export")]
    #[tokio::test(start_paused = true)]
    async fn failed_transform_does_not_fail_the_run() {
        let dir = tempfile::TempDir::new().unwrap();
        let t = transform(false);
        let p = pipeline(
            &dir,
            ScriptedService::new(vec![Ok(rows(5))], 0),
            ExportCapability::detect(),
            t.clone(),
        );

        let report = p.run_once().await.unwrap();

        assert_eq!(report.fetched, 2);
        assert_eq!(report.total_queries, 2);
        assert_eq!(report.exported_rows, 5);
        assert_eq!(report.files_created.len(), 3);
        assert!(!report.transform_ok);
        assert_eq!(t.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failures_do_not_fail_the_run() {
        let dir = tempfile::TempDir::new().unwrap();
        let denied = || {
            Err(RemoteError::Status {
                code: 403,
                body: "forbidden".into(),
            })
        };
        let p = pipeline(
            &dir,
            ScriptedService::new(vec![denied(), denied()], 0),
            ExportCapability::detect(),
            transform(true),
        );

        let report = p.run_once().await.unwrap();

        assert_eq!(report.fetched, 0);
        assert_eq!(report.exported_rows, 0);
        assert!(report.files_created.is_empty());
        assert!(report.transform_ok);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_export_capability_fails_the_run() {
        let dir = tempfile::TempDir::new().unwrap();
        let t = transform(true);
        let p = pipeline(
            &dir,
            ScriptedService::new(vec![], 1),
            ExportCapability::unavailable(),
            t.clone(),
        );

        let err = p.run_once().await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Export(ExportError::CapabilityUnavailable)
        ));
        assert_eq!(t.calls.load(Ordering::SeqCst), 0);
    }
}
