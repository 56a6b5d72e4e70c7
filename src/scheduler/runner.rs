//! Scheduler loop.
//!
//! Checks on a fixed cadence whether the next run is due. A run that
//! succeeds schedules the next one a full interval after it started; a run
//! that fails schedules a retry after the shorter retry interval instead.
//! The loop stops when its cancellation token fires. During the idle sleep
//! that is a clean stop; mid-run the in-flight run is dropped on the spot.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::pipeline::RunReport;

/// Default interval between successful runs (hours).
pub const DEFAULT_INTERVAL_HOURS: u64 = 24;

/// Delay before retrying after a failed run (seconds).
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 3600;

/// Interval between due checks (seconds).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Next-run horizon when an interval does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Number of run-history entries to keep.
const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Something that performs one full pipeline run.
#[async_trait]
pub trait PipelineRunner: Send + Sync {
    async fn run_pipeline(&self) -> Result<RunReport>;
}

#[async_trait]
impl<T: PipelineRunner + ?Sized> PipelineRunner for Arc<T> {
    async fn run_pipeline(&self) -> Result<RunReport> {
        (**self).run_pipeline().await
    }
}

/// Scheduler timing and log location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub interval_hours: u64,
    pub retry_interval_secs: u64,
    pub poll_interval_secs: u64,
    /// Directory for the daily rolling log file.
    pub log_dir: PathBuf,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_hours: DEFAULT_INTERVAL_HOURS,
            retry_interval_secs: DEFAULT_RETRY_INTERVAL_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            log_dir: PathBuf::from("data/logs"),
        }
    }
}

impl SchedulerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours.saturating_mul(3600))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Where the scheduler is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    /// Waiting for `next_run`.
    Idle { next_run: Instant },
    Running,
}

/// How a recorded run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded(String),
    Failed(String),
}

/// One entry of the run history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
}

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// Interrupted while waiting for the next run.
    Idle,
    /// Interrupted while a run was in flight; that run was abandoned.
    MidRun,
}

/// Drives a [`PipelineRunner`] on an interval.
pub struct Scheduler<R> {
    runner: R,
    settings: SchedulerSettings,
    state: ScheduleState,
    history: VecDeque<RunRecord>,
    max_history_entries: usize,
}

impl<R: PipelineRunner> Scheduler<R> {
    /// New scheduler whose first run is due immediately.
    pub fn new(runner: R, settings: SchedulerSettings) -> Self {
        Self {
            runner,
            settings,
            state: ScheduleState::Idle {
                next_run: Instant::now(),
            },
            history: VecDeque::new(),
            max_history_entries: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Override the run-history limit.
    pub fn with_history_limit(mut self, max_entries: usize) -> Self {
        self.max_history_entries = max_entries.max(1);
        self
    }

    pub fn state(&self) -> ScheduleState {
        self.state
    }

    /// Recent runs, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &RunRecord> {
        self.history.iter()
    }

    /// `true` when idle and `now` has reached the next run time.
    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.state, ScheduleState::Idle { next_run } if now >= next_run)
    }

    /// Leave `Running`, scheduling the next run relative to `run_start`.
    pub fn finish_run(&mut self, run_start: Instant, succeeded: bool) -> Instant {
        let delay = if succeeded {
            self.settings.interval()
        } else {
            self.settings.retry_interval()
        };
        let next_run = run_start
            .checked_add(delay)
            .or_else(|| run_start.checked_add(FAR_FUTURE))
            .unwrap_or(run_start);
        self.state = ScheduleState::Idle { next_run };
        next_run
    }

    /// Run the pipeline once if due. Returns the result of the run, or
    /// `None` if nothing was due.
    pub async fn run_if_due(&mut self) -> Option<Result<RunReport>> {
        let run_start = Instant::now();
        if !self.is_due(run_start) {
            return None;
        }
        self.state = ScheduleState::Running;
        let started_at = Utc::now();
        info!("scheduled update triggered");

        let result = self.runner.run_pipeline().await;

        let (succeeded, outcome) = match &result {
            Ok(report) => (true, RunOutcome::Succeeded(report.to_string())),
            Err(e) => {
                error!("scheduled run failed: {e}");
                (false, RunOutcome::Failed(e.to_string()))
            }
        };
        let next_run = self.finish_run(run_start, succeeded);
        let wait = next_run.saturating_duration_since(Instant::now());
        if succeeded {
            info!(next_in_secs = wait.as_secs(), "next update scheduled");
        } else {
            warn!(next_in_secs = wait.as_secs(), "update failed; retrying early");
        }

        self.push_history(RunRecord {
            started_at,
            finished_at: Utc::now(),
            outcome,
        });
        Some(result)
    }

    /// Loop until `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) -> Shutdown {
        info!(
            interval_hours = self.settings.interval_hours,
            retry_interval_secs = self.settings.retry_interval_secs,
            "scheduler started"
        );
        let poll = self.settings.poll_interval().max(Duration::from_secs(1));

        loop {
            if cancel.is_cancelled() {
                info!("scheduler stopped");
                return Shutdown::Idle;
            }
            if self.is_due(Instant::now()) {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        warn!("scheduler interrupted during a run");
                        return Shutdown::MidRun;
                    }
                    _ = self.run_if_due() => {}
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("scheduler stopped");
                    return Shutdown::Idle;
                }
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }

    fn push_history(&mut self, record: RunRecord) {
        self.history.push_back(record);
        while self.history.len() > self.max_history_entries {
            self.history.pop_front();
        }
    }
}

/// Run the pipeline once, outside the loop. Errors are logged and returned.
pub async fn run_once<R: PipelineRunner>(runner: &R) -> Result<RunReport> {
    let result = runner.run_pipeline().await;
    match &result {
        Ok(report) => info!("run succeeded: {report}"),
        Err(e) => error!("run failed: {e}"),
    }
    result
}
