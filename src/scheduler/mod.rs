//! Interval scheduler for unattended pipeline runs.

pub mod runner;

pub use runner::{
    PipelineRunner, RunOutcome, RunRecord, ScheduleState, Scheduler, SchedulerSettings, Shutdown,
    run_once,
};
