//! Exit-status contract of the `x402-pipeline` and `x402-scheduler` binaries.
//!
//! Each test runs the built binary in a fresh temp directory with no
//! `DUNE_API_KEY` in the environment and no config file. Nothing here talks
//! to the network: every path either stays local or fails before fetching.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;
use std::process::{Command, Output};

use serde_json::json;
use x402_pipeline::ResultCache;
use x402_pipeline::cache::fetch_timestamp;

const PIPELINE_BIN: &str = env!("CARGO_BIN_EXE_x402-pipeline");
const SCHEDULER_BIN: &str = env!("CARGO_BIN_EXE_x402-scheduler");

const CACHED_NAME: &str = "num transactions";
const CACHED_QUERY_ID: i64 = 6_084_845;

struct CliHarness {
    dir: tempfile::TempDir,
}

impl CliHarness {
    fn new() -> Self {
        Self {
            dir: tempfile::TempDir::new().unwrap(),
        }
    }

    fn db(&self) -> PathBuf {
        self.dir.path().join("db").join("x402.db")
    }

    /// Cache five rows for the first built-in query.
    fn seed(&self) {
        let cache = ResultCache::open(self.db()).unwrap();
        let rows: Vec<_> = (0..5)
            .map(|i| json!({ "day": i, "tx": i * 10 }).as_object().cloned().unwrap())
            .collect();
        cache
            .append(CACHED_NAME, CACHED_QUERY_ID, &rows, &fetch_timestamp())
            .unwrap();
    }

    fn command(&self, bin: &str) -> Command {
        let mut cmd = Command::new(bin);
        cmd.current_dir(self.dir.path())
            .env_remove("DUNE_API_KEY")
            .env_remove("RUST_LOG")
            .env("X402_CONFIG_DIR", self.dir.path().join("config"));
        cmd
    }

    fn pipeline(&self, args: &[&str]) -> Output {
        self.command(PIPELINE_BIN)
            .arg("--db")
            .arg(self.db())
            .args(args)
            .output()
            .unwrap_or_else(|e| panic!("failed to run {PIPELINE_BIN}: {e}"))
    }

    fn scheduler(&self, args: &[&str]) -> Output {
        self.command(SCHEDULER_BIN)
            .arg("--db")
            .arg(self.db())
            .arg("--log-dir")
            .arg(self.dir.path().join("logs"))
            .args(args)
            .output()
            .unwrap_or_else(|e| panic!("failed to run {SCHEDULER_BIN}: {e}"))
    }
}

fn exit_code(output: &Output) -> Option<i32> {
    output.status.code()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ---------------------------------------------------------------------------
// Read-side commands need no credential
// ---------------------------------------------------------------------------

#[test]
fn list_succeeds_without_api_key() {
    let harness = CliHarness::new();
    harness.seed();

    let output = harness.pipeline(&["list"]);

    assert_eq!(exit_code(&output), Some(0), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains(CACHED_NAME));
    assert!(out.contains("Never"));
}

#[test]
fn get_and_tail_succeed_without_api_key() {
    let harness = CliHarness::new();
    harness.seed();

    let get = harness.pipeline(&["get", CACHED_NAME, "--limit", "2", "--offset", "1"]);
    assert_eq!(exit_code(&get), Some(0), "stderr: {}", stderr(&get));
    assert!(stdout(&get).contains("2 of 5 rows"));

    let tail = harness.pipeline(&["tail", CACHED_NAME, "-n", "10"]);
    assert_eq!(exit_code(&tail), Some(0), "stderr: {}", stderr(&tail));
    assert!(stdout(&tail).contains("5 of 5 rows"));
}

#[cfg(feature = "export")]
#[test]
fn export_succeeds_without_api_key() {
    let harness = CliHarness::new();
    harness.seed();
    let exports = harness.dir.path().join("exports");

    let output = harness.pipeline(&[
        "export",
        "--output-dir",
        exports.to_str().unwrap(),
        "--format",
        "csv",
    ]);

    assert_eq!(exit_code(&output), Some(0), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Total rows: 5"));
    assert_eq!(std::fs::read_dir(&exports).unwrap().count(), 2);
}

// ---------------------------------------------------------------------------
// Operational and user errors exit 1
// ---------------------------------------------------------------------------

#[test]
fn unknown_name_exits_one() {
    let harness = CliHarness::new();
    harness.seed();

    let output = harness.pipeline(&["get", "no such query"]);

    assert_eq!(exit_code(&output), Some(1));
    assert!(stderr(&output).contains("unknown query name"));
}

#[test]
fn known_name_without_cached_data_exits_one() {
    let harness = CliHarness::new();

    let output = harness.pipeline(&["tail", CACHED_NAME]);

    assert_eq!(exit_code(&output), Some(1));
    assert!(stderr(&output).contains("no cached data"));
}

#[test]
fn fetch_without_api_key_exits_one() {
    let harness = CliHarness::new();

    for args in [&["fetch", CACHED_NAME][..], &["fetch-all"][..]] {
        let output = harness.pipeline(args);
        assert_eq!(exit_code(&output), Some(1), "{args:?}");
        assert!(stderr(&output).contains("DUNE_API_KEY"), "{args:?}");
    }
}

#[test]
fn fetch_of_unknown_name_exits_one_before_any_request() {
    let harness = CliHarness::new();

    let output = harness.pipeline(&["--api-key", "test-key", "fetch", "no such query"]);

    assert_eq!(exit_code(&output), Some(1));
    assert!(stderr(&output).contains("unknown query name"));
}

#[test]
fn usage_errors_exit_one() {
    let harness = CliHarness::new();

    for args in [
        &["frobnicate"][..],
        &["get"][..],
        &["--mode", "sometimes", "list"][..],
        &["export", "--format", "xlsx"][..],
    ] {
        let output = harness.pipeline(args);
        assert_eq!(exit_code(&output), Some(1), "{args:?}");
    }

    let help = harness.pipeline(&["--help"]);
    assert_eq!(exit_code(&help), Some(0));
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[test]
fn run_once_without_api_key_exits_one() {
    let harness = CliHarness::new();

    let output = harness.scheduler(&["run-once"]);

    assert_eq!(exit_code(&output), Some(1));
}

#[test]
fn daemon_without_api_key_exits_one() {
    let harness = CliHarness::new();

    let output = harness.scheduler(&["daemon", "--interval", "12"]);

    assert_eq!(exit_code(&output), Some(1));
}

#[test]
fn oversized_daemon_interval_is_rejected_not_a_crash() {
    let harness = CliHarness::new();

    let output = harness.scheduler(&[
        "--api-key",
        "test-key",
        "daemon",
        "--interval",
        "18446744073709551615",
    ]);

    assert_eq!(exit_code(&output), Some(1));
    assert!(stdout(&output).contains("interval_hours"));
}

#[test]
fn scheduler_usage_errors_exit_one() {
    let harness = CliHarness::new();

    assert_eq!(exit_code(&harness.scheduler(&[])), Some(1));
    assert_eq!(exit_code(&harness.scheduler(&["weekly"])), Some(1));
    assert_eq!(
        exit_code(&harness.scheduler(&["daemon", "--interval", "soon"])),
        Some(1)
    );
}
