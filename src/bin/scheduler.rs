//! Scheduler CLI: one-shot or daemon pipeline runs.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use x402_pipeline::credentials::API_KEY_ENV;
use x402_pipeline::logging::{self, LogTarget};
use x402_pipeline::pipeline::ConfiguredPipeline;
use x402_pipeline::scheduler::{self, Shutdown};
use x402_pipeline::{ApiKey, ExportFormat, PipelineConfig, Scheduler};

/// x402 pipeline scheduler: automated fetch, export and transform runs.
#[derive(Parser)]
#[command(name = "x402-scheduler", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Dune API key.
    #[arg(long, global = true, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// Path to the SQLite cache database.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output directory for exports.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Export format: parquet, csv or both.
    #[arg(long, global = true)]
    format: Option<ExportFormat>,

    /// Directory for log files.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Run the pipeline once (for cron jobs).
    RunOnce,

    /// Run continuously, updating every interval.
    Daemon {
        /// Hours between successful runs.
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = u8::from(e.use_stderr());
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let mut config = match PipelineConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    apply_overrides(&mut config, &cli);

    let _guard = match logging::init(LogTarget::StdoutAndFile(config.scheduler.log_dir.clone())) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli.mode, config, cli.api_key.as_deref()).await {
        Ok(code) => code,
        Err(e) => {
            error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn apply_overrides(config: &mut PipelineConfig, cli: &Cli) {
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.export.output_dir = dir.clone();
    }
    if let Some(format) = cli.format {
        config.export.format = format;
    }
    if let Some(dir) = &cli.log_dir {
        config.scheduler.log_dir = dir.clone();
    }
    if let Mode::Daemon {
        interval: Some(hours),
    } = cli.mode
    {
        config.scheduler.interval_hours = hours;
    }
}

async fn run(mode: Mode, config: PipelineConfig, api_key: Option<&str>) -> anyhow::Result<ExitCode> {
    config.validate()?;
    let key = ApiKey::resolve(api_key)?;
    let pipeline = ConfiguredPipeline::new(config.clone(), key);

    match mode {
        Mode::RunOnce => match scheduler::run_once(&pipeline).await {
            Ok(_) => Ok(ExitCode::SUCCESS),
            Err(_) => Ok(ExitCode::FAILURE),
        },
        Mode::Daemon { .. } => {
            info!(
                interval_hours = config.scheduler.interval_hours,
                "starting scheduler daemon, press Ctrl+C to stop"
            );
            let cancel = CancellationToken::new();
            let cancel_clone = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("received Ctrl+C, shutting down...");
                    cancel_clone.cancel();
                }
            });

            let mut daemon = Scheduler::new(pipeline, config.scheduler.clone());
            if let Shutdown::MidRun = daemon.run(cancel).await {
                info!(runs = daemon.history().count(), "in-flight run abandoned");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
