//! Pipeline CLI: fetch, inspect and export cached Dune query results.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use x402_pipeline::access::Page;
use x402_pipeline::credentials::API_KEY_ENV;
use x402_pipeline::logging::{self, LogTarget};
use x402_pipeline::{
    Access, ApiKey, ExportCapability, ExportFormat, Exporter, FetchMode, Fetcher, PipelineConfig,
    QueryCatalog, ResultCache,
};

/// x402 pipeline: Dune Analytics fetch, cache and export.
#[derive(Parser)]
#[command(name = "x402-pipeline", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the SQLite cache database.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Dune API key.
    #[arg(long, global = true, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// Remote fetch mode (execute-and-wait or get-latest).
    #[arg(long, global = true)]
    mode: Option<FetchMode>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the latest result for one query and cache it.
    Fetch {
        /// Logical query name.
        name: String,
    },

    /// Fetch every catalog query in order.
    FetchAll,

    /// Show cached rows with pagination.
    Get {
        /// Logical query name.
        name: String,
        #[arg(long, default_value_t = 100)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Show the last N cached rows.
    Tail {
        /// Logical query name.
        name: String,
        #[arg(short = 'n', default_value_t = 10)]
        n: usize,
    },

    /// List catalog queries with their cache status.
    List,

    /// Export every cached query as one enriched snapshot.
    Export {
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// parquet, csv or both.
        #[arg(long)]
        format: Option<ExportFormat>,
    },
}

struct Stores {
    config: PipelineConfig,
    catalog: Arc<QueryCatalog>,
    cache: ResultCache,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = i32::from(e.use_stderr());
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let _guard = logging::init(LogTarget::Stderr)?;

    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db.clone() {
        config.db_path = db;
    }
    if let Some(mode) = cli.mode {
        config.remote.fetch_mode = mode;
    }
    config.validate()?;

    let ctx = Stores {
        catalog: Arc::new(config.catalog()?),
        cache: ResultCache::open(&config.db_path)
            .with_context(|| format!("opening cache at {}", config.db_path.display()))?,
        config,
    };

    match cli.command {
        Command::Fetch { name } => {
            let fetcher = fetcher(&ctx, cli.api_key.as_deref())?;
            let fetched = fetcher.fetch(&name, fetcher.mode()).await?;
            println!("[OK] fetched and stored query: {}", fetched.logical_name);
            println!("  Rows: {}", fetched.row_count());
            println!("  Timestamp: {}", fetched.timestamp);
        }
        Command::FetchAll => {
            let fetcher = fetcher(&ctx, cli.api_key.as_deref())?;
            let report = fetcher.fetch_all().await;
            println!("{}", "=".repeat(60));
            println!("SUMMARY");
            println!("{}", "=".repeat(60));
            for outcome in &report.outcomes {
                match &outcome.result {
                    Ok(rows) => println!("[OK] {}: {rows} rows", outcome.logical_name),
                    Err(e) => println!("[ERROR] {}: {e}", outcome.logical_name),
                }
            }
            println!("{}/{} queries fetched", report.succeeded(), report.total());
        }
        Command::Get {
            name,
            limit,
            offset,
        } => {
            let page = access(&ctx).get(&name, limit, offset)?;
            print_page(&page)?;
        }
        Command::Tail { name, n } => {
            let page = access(&ctx).tail(&name, n)?;
            print_page(&page)?;
        }
        Command::List => {
            let listings = access(&ctx).list()?;
            println!("{}", "=".repeat(84));
            println!(
                "{:<40} {:<12} {:<20} {:<10}",
                "Query Name", "Query ID", "Last Fetch", "Rows"
            );
            println!("{}", "-".repeat(84));
            for q in listings {
                let last_fetch = q
                    .last_fetch
                    .as_deref()
                    .map_or("Never", |ts| ts.get(..19).unwrap_or(ts));
                println!(
                    "{:<40} {:<12} {:<20} {:<10}",
                    q.logical_name, q.query_id, last_fetch, q.row_count
                );
            }
        }
        Command::Export { output_dir, format } => {
            let output_dir = output_dir.unwrap_or_else(|| ctx.config.export.output_dir.clone());
            let format = format.unwrap_or(ctx.config.export.format);
            let exporter = Exporter::new(
                Arc::clone(&ctx.catalog),
                ctx.cache.clone(),
                ExportCapability::detect(),
            )
            .with_settings(ctx.config.export.settings());

            let summary = exporter.export(&output_dir, format)?;
            for warning in &summary.warnings {
                println!("[SKIP] {warning}");
            }
            for file in &summary.files_created {
                println!("[OK] {}", file.display());
            }
            println!("{}", "=".repeat(60));
            println!("EXPORT SUMMARY");
            println!("{}", "=".repeat(60));
            println!("Queries exported: {}", summary.queries_exported.len());
            println!("Total rows: {}", summary.total_rows);
            println!("Files created: {}", summary.files_created.len());
        }
    }

    Ok(())
}

fn fetcher(ctx: &Stores, api_key: Option<&str>) -> anyhow::Result<Fetcher> {
    let key = ApiKey::resolve(api_key)?;
    let client = dune_client::DuneClient::new(ctx.config.dune_config(&key))?;
    info!(db = %ctx.cache.path().display(), "remote client ready");
    Ok(
        Fetcher::new(Arc::clone(&ctx.catalog), ctx.cache.clone(), Arc::new(client))
            .with_policy(ctx.config.retry)
            .with_mode(ctx.config.remote.fetch_mode)
            .with_fetch_delay(ctx.config.fetch_delay()),
    )
}

fn access(ctx: &Stores) -> Access {
    Access::new(Arc::clone(&ctx.catalog), ctx.cache.clone())
}

fn print_page(page: &Page) -> anyhow::Result<()> {
    println!(
        "{} of {} rows (last updated {})",
        page.rows.len(),
        page.total_rows,
        page.last_updated
    );
    println!("{}", serde_json::to_string_pretty(&page.rows)?);
    Ok(())
}
