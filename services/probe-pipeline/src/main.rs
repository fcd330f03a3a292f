//! Dive probe pipeline.
//!
//! Batch entry points for the probe data flow:
//! - `sync` mirrors new instrument files from the remote server
//! - `load` decodes local files and stores each dive once
//! - `interpolate` resamples stored dives onto the depth grid
//! - `export` and `stats` read the results back
//!
//! The exit status says whether a batch could run; failures of single
//! files or dives are logged and do not change it.

mod commands;
mod config;
mod report;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use commands::ExportRequest;
use config::PipelineConfig;

#[derive(Parser, Debug)]
#[command(name = "probe-pipeline")]
#[command(about = "Sync, load and interpolate dive probe profiles")]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, env = "PROBE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download new files from the remote directory
    Sync,

    /// Load local files into the store
    Load,

    /// Resample stored dives onto the depth grid
    Interpolate {
        /// Recompute dives that already have interpolated rows
        #[arg(long)]
        force: bool,
    },

    /// Sync, load and interpolate
    Run {
        /// Recompute dives that already have interpolated rows
        #[arg(long)]
        force: bool,
    },

    /// Export stored data as CSV
    Export(ExportArgs),

    /// Dives per day and mean air temperature
    Stats {
        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Start date or timestamp (inclusive)
    #[arg(long)]
    from: String,

    /// End date (inclusive) or timestamp (exclusive)
    #[arg(long)]
    to: String,

    #[arg(long, default_value_t = 0.0)]
    min_depth: f64,

    #[arg(long)]
    max_depth: Option<f64>,

    /// Comma-separated channels, e.g. `temp,salt` (default: all)
    #[arg(long, default_value = "")]
    channels: String,

    /// all, 3H, 6H, 12H, 1D, 1W or 1M
    #[arg(long, default_value = "all")]
    interval: String,

    /// One row per time bin, averaged over the depth range
    #[arg(long)]
    average_depths: bool,

    /// Export raw readings instead of interpolated ones
    #[arg(long, conflicts_with = "surface")]
    raw: bool,

    /// Export surface conditions per time bin
    #[arg(long)]
    surface: bool,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl From<ExportArgs> for ExportRequest {
    fn from(args: ExportArgs) -> Self {
        ExportRequest {
            from: args.from,
            to: args.to,
            min_depth: args.min_depth,
            max_depth: args.max_depth,
            channels: args.channels,
            interval: args.interval,
            average_depths: args.average_depths,
            raw: args.raw,
            surface: args.surface,
            output: args.output,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries command output (CSV, tables)
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = PipelineConfig::load(cli.config.as_deref())?;
    info!(
        local_dir = %config.local_dir.display(),
        workers = config.workers,
        "Starting probe pipeline"
    );

    match cli.command {
        Command::Sync => {
            let report = commands::sync(&config).await?;
            println!("{}", report.downloaded);
        }
        Command::Load => {
            let store = commands::open_store(&config).await?;
            let report = commands::load(&config, store).await?;
            println!("{}", report.persisted);
        }
        Command::Interpolate { force } => {
            let store = commands::open_store(&config).await?;
            let report = commands::interpolate(&config, store, force).await?;
            println!("{}", report.processed);
        }
        Command::Run { force } => {
            let summary = commands::run(&config, force).await?;
            println!(
                "downloaded={} loaded={} interpolated={}",
                summary.downloaded.unwrap_or(0),
                summary.persisted,
                summary.interpolated
            );
        }
        Command::Export(args) => {
            let request = ExportRequest::from(args);
            let kind = request.kind()?;
            let store = commands::open_store(&config).await?;
            let csv = commands::export_csv(store.as_ref(), &kind).await?;

            match &request.output {
                Some(path) => {
                    tokio::fs::write(path, csv)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(path = %path.display(), "Export written");
                }
                None => print!("{}", csv),
            }
        }
        Command::Stats { from, to } => {
            let range = match (from, to) {
                (Some(from), Some(to)) => commands::parse_range(&from, &to)?,
                (None, None) => commands::all_time(),
                (Some(from), None) => commands::parse_range(&from, "9999-12-30")?,
                (None, Some(to)) => commands::parse_range("1970-01-01", &to)?,
            };
            let store = commands::open_store(&config).await?;
            let stats = commands::stats(store.as_ref(), range).await?;
            println!("{}", report::daily_stats_table(&stats));
        }
    }

    Ok(())
}
