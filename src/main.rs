//! CLI entry point for the GTFS ingest pipeline.
//!
//! Provides subcommands for importing a static GTFS directory and for
//! pulling one realtime feed snapshot. Flags override `.env` defaults; the
//! pipeline core itself never reads process-wide configuration.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gtfs_ingest::error::ImportError;
use gtfs_ingest::events::JsonlEventSink;
use gtfs_ingest::orchestrator::{run_realtime_import, run_static_import};
use gtfs_ingest::realtime::{RealTimeImporter, RealtimeConfig};
use gtfs_ingest::store::CsvStore;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_ingest")]
#[command(about = "Imports GTFS static and realtime data into the transit store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a directory of GTFS static files
    ImportGtfs {
        /// Directory containing the GTFS data to import
        #[arg(short, long)]
        dir: Option<String>,

        /// Dataset name the rows are imported under; defaults to the final
        /// segment of the data directory
        #[arg(long)]
        dataset: Option<String>,
    },
    /// Import one GTFS realtime feed snapshot
    ImportRealtime {
        /// Override the default URL for the realtime feed
        #[arg(long)]
        url: Option<String>,

        /// Override the default API key for the realtime feed
        #[arg(long)]
        api_key: Option<String>,

        /// Override the default dataset the data is saved against
        #[arg(long)]
        dataset: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_ingest.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_ingest.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let store_dir = env_or("GTFS_DB_DIR", "./data");
    let events_path = env_or("GTFS_EVENTS_FILE", "./data/events.jsonl");
    let mut store = CsvStore::open(Path::new(&store_dir))?;
    let mut sink = JsonlEventSink::new(Path::new(&events_path));

    match cli.command {
        Commands::ImportGtfs { dir, dataset } => {
            let dir = resolve_data_dir(dir)?;
            let dataset = dataset
                .or_else(|| dataset_from_dir(&dir))
                .context("could not derive a dataset name; pass --dataset")?;

            let report = run_static_import(&dir, &dataset, &mut store, &mut sink).await?;
            for file in &report.files {
                info!(file = file.kind.base_name(), outcome = ?file.outcome, "result");
            }
            info!(
                dataset = %report.dataset,
                elapsed_s = report.total_time_taken_s,
                "import complete"
            );
        }
        Commands::ImportRealtime {
            url,
            api_key,
            dataset,
        } => {
            let config = RealtimeConfig {
                url: url
                    .or_else(|| std::env::var("GTFS_REALTIME_URL").ok())
                    .context("no realtime URL; pass --url or set GTFS_REALTIME_URL")?,
                api_key: api_key
                    .or_else(|| std::env::var("GTFS_REALTIME_API_KEY").ok())
                    .context("no API key; pass --api-key or set GTFS_REALTIME_API_KEY")?,
                dataset: dataset
                    .or_else(|| std::env::var("GTFS_DATASET").ok())
                    .context("no dataset; pass --dataset or set GTFS_DATASET")?,
            };
            info!(url = %config.url, dataset = %config.dataset, "importing realtime feed");

            let importer = RealTimeImporter::new(config);
            match run_realtime_import(&importer, &mut store, &mut sink).await? {
                Some(report) => info!(
                    trips = report.total_trips,
                    stop_times = report.total_stop_times,
                    elapsed_s = report.time_taken_s,
                    "realtime import complete"
                ),
                None => warn!("no data returned from the feed; nothing imported"),
            }
        }
    }

    Ok(())
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

/// Resolves the GTFS data directory: the flag, else `GTFS_DATA_DIR`, else the
/// conventional default. The directory must exist.
fn resolve_data_dir(flag: Option<String>) -> Result<PathBuf> {
    let dir = match flag {
        Some(dir) => dir,
        None => {
            let fallback = env_or("GTFS_DATA_DIR", "./gtfs_data/TFI/");
            info!(dir = %fallback, "no directory specified, using default");
            fallback
        }
    };

    let path = PathBuf::from(&dir);
    if !path.is_dir() {
        return Err(ImportError::DirectoryNotFound(path).into());
    }
    Ok(path)
}

/// Derives the dataset name from the final path segment of the data
/// directory, mirroring the layout `gtfs_data/<DATASET>/`.
fn dataset_from_dir(dir: &Path) -> Option<String> {
    dir.components().next_back().and_then(|c| match c {
        std::path::Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    })
}
