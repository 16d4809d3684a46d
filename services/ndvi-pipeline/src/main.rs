//! NDVI statistics for one region and time window.
//!
//! Reads `config/ndvi.yaml`, fetches the NDVI raster from Sentinel Hub and
//! writes mean/min/max to a JSON file. The exit code identifies the failing
//! stage.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use ndvi_common::NdviError;
use ndvi_pipeline::{load_config, Pipeline, PipelineConfig};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Exit code for configuration problems.
const EXIT_CONFIG: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "ndvi-pipeline")]
#[command(about = "Fetch a Sentinel Hub NDVI raster and export its statistics")]
struct Args {
    /// Pipeline configuration file
    #[arg(short, long, env = "NDVI_CONFIG", default_value = "config/ndvi.yaml")]
    config: PathBuf,

    /// Start of the acquisition window (overrides request.time_from)
    #[arg(long)]
    from: Option<String>,

    /// End of the acquisition window (overrides request.time_to)
    #[arg(long)]
    to: Option<String>,

    /// Where to store the downloaded archive
    #[arg(long, env = "NDVI_ARCHIVE_PATH")]
    archive_path: Option<PathBuf>,

    /// Directory to extract the archive into
    #[arg(long, env = "NDVI_EXTRACT_DIR")]
    extract_dir: Option<PathBuf>,

    /// Where to write the statistics JSON
    #[arg(short, long, env = "NDVI_STATISTICS_PATH")]
    output: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format: json or pretty
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    log_format: String,
}

impl Args {
    fn apply_overrides(&self, config: &mut PipelineConfig) {
        if let Some(from) = &self.from {
            config.request.time_from = from.clone();
        }
        if let Some(to) = &self.to {
            config.request.time_to = to.clone();
        }
        if let Some(path) = &self.archive_path {
            config.output.archive_path = path.clone();
        }
        if let Some(path) = &self.extract_dir {
            config.output.extract_dir = path.clone();
        }
        if let Some(path) = &self.output {
            config.output.statistics_path = path.clone();
        }
    }
}

#[tokio::main]
async fn main() {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if let Err(e) = init_tracing(&args.log_level, &args.log_format) {
        eprintln!("Failed to initialize logging: {:#}", e);
        process::exit(EXIT_CONFIG);
    }

    process::exit(run(args).await);
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    match format {
        "json" => tracing::subscriber::set_global_default(builder.json().finish())?,
        "pretty" => tracing::subscriber::set_global_default(builder.pretty().finish())?,
        other => anyhow::bail!("Unknown log format '{}', expected json or pretty", other),
    }
    Ok(())
}

async fn run(args: Args) -> i32 {
    let pipeline = match build_pipeline(&args) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Invalid configuration");
            eprintln!("{}", config_failure(&e));
            return EXIT_CONFIG;
        }
    };

    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    info!(config = %args.config.display(), "Starting NDVI pipeline");

    match pipeline.run().await {
        Ok(report) => {
            info!(
                path = %report.statistics_path.display(),
                mean = report.statistics.mean,
                "Statistics exported"
            );
            0
        }
        Err(e) => {
            error!(stage = %e.stage(), error = %e, "NDVI pipeline failed");
            eprintln!("{}", run_failure(&e));
            e.exit_code()
        }
    }
}

fn build_pipeline(args: &Args) -> Result<Pipeline> {
    let mut config = load_config(&args.config)
        .with_context(|| format!("Failed to load {:?}", args.config))?;
    args.apply_overrides(&mut config);
    Pipeline::new(config)
}

// Stderr lines for people, printed alongside the structured log.

fn config_failure(e: &anyhow::Error) -> String {
    format!("ndvi-pipeline: invalid configuration: {:#}", e)
}

fn run_failure(e: &NdviError) -> String {
    format!("ndvi-pipeline: {} stage failed: {}", e.stage(), e)
}
