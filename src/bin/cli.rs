//! Job harvester CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use job_harvester::{
    error::Result,
    models::Config,
    pipeline,
    storage::{LocalStorage, local::DATASET_FILE},
};

/// Job board harvester
#[derive(Parser, Debug)]
#[command(
    name = "job-harvester",
    version,
    about = "Harvests normalized job postings from a job board"
)]
struct Cli {
    /// Storage directory for the dataset, stats and snapshots
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Config file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the configured seeds and append records to the dataset
    Crawl {
        /// Override the number of records wanted
        #[arg(long)]
        quota: Option<usize>,

        /// Override the worker pool size
        #[arg(long)]
        concurrency: Option<usize>,

        /// Save HTML snapshots of pages that yield nothing
        #[arg(long)]
        debug: bool,
    },

    /// Validate the configuration
    Validate,

    /// Show dataset and last-run info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.storage_dir.join("config.toml"));
    let mut config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        Config::default()
    };

    if let Command::Crawl {
        quota,
        concurrency,
        debug,
    } = &cli.command
    {
        if let Some(quota) = quota {
            config.crawler.quota = *quota;
        }
        if let Some(concurrency) = concurrency {
            config.crawler.max_concurrent = *concurrency;
        }
        config.crawler.debug |= *debug;
    }

    init_logging(cli.verbose || config.crawler.debug);
    log::info!("Job harvester starting...");
    if config_path.exists() {
        log::info!("Loaded configuration from {}", config_path.display());
    } else {
        log::info!("No config at {}; using defaults", config_path.display());
    }

    let storage = Arc::new(LocalStorage::new(&cli.storage_dir));

    match cli.command {
        Command::Crawl { .. } => {
            let summary = pipeline::run_crawler(&config, storage.clone()).await?;
            log::info!(
                "{} record(s) appended to {}",
                summary.pushed,
                storage.root().join(DATASET_FILE).display()
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} seed(s), quota {}, {} browser identities)",
                config.crawler.seeds.len(),
                config.crawler.quota,
                config.identity.browsers.len()
            );
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());

            let records = storage.load_records().await?;
            log::info!("Dataset: {} record(s)", records.len());

            match storage.load_summary().await? {
                Some(summary) => pipeline::log_summary(&summary),
                None => log::info!("No run recorded yet."),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
