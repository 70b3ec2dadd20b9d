//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the staged catalog harvester.

use anyhow::{Context, Result};
use catalog_harvest::config::{load_config_with_hash, Config};
use catalog_harvest::frontier::ChromiumSession;
use catalog_harvest::output::{load_statistics, print_statistics};
use catalog_harvest::storage::lock_storage;
use catalog_harvest::Pipeline;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a staged product catalog harvester
///
/// Discovers item pages on an infinite-scroll listing, fetches them, extracts
/// product records and downloads product images. Every stage works on
/// bounded batches and can be re-run safely.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A staged product catalog harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scroll the listing page and enqueue newly seen item URLs
    Discover {
        /// Maximum scroll rounds (defaults to the configured value)
        #[arg(long)]
        max_iterations: Option<u32>,
    },

    /// Fetch a batch of NEW item pages
    Fetch {
        /// Number of items to claim
        #[arg(long, default_value_t = 10)]
        size: usize,
    },

    /// Extract records from a batch of FETCHED pages
    Parse {
        /// Number of items to claim
        #[arg(long, default_value_t = 100)]
        size: usize,
    },

    /// Download images for a batch of PARSED records
    Assets {
        /// Number of items to claim
        #[arg(long, default_value_t = 10)]
        size: usize,
    },

    /// Show item counts per status
    Status,

    /// Delete all records and return every item to NEW
    Reset,

    /// Return items stuck in FETCHING to NEW
    Recover,

    /// Validate the configuration and print what would run
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Command::Check = cli.command {
        handle_check(&config);
        return Ok(());
    }

    let pipeline = Pipeline::new(config).context("failed to initialize pipeline")?;

    match cli.command {
        Command::Discover { max_iterations } => handle_discover(&pipeline, max_iterations).await?,
        Command::Fetch { size } => {
            let summary = pipeline.fetch_batch(size).await?;
            println!("Fetch: {}", summary);
        }
        Command::Parse { size } => {
            let summary = pipeline.parse_batch(size).await?;
            println!("Parse: {}", summary);
        }
        Command::Assets { size } => {
            let summary = pipeline.fetch_assets_batch(size).await?;
            println!("Assets: {}", summary);
        }
        Command::Status => {
            let storage = lock_storage(pipeline.storage())?;
            let stats = load_statistics(&*storage)?;
            print_statistics(&stats);
        }
        Command::Reset => {
            let reset = pipeline.reset_all()?;
            println!("Reset {} items to NEW", reset);
        }
        Command::Recover => {
            let requeued = pipeline.requeue_interrupted()?;
            println!("Requeued {} interrupted items", requeued);
        }
        Command::Check => handle_check(pipeline.config()),
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Launches a browser and runs discovery to completion
async fn handle_discover(pipeline: &Pipeline, max_iterations: Option<u32>) -> Result<()> {
    let rounds = max_iterations.unwrap_or(pipeline.config().discovery.max_iterations);
    let discovery = &pipeline.config().discovery;
    let session = ChromiumSession::launch(
        discovery.headless,
        Duration::from_millis(discovery.render_timeout_ms),
    )
    .await
    .context("failed to launch browser")?;

    let handle = pipeline.run_discovery(session, rounds)?;
    let report = handle.await.context("discovery task panicked")??;

    println!(
        "Discovery stopped after {} rounds ({:?}): {} new items",
        report.rounds, report.reason, report.items_added
    );
    Ok(())
}

/// Prints the effective configuration
fn handle_check(config: &Config) {
    println!("=== Catalog-Harvest Configuration ===\n");

    println!("Discovery:");
    println!("  Start URL: {}", config.discovery.start_url);
    println!("  Item selector: {}", config.discovery.item_selector);
    println!("  Link selector: {}", config.discovery.link_selector);
    println!("  Max iterations: {}", config.discovery.max_iterations);
    println!(
        "  Stop after {} stagnant rounds or {} unchanged extents",
        config.discovery.stagnation_threshold, config.discovery.unchanged_extent_threshold
    );

    println!("\nFetch:");
    println!("  Concurrency: {}", config.fetch.concurrency);
    println!("  Max attempts: {}", config.fetch.max_attempts);
    println!("  User agents: {}", config.fetch.user_agents.len());
    println!("  Proxies: {}", config.fetch.proxies.len());

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Raw pages: {}", config.storage.raw_root);
    println!("  Assets: {}", config.storage.asset_root);

    println!("\nExtraction:");
    println!("  Asset slots: {}", config.extraction.assets.len());

    println!("\n✓ Configuration is valid");
}
