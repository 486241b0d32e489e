//! Accident-Harvest main entry point
//!
//! This is the command-line interface for the accident registry harvester.

use accident_harvest::config::{load_config_with_hash, Config};
use accident_harvest::crawler::{order_years, run_crawl, ResumeCursor};
use accident_harvest::output::{load_statistics, print_report, print_statistics};
use accident_harvest::storage::open_for_reading;
use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Accident-Harvest: an incremental aviation accident registry harvester
///
/// Walks the registry's year listings, extracts one record per table row and
/// stores them in SQLite. Later runs resume from the latest stored date.
#[derive(Parser, Debug)]
#[command(name = "accident-harvest")]
#[command(version)]
#[command(about = "An incremental aviation accident registry harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show which years would be processed without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)?;
        Ok(ExitCode::SUCCESS)
    } else if cli.stats {
        handle_stats(&config)?;
        Ok(ExitCode::SUCCESS)
    } else {
        handle_crawl(config, config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("accident_harvest=info,warn"),
            1 => EnvFilter::new("accident_harvest=debug,info"),
            2 => EnvFilter::new("accident_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows the resume window
///
/// Never touches the network; an empty store is reported as needing discovery.
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Accident-Harvest Dry Run ===\n");

    println!("Source:");
    println!("  Base URL: {}", config.source.base_url);

    println!("\nCrawler Configuration:");
    println!(
        "  Max concurrent pages: {}",
        config.crawler.max_concurrent_pages
    );
    println!(
        "  Resume upper bound (exclusive): {}",
        config.crawler.resume_upper_bound_year
    );
    println!("  Fail fast: {}", config.crawler.fail_fast);
    println!(
        "  Request timeout: {}s",
        config.crawler.request_timeout_secs
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Deduplicate: {}", config.output.deduplicate);

    let storage = open_for_reading(Path::new(&config.output.database_path))?;
    let cursor = ResumeCursor::from_storage(&storage)?;

    println!("\nResume Window:");
    match cursor.window(config.crawler.resume_upper_bound_year) {
        None => println!("  Store is empty; years would be discovered from the landing page"),
        Some(years) if years.is_empty() => {
            println!("  Nothing to do; store already reaches the upper bound")
        }
        Some(years) => {
            let years = order_years(years);
            println!(
                "  Last stored date: {}",
                cursor
                    .last_date
                    .map(|d| d.to_string())
                    .unwrap_or_default()
            );
            println!(
                "  Years: {} .. {} ({} total)",
                years[0],
                years[years.len() - 1],
                years.len()
            );
        }
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_for_reading(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
///
/// Exits with status 2 when any year or page failed, so schedulers can retry.
async fn handle_crawl(config: Config, config_hash: String) -> anyhow::Result<ExitCode> {
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            return;
        }
        tracing::warn!("Received Ctrl+C, finishing in-flight pages");
        shutdown.cancel();
    });

    match run_crawl(config, config_hash, cancel).await {
        Ok(report) => {
            print_report(&report);
            if report.hard_failures().next().is_some() {
                Ok(ExitCode::from(2))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
