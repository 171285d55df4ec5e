//! Furlong main entry point
//!
//! This is the command-line interface for the Furlong race crawler.

use anyhow::Context;
use clap::Parser;
use furlong::config::{build_run_plan, load_config_with_hash, validate_config, Config, RunPlan};
use furlong::crawler::Coordinator;
use furlong::output::{print_progress, print_statistics};
use furlong::storage::{CheckpointStore, FileCheckpointStore};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Furlong: a pruning crawler for race results
///
/// Furlong walks the race identifiers of one year, skipping whole meetings
/// and days as soon as the service reports them missing, and saves the
/// results table of every race it finds. Progress is checkpointed so an
/// interrupted run resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "furlong")]
#[command(version)]
#[command(about = "A pruning crawler for race results", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Year to crawl
    #[arg(long)]
    year: u16,

    /// Two-digit place codes to crawl (default: all)
    #[arg(long, num_args = 1.., value_name = "CODE")]
    places: Vec<String>,

    /// Items per batch before the long pause
    #[arg(long)]
    batch_size: Option<u32>,

    /// Seconds to pause between batches
    #[arg(long, value_name = "SECS")]
    pause: Option<u64>,

    /// Stop after this many records have been fetched
    #[arg(long)]
    max_items: Option<u32>,

    /// Forget checkpointed progress for these places before crawling
    #[arg(long, num_args = 1.., value_name = "CODE")]
    reset_places: Vec<String>,

    /// Output directory for the checkpoint log and snapshots
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "status")]
    dry_run: bool,

    /// Show checkpointed progress for the year and exit
    #[arg(long, conflicts_with = "dry_run")]
    status: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = load_config_with_hash(cli.config.as_deref())
        .context("failed to load configuration")?;
    match &cli.config {
        Some(path) => tracing::info!(
            "Configuration loaded from {} (hash: {})",
            path.display(),
            config_hash
        ),
        None => tracing::info!("Using built-in configuration"),
    }

    // Command-line overrides
    if let Some(batch_size) = cli.batch_size {
        config.crawler.batch_size = batch_size;
    }
    if let Some(pause) = cli.pause {
        config.crawler.inter_batch_pause_secs = pause;
    }
    if let Some(output) = &cli.output {
        config.output.directory = output.clone();
    }
    validate_config(&config).context("invalid command-line override")?;

    let plan = build_run_plan(cli.year, &cli.places, cli.max_items, &cli.reset_places)
        .context("invalid run plan")?;

    if cli.dry_run {
        handle_dry_run(&config, &plan)
    } else if cli.status {
        handle_status(&config, &plan)
    } else {
        handle_crawl(config, plan, config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("furlong=info,warn"),
            1 => EnvFilter::new("furlong=debug,info"),
            2 => EnvFilter::new("furlong=trace,debug"),
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

/// Loads the checkpoint log without creating it
fn load_checkpoints(
    config: &Config,
    year: u16,
) -> anyhow::Result<Option<furlong::storage::CheckpointSet>> {
    let path = config.output.checkpoint_path(year);
    if !path.exists() {
        return Ok(None);
    }
    let store = FileCheckpointStore::open(&path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    Ok(Some(store.load()?))
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, plan: &RunPlan) -> anyhow::Result<()> {
    println!("=== Furlong Dry Run ===\n");

    println!("Service:");
    println!("  Base URL: {}", config.service.base_url);
    println!(
        "  Timeouts: {}s request, {}s connect",
        config.service.request_timeout_secs, config.service.connect_timeout_secs
    );
    println!(
        "  Retries: {} attempts, backoff {}ms..{}ms",
        config.retry.max_attempts, config.retry.initial_backoff_ms, config.retry.max_backoff_ms
    );

    println!("\nPacing:");
    println!(
        "  Batch: {} items, then {}s pause",
        config.crawler.batch_size, config.crawler.inter_batch_pause_secs
    );
    println!(
        "  Jitter: every {} items, {}..{}ms",
        config.crawler.jitter_every, config.crawler.jitter_min_ms, config.crawler.jitter_max_ms
    );
    println!(
        "  Snapshot: every {} items",
        u64::from(config.crawler.batch_size) * u64::from(config.crawler.snapshot_multiplier)
    );

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory.display());
    println!(
        "  Checkpoint log: {}",
        config.output.checkpoint_path(plan.year).display()
    );
    println!("  Debug HTML: {}", config.output.save_debug_html);

    println!("\nPlan:");
    println!("  Year: {}", plan.year);
    println!("  Places ({}):", plan.places.len());
    for place in &plan.places {
        println!("    - {}", place);
    }
    match plan.max_items {
        Some(max) => println!("  Record cap: {}", max),
        None => println!("  Record cap: none"),
    }

    if let Some(done) = load_checkpoints(config, plan.year)? {
        println!(
            "  Already checkpointed: {}",
            done.restricted_to(plan.year, &plan.places).len()
        );
        if !plan.reset_places.is_empty() {
            println!(
                "  Would reset: {} entries",
                done.restricted_to(plan.year, &plan.reset_places).len()
            );
        }
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --status mode: shows checkpointed progress per place
fn handle_status(config: &Config, plan: &RunPlan) -> anyhow::Result<()> {
    let path = config.output.checkpoint_path(plan.year);
    println!("Checkpoint log: {}\n", path.display());

    match load_checkpoints(config, plan.year)? {
        Some(done) => print_progress(plan.year, &plan.places, &done.progress_by_place(plan.year)),
        None => println!("No progress recorded for {} yet", plan.year),
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, plan: RunPlan, config_hash: String) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let mut coordinator = Coordinator::new(config, plan, config_hash)
        .context("failed to start crawl")?
        .with_cancellation(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current item");
            cancel.cancel();
        }
    });

    match coordinator.run().await {
        Ok(stats) => {
            print_statistics(&stats);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
