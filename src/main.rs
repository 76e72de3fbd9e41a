//! Courtside main entry point
//!
//! This is the command-line interface for the Courtside player crawler.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use courtside::config::{load_config_with_hash, Config};
use courtside::crawler::{read_url_file, run_crawl, CrawlKind};
use courtside::output::print_report;
use courtside::search::open_store;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Courtside: a basketball player statistics crawler
///
/// Courtside scrapes player pages with a fixed pool of fetchers, stores the
/// career numbers in SQLite and keeps an Elasticsearch index in step with
/// every committed change.
#[derive(Parser, Debug)]
#[command(name = "courtside")]
#[command(version)]
#[command(about = "A basketball player statistics crawler", long_about = None)]
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
    /// Crawl player pages and store their records
    Crawl {
        /// File with one player page URL per line
        #[arg(short, long)]
        input: PathBuf,

        /// Override the configured worker count
        #[arg(short, long)]
        workers: Option<usize>,

        /// Show what would be crawled without crawling
        #[arg(long)]
        dry_run: bool,
    },

    /// Fill in headshot file names of stored players
    Images {
        /// File with one player page URL per line
        #[arg(short, long)]
        input: PathBuf,

        /// Override the configured worker count
        #[arg(short, long)]
        workers: Option<usize>,

        /// Show what would be crawled without crawling
        #[arg(long)]
        dry_run: bool,
    },

    /// Full-text search over stored players
    Search {
        query: String,

        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Results per page (defaults to the configured value)
        #[arg(long)]
        per_page: Option<usize>,
    },

    /// Print one stored player as JSON
    Show { id: i64 },

    /// Rebuild the search index from the store
    Reindex,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::debug!("Configuration loaded (hash: {})", config_hash);

    match cli.command {
        Command::Crawl {
            input,
            workers,
            dry_run,
        } => {
            handle_crawl(&mut config, &config_hash, &input, workers, dry_run, CrawlKind::Players).await?
        }
        Command::Images {
            input,
            workers,
            dry_run,
        } => {
            handle_crawl(&mut config, &config_hash, &input, workers, dry_run, CrawlKind::Images).await?
        }
        Command::Search {
            query,
            page,
            per_page,
        } => handle_search(&config, &query, page, per_page).await?,
        Command::Show { id } => handle_show(&config, id)?,
        Command::Reindex => handle_reindex(&config).await?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("courtside=info,warn"),
            1 => EnvFilter::new("courtside=debug,info"),
            2 => EnvFilter::new("courtside=trace,debug"),
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

/// Handles `crawl` and `images`
async fn handle_crawl(
    config: &mut Config,
    config_hash: &str,
    input: &Path,
    workers: Option<usize>,
    dry_run: bool,
    kind: CrawlKind,
) -> anyhow::Result<()> {
    if let Some(workers) = workers {
        if workers == 0 {
            bail!("--workers must be at least 1");
        }
        config.crawler.workers = Some(workers);
    }

    let urls = read_url_file(input).with_context(|| format!("failed to read {}", input.display()))?;

    if dry_run {
        handle_dry_run(config, &urls, kind);
        return Ok(());
    }

    let report = run_crawl(config, config_hash, urls, kind)
        .await
        .context("crawl failed")?;
    print_report(&report);

    if report.abandoned > 0 {
        tracing::warn!("{} pages were abandoned, see the log for details", report.abandoned);
    }
    Ok(())
}

/// Shows what a crawl would do without starting it
fn handle_dry_run(config: &Config, urls: &[String], kind: CrawlKind) {
    println!("=== Courtside Dry Run ({}) ===\n", kind.as_str());

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.worker_count());
    println!("  Max attempts: {}", config.crawler.max_attempts);
    println!("  Retry delay: {}ms", config.crawler.retry_delay_ms);
    println!("  Extraction timeout: {}s", config.crawler.extraction_timeout_secs);
    println!("  Commit batch size: {}", config.crawler.commit_batch_size);

    println!("\nFetcher:");
    println!("  Backend: {:?}", config.fetcher.backend);
    println!("  User agent: {}", config.fetcher.user_agent);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    println!("\nSearch:");
    match &config.search.elasticsearch_url {
        Some(url) => println!("  Elasticsearch: {} (index \"{}\")", url, config.search.index),
        None => println!("  Elasticsearch: disabled"),
    }

    println!("\nPages ({}):", urls.len());
    for url in urls.iter().take(20) {
        println!("  - {}", url);
    }
    if urls.len() > 20 {
        println!("  ... and {} more", urls.len() - 20);
    }
}

async fn handle_search(
    config: &Config,
    query: &str,
    page: usize,
    per_page: Option<usize>,
) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let per_page = per_page.unwrap_or(config.search.per_page);
    let results = store.search(query, page, per_page).await?;

    let items: Vec<serde_json::Value> = results.items.iter().map(|p| p.to_json()).collect();
    let output = serde_json::json!({
        "query": query,
        "page": page,
        "per_page": per_page,
        "total": results.total,
        "players": items,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn handle_show(config: &Config, id: i64) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let Some(player) = store.get(id)? else {
        bail!("no player with id {}", id);
    };
    println!("{}", serde_json::to_string_pretty(&player.to_json())?);
    Ok(())
}

async fn handle_reindex(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    if config.search.elasticsearch_url.is_none() {
        bail!("no Elasticsearch endpoint configured");
    }
    let indexed = store.reindex().await?;
    println!("Indexed {} players into \"{}\"", indexed, config.search.index);
    Ok(())
}
