//! LinkLoom main entry point
//!
//! This is the command-line interface for the LinkLoom link-graph crawler.

use anyhow::Context;
use clap::{Parser, Subcommand};
use linkloom::config::{load_config_with_hash, Config};
use linkloom::crawler::{Coordinator, CrawlContext};
use linkloom::storage::{LinkGraph, SqliteLinkGraph};
use linkloom::url::parse_link_url;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// LinkLoom: a polite, resumable link-graph crawler
///
/// LinkLoom crawls websites breadth-first while respecting robots.txt and a
/// global fetch interval. Every discovered URL and discovery edge is kept in a
/// SQLite link graph that survives restarts.
#[derive(Parser, Debug)]
#[command(name = "linkloom")]
#[command(version = "1.0.0")]
#[command(about = "A polite link-graph crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "config.toml")]
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
    /// Crawl breadth-first from a start URL
    Crawl {
        /// URL to start from
        url: String,

        /// Stop after this many visited pages (defaults to crawler.max-pages)
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Show link graph statistics and exit
    Stats,

    /// List URLs not checked within the given number of days
    Stale {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },

    /// Remove a URL, reconnecting its parents to its children
    Remove { url: String },

    /// Remove every URL of a domain
    Purge { domain: String },

    /// Print up to N URLs from the graph
    Sample {
        #[arg(default_value_t = 10)]
        count: usize,
    },

    /// Show the parents and children of a URL
    Links { url: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Crawl { url, max_pages } => {
            let max_pages = max_pages.unwrap_or(config.crawler.max_pages);
            handle_crawl(&config, &url, max_pages).await
        }
        Command::Stats => handle_stats(&config),
        Command::Stale { days } => handle_stale(&config, days),
        Command::Remove { url } => handle_remove(&config, &url),
        Command::Purge { domain } => handle_purge(&config, &domain),
        Command::Sample { count } => handle_sample(&config, count),
        Command::Links { url } => handle_links(&config, &url),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("linkloom=info,warn"),
            1 => EnvFilter::new("linkloom=debug,info"),
            2 => EnvFilter::new("linkloom=trace,debug"),
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

fn open_graph(config: &Config) -> anyhow::Result<SqliteLinkGraph> {
    let path = Path::new(&config.output.database_path);
    SqliteLinkGraph::new(path).with_context(|| format!("failed to open {}", path.display()))
}

/// Runs one crawl; Ctrl-C stops it after the current page
async fn handle_crawl(config: &Config, start_url: &str, max_pages: usize) -> anyhow::Result<()> {
    parse_link_url(start_url).with_context(|| format!("invalid start URL {start_url:?}"))?;

    let context = CrawlContext::from_config(config).await?;
    let store = context.store.clone();

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current page");
            signal_token.cancel();
        }
    });

    let coordinator = Coordinator::new(context).with_cancellation(token);
    let visited = match coordinator.crawl(start_url, max_pages).await {
        Ok(visited) => visited,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    let stats = store.statistics()?;
    println!("Visited {} pages", visited.len());
    println!(
        "Graph now holds {} URLs across {} domains ({} edges)",
        stats.nodes, stats.domains, stats.edges
    );

    Ok(())
}

fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let stats = open_graph(config)?.statistics()?;

    println!("=== Link Graph Statistics ===");
    println!("  URLs:           {}", stats.nodes);
    println!("  Discovery edges: {}", stats.edges);
    println!("  Domains:        {}", stats.domains);
    println!("  Fetched pages:  {}", stats.hashed_nodes);

    Ok(())
}

fn handle_stale(config: &Config, days: i64) -> anyhow::Result<()> {
    let threshold = chrono::Utc::now() - chrono::Duration::days(days);
    let urls = open_graph(config)?.stale_before(threshold)?;

    println!("{} URLs not checked in the last {} days", urls.len(), days);
    for url in urls {
        println!("  {}", url);
    }

    Ok(())
}

fn handle_remove(config: &Config, url: &str) -> anyhow::Result<()> {
    if open_graph(config)?.remove(url)? {
        println!("✓ Removed {}", url);
    } else {
        println!("{} is not in the graph", url);
    }

    Ok(())
}

fn handle_purge(config: &Config, domain: &str) -> anyhow::Result<()> {
    let removed = open_graph(config)?.purge_domain(&domain.to_lowercase())?;
    println!("✓ Removed {} URLs from {}", removed, domain);

    Ok(())
}

fn handle_sample(config: &Config, count: usize) -> anyhow::Result<()> {
    for url in open_graph(config)?.sample(count)? {
        println!("{}", url);
    }

    Ok(())
}

fn handle_links(config: &Config, url: &str) -> anyhow::Result<()> {
    let graph = open_graph(config)?;

    let Some(node) = graph.get(url)? else {
        println!("{} is not in the graph", url);
        return Ok(());
    };

    println!("{} ({})", node.url, node.domain);
    if let Some(checked) = node.last_checked {
        println!("  Last checked: {}", checked.to_rfc3339());
    }
    if let Some(hash) = &node.content_hash {
        println!("  Content hash: {}", hash);
    }

    let parents = graph.parents(url)?;
    println!("\nFound on ({}):", parents.len());
    for parent in parents {
        println!("  - {}", parent);
    }

    let children = graph.children(url)?;
    println!("\nLinks to ({}):", children.len());
    for child in children {
        println!("  - {}", child);
    }

    Ok(())
}
