//! Snapcrawl main entry point
//!
//! This is the command-line interface for the snapcrawl site snapshot crawler.

use clap::Parser;
use snapcrawl::config::{load_config_with_hash, Config};
use snapcrawl::crawler::{crawl, CrawlOptions, ShutdownSignal};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Snapcrawl: a resumable, polite, single-origin snapshot crawler
///
/// Snapcrawl crawls one site from its sitemap or a start page while
/// respecting robots.txt, skipping login screens, and writing a minimal HTML
/// snapshot per page. Interrupted crawls resume where they stopped.
#[derive(Parser, Debug)]
#[command(name = "snapcrawl")]
#[command(version = "1.0.0")]
#[command(about = "A resumable, polite, single-origin snapshot crawler", long_about = None)]
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

    /// Discard the saved frontier and seed again
    #[arg(long)]
    fresh: bool,

    /// Drop the snapshot and cached HTML of URL and fetch it again first
    /// (repeatable)
    #[arg(long, value_name = "URL")]
    refresh: Vec<String>,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "fresh", "refresh"])]
    dry_run: bool,

    /// Show statistics from the data directory and exit
    #[arg(long, conflicts_with_all = ["dry_run", "fresh", "refresh"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loaded = load_config_with_hash(&cli.config);
    let log_path = loaded
        .as_ref()
        .ok()
        .and_then(|(config, _)| config.output.log_path.clone());
    let _log_guard = setup_logging(cli.verbose, cli.quiet, log_path.as_deref())?;

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match loaded {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, config_hash, cli.fresh, cli.refresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// With `log_path` set, a plain-text copy of the log is appended to that
/// file. The returned guard flushes it and must be kept alive.
fn setup_logging(
    verbose: u8,
    quiet: bool,
    log_path: Option<&Path>,
) -> std::io::Result<Option<WorkerGuard>> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("snapcrawl=info,warn"),
            1 => EnvFilter::new("snapcrawl=debug,info"),
            2 => EnvFilter::new("snapcrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    let (file_layer, guard) = match log_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_target(false)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    let site = &config.site;
    println!("=== Snapcrawl Dry Run ===\n");

    println!("Site:");
    println!("  Domain: {}", site.domain);
    println!("  Start URL: {}", site.start_url.as_deref().unwrap_or("(none)"));
    println!("  Sitemap index: {}", site.sitemap_index.as_deref().unwrap_or("(none)"));
    if let Some(sections) = &site.allow_sections {
        println!("  Sitemap sections: {}", sections.join(", "));
    }
    println!("  Allowed path prefixes: {}", site.allowed_path_prefixes.join(", "));
    println!("  Deny patterns ({}):", site.deny_patterns.len());
    for pattern in &site.deny_patterns {
        println!("    - {}", pattern);
    }
    println!(
        "  robots.txt failure: {}",
        if site.robots_fail_open { "allow all" } else { "disallow all" }
    );

    println!("\nCrawler:");
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  Politeness sleep: {}s", config.crawler.request_sleep_secs);
    println!("  Max pages per run: {}", config.crawler.max_pages);
    println!("  Max requests per run: {}", config.crawler.max_requests_per_run);
    println!("  State save interval: {}", config.crawler.state_save_interval);
    println!("  Volatile params: {}", config.crawler.volatile_params.join(", "));
    println!("  Retry failed: {}", config.crawler.retry_failed);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nPolicies:");
    println!("  Block login pages: {}", config.login.block_login_pages);
    println!("  Attachment policy: {}", config.attachments.policy.as_str());
    println!("  Redact e-mail: {}", config.pii.redact_email);

    println!("\nOutput:");
    println!("  Data directory: {}", config.output.data_dir.display());
    println!("  Storage: {:?}", config.output.storage);
    if let Some(log_path) = &config.output.log_path {
        println!("  Log file: {}", log_path.display());
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows totals from the data directory
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use snapcrawl::output::{load_statistics, print_statistics};

    println!("Data directory: {}\n", config.output.data_dir.display());
    let stats = load_statistics(config)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: String,
    fresh: bool,
    refresh: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring saved frontier)");
    } else {
        tracing::info!("Starting crawl (will resume a saved frontier)");
    }
    tracing::info!("Crawling {}", config.site.domain);

    let shutdown = ShutdownSignal::new();
    let listener = shutdown.listen_for_ctrl_c();
    let options = CrawlOptions {
        fresh,
        config_hash: Some(config_hash),
        refresh,
    };

    let result = crawl(config, options, shutdown).await;
    listener.abort();

    match result {
        Ok(summary) => {
            tracing::info!(
                "Crawl finished ({}): {} pages, {} requests, {} URLs left",
                summary.stop_reason,
                summary.pages_fetched,
                summary.requests_this_run,
                summary.queue_remaining
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
