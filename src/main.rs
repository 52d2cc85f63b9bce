//! Flymirror main entry point
//!
//! Command-line interface for the rule-based site mirroring engine.

use anyhow::{bail, Context};
use clap::Parser;
use flymirror::config::{load_config_with_hash, Config, MAX_WORKERS};
use flymirror::crawler::Engine;
use flymirror::output::print_report;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Flymirror: tiny, fast, multithreaded rule-based mirroring
///
/// Starts from the configured URL and applies the rules file to every
/// fetched page: save it, extract links from it, follow them.
#[derive(Parser, Debug)]
#[command(name = "flymirror")]
#[command(version)]
#[command(about = "Rule-based site mirroring", long_about = None)]
struct Cli {
    /// Rules file (`.toml`, or the tab-separated format)
    #[arg(value_name = "RULES_FILE")]
    rules: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the configured worker count
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// Validate the rules and show them without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    if !cli.rules.exists() {
        bail!("rules file {} does not exist", cli.rules.display());
    }

    tracing::info!("Loading rules from: {}", cli.rules.display());
    let (mut config, hash) = load_config_with_hash(&cli.rules)
        .with_context(|| format!("failed to load {}", cli.rules.display()))?;
    tracing::info!("Rules loaded successfully (hash: {})", hash);

    if let Some(workers) = cli.workers {
        if !(1..=MAX_WORKERS).contains(&workers) {
            bail!("--workers must be between 1 and {}, got {}", MAX_WORKERS, workers);
        }
        config.workers = workers;
    }

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config, cli.quiet).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("flymirror=info,warn"),
            1 => EnvFilter::new("flymirror=debug,info"),
            2 => EnvFilter::new("flymirror=trace,debug"),
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

/// Handles --dry-run: shows what the crawl would start from and which rules apply
fn handle_dry_run(config: &Config) {
    println!("=== Flymirror Dry Run ===\n");

    println!("Start: {}", config.start);
    println!("Workers: {}", config.workers);
    println!("User agent: {}", config.fetch.user_agent);
    println!("Timeout: {}s", config.fetch.timeout_secs);

    println!("\nVariables ({}):", config.vars.len());
    let mut vars: Vec<_> = config.vars.iter().collect();
    vars.sort();
    for (name, value) in vars {
        println!("  {} = {}", name, value);
    }

    println!("\nRules ({}), first match wins:", config.rules.len());
    for (index, rule) in config.rules.iter().enumerate() {
        println!("  {}. {}", index + 1, rule.url_match);
        println!("     save as:   {}", rule.save_as.as_deref().unwrap_or("-"));
        println!("     find:      {}", rule.find.as_deref().unwrap_or("-"));
        if rule.find.is_some() {
            println!("     transform: {}", rule.effective_transform());
        }
    }

    println!("\n✓ Rules are valid");
}

/// Runs the crawl until it drains or Ctrl-C is pressed
async fn handle_crawl(config: Config, quiet: bool) -> anyhow::Result<()> {
    let engine = Engine::with_http(config).context("failed to start crawl engine")?;
    let handle = engine.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after in-flight requests");
            handle.stop();
        }
    });

    let report = engine.run().await;

    if !quiet {
        println!();
        print_report(&report);
    }

    Ok(())
}
