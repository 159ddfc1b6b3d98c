//! PumpWatch - PumpSwap token discovery and Telegram alert service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use pumpwatch::adapters::dexscreener::DexScreenerClient;
use pumpwatch::adapters::store::JsonStateStore;
use pumpwatch::adapters::telegram::TelegramClient;
use pumpwatch::application::discovery::{DiscoveryAggregator, DiscoveryConfig};
use pumpwatch::application::{Orchestrator, SharedState};
use pumpwatch::config::load_config;
use pumpwatch::domain::{now_ms, passes};

/// PumpWatch - PumpSwap token discovery and alert service
#[derive(Parser, Debug)]
#[command(
    name = "pumpwatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "PumpSwap token discovery and Telegram alert service",
    long_about = "PumpWatch merges DexScreener discovery feeds, search queries and the \
                  PumpPortal graduation stream into one tracked token set, evaluates it \
                  against configured market filters and alerts Telegram once per token \
                  per qualifying transition."
)]
struct CliApp {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full service (discovery, stream, watchers, commands)
    Run(RunCmd),

    /// One discovery + filter pass printed to stdout, no alerts
    Scan(ScanCmd),

    /// Load and validate the configuration, then print a summary
    Check(CheckCmd),
}

#[derive(Parser, Debug)]
struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/default.toml")]
    config: PathBuf,
}

#[derive(Parser, Debug)]
struct ScanCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/default.toml")]
    config: PathBuf,
}

#[derive(Parser, Debug)]
struct CheckCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/default.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present (credentials go there, not in config.toml).
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    init_logging(app.verbose, app.debug);

    match app.command {
        Command::Run(cmd) => run_command(cmd).await,
        Command::Scan(cmd) => scan_command(cmd).await,
        Command::Check(cmd) => check_command(cmd).await,
    }
}

fn init_logging(verbose: bool, debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pumpwatch=info"))
    };

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn run_command(cmd: RunCmd) -> Result<()> {
    tracing::info!("starting pumpwatch...");

    let config = load_config(&cmd.config).context("Failed to load configuration")?;

    let store = JsonStateStore::new(config.service.resolved_data_dir())
        .context("Failed to open data directory")?;
    let market = DexScreenerClient::new(
        &config.provider.base_url,
        &config.provider.chain_id,
        &config.provider.venue_marker,
        config.provider.timeout_secs,
    )
    .context("Failed to create DexScreener client")?;
    let messenger = TelegramClient::new(
        &config.telegram.resolved_bot_token(),
        &config.telegram.resolved_chat_id(),
        config.telegram.timeout_secs,
    )
    .context("Failed to create Telegram client")?;

    let orchestrator = Arc::new(
        Orchestrator::new(config, Arc::new(market), Arc::new(messenger), Arc::new(store))
            .context("Failed to create orchestrator")?,
    );

    let orch = Arc::clone(&orchestrator);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutdown signal received");
        orch.stop().await;
    });

    orchestrator.run().await?;
    tracing::info!("pumpwatch stopped");
    Ok(())
}

async fn scan_command(cmd: ScanCmd) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;

    let store = Arc::new(
        JsonStateStore::new(config.service.resolved_data_dir())
            .context("Failed to open data directory")?,
    );
    let market = Arc::new(
        DexScreenerClient::new(
            &config.provider.base_url,
            &config.provider.chain_id,
            &config.provider.venue_marker,
            config.provider.timeout_secs,
        )
        .context("Failed to create DexScreener client")?,
    );
    let state = Arc::new(SharedState::new(&config.filters));

    let aggregator = DiscoveryAggregator::new(
        market,
        store,
        Arc::clone(&state),
        DiscoveryConfig {
            search_queries: config.provider.search_queries.clone(),
            max_age_hours: config.max_filter_age_hours(),
            cleanup_buffer_hours: config.service.cleanup_buffer_hours,
        },
    );

    println!("Running one discovery pass...");
    let (snapshots, report) = aggregator.run_cycle().await;
    println!(
        "{} unique pairs ({} feed addresses, {} search pairs, +{} newly known)",
        report.unique_pairs, report.feed_addresses, report.search_pairs, report.newly_known
    );

    let now = now_ms();
    for filter in &config.filters {
        let matching: Vec<_> = snapshots
            .iter()
            .filter(|s| !s.address.is_empty() && passes(s, filter, now))
            .collect();
        println!("\n{} — {} matching", filter.label, matching.len());
        for (i, snapshot) in matching.iter().enumerate() {
            println!(
                "  {}. {} ({}) MC ${:.0}  Vol24h ${:.0}  {}",
                i + 1,
                snapshot.symbol,
                snapshot.address,
                snapshot.effective_market_cap(),
                snapshot.volume_24h_usd.unwrap_or(0.0),
                snapshot
                    .price_change_24h_pct
                    .map(|c| format!("{c:+.1}%"))
                    .unwrap_or_else(|| "n/a".to_string()),
            );
        }
    }

    Ok(())
}

async fn check_command(cmd: CheckCmd) -> Result<()> {
    let config = load_config(&cmd.config).context("Configuration invalid")?;

    println!("✓ Configuration valid: {}", cmd.config.display());
    println!(
        "  Provider: {} (chain {:?}, venue marker {:?})",
        config.provider.base_url, config.provider.chain_id, config.provider.venue_marker
    );
    println!(
        "  Discovery every {}s, filters every {}s, cleanup buffer {}h",
        config.service.poll_interval_secs,
        config.service.filter_poll_secs,
        config.service.cleanup_buffer_hours
    );
    println!(
        "  Stream: {}",
        if config.stream.enabled {
            config.stream.ws_url.as_str()
        } else {
            "disabled"
        }
    );
    println!("  Data dir: {}", config.service.resolved_data_dir().display());
    println!("  Filters ({}):", config.filters.len());
    for filter in &config.filters {
        println!("    [{}] {} — {}", filter.key, filter.label, filter.summary());
    }

    Ok(())
}
