//! STRATARB — multi-pool AMM arbitrage engine for STRATO networks.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! authenticates against the node, and runs the scan loop with graceful
//! shutdown. Dry-run is the default; `--live` submits real swaps.

use std::time::Duration;

use alloy_primitives::I256;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use stratarb::chain::oauth::OAuthClient;
use stratarb::chain::strato::StratoClient;
use stratarb::chain::TradingVenue;
use stratarb::config::AppConfig;
use stratarb::engine::{Engine, QUOTE_SYMBOL};
use stratarb::ledger::ProfitLedger;
use stratarb::market::alchemy::AlchemyPriceFeed;
use stratarb::math::signed_wei_to_f64;

const BANNER: &str = r#"
 ____ _____ ____      _  _____  _    ____  ____
/ ___|_   _|  _ \    / \|_   _|/ \  |  _ \| __ )
\___ \ | | | |_) |  / _ \ | | / _ \ | |_) |  _ \
 ___) || | |  _ <  / ___ \| |/ ___ \|  _ <| |_) |
|____/ |_| |_| \_\/_/   \_\_/_/   \_\_| \_\____/

  STRATO Network AMM Arbitrage Engine
  v0.1.0
"#;

#[derive(Parser, Debug)]
#[command(name = "stratarb")]
#[command(about = "Multi-pool AMM arbitrage engine for STRATO networks")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short = 'c', long, default_value = "config.toml")]
    config: String,

    /// Submit real swaps instead of simulating them
    #[arg(long)]
    live: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let args = Args::parse();
    let cfg = AppConfig::load(&args.config)?;

    init_logging();

    println!("{BANNER}");
    let dry_run = !args.live;
    info!(
        pools = cfg.pools.len(),
        interval_secs = cfg.execution.interval_secs,
        min_profit = cfg.trading.min_profit,
        fee_bps = cfg.trading.fee_bps,
        dry_run,
        "STRATARB starting up"
    );
    if dry_run {
        warn!("Dry-run mode: swaps are simulated, nothing reaches the chain. Pass --live to trade.");
    }

    // -- Connect to the chain ---------------------------------------------

    let oauth = OAuthClient::from_env()?;
    let venue = StratoClient::connect(oauth).await?;
    info!(venue = venue.name(), account = venue.account(), "Venue connected");

    // -- Price feed --------------------------------------------------------

    let feed = AlchemyPriceFeed::from_env(cfg.oracle.timeout_secs, cfg.oracle.cache_secs)?;
    let mut symbols: Vec<String> = cfg
        .pools
        .iter()
        .map(|pool| pool.external_token_name.clone())
        .collect();
    symbols.push(QUOTE_SYMBOL.to_string());
    symbols.sort();
    symbols.dedup();
    feed.prefetch(&symbols).await;

    // -- Ledger and allowances --------------------------------------------

    let ledger = ProfitLedger::new(None);
    let opening = ledger.load();
    info!(
        path = ledger.path(),
        cumulative_usd = format!("{:.2}", opening.cumulative_profit_usd),
        "Profit ledger open"
    );

    if dry_run {
        info!("Dry-run mode: skipping allowance setup");
    } else {
        for pool in &cfg.pools {
            venue
                .ensure_allowances(&pool.address)
                .await
                .with_context(|| format!("Allowance setup failed for pool {}", pool.address))?;
        }
    }

    // -- Engine ------------------------------------------------------------

    let engine = Engine::new(venue, feed, ledger, &cfg, dry_run)?;

    // -- Main loop ---------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.execution.interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.execution.interval_secs,
        "Entering scan loop. Press Ctrl+C to stop."
    );

    let mut passes: u64 = 0;
    let mut trades: usize = 0;
    let mut expected_profit = I256::ZERO;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = engine.scan_once().await;
                passes += 1;
                trades += report.executed();
                expected_profit += report.total_profit();
                log_session_totals(passes, trades, expected_profit);
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!(
        passes,
        trades,
        expected_profit = format!("{:+.6}", signed_wei_to_f64(expected_profit)),
        "STRATARB shut down cleanly."
    );

    Ok(())
}

/// Log running totals for the session after each scan pass.
fn log_session_totals(passes: u64, trades: usize, expected_profit: I256) {
    info!(
        passes,
        trades,
        expected_profit = format!("{:+.6}", signed_wei_to_f64(expected_profit)),
        "Session totals"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stratarb=info"));

    let json_logging = std::env::var("STRATARB_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
