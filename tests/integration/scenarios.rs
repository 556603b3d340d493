//! End-to-end engine scenarios against the in-memory venue.
//!
//! Each test wires a real `Engine` to `MockVenue`/`MockFeed` and runs full
//! scan passes, asserting on outcomes, venue state, and the profit ledger.

use std::path::PathBuf;

use alloy_primitives::{I256, U256};
use chrono::Utc;

use crate::mock_venue::{MockFeed, MockVenue};
use stratarb::config::{
    AppConfig, ExecutionConfig, GasSettings, OracleConfig, PoolConfig, TradingConfig,
};
use stratarb::engine::{Engine, QUOTE_SYMBOL};
use stratarb::ledger::ProfitLedger;
use stratarb::math::WEI_SCALE;
use stratarb::types::{Direction, PoolOutcome, TradeRecord, TradeSide};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn wei(n: u64) -> U256 {
    U256::from(n) * WEI_SCALE
}

fn make_pool(address: &str, token: &str) -> PoolConfig {
    PoolConfig {
        address: address.to_string(),
        external_token_name: token.to_string(),
    }
}

fn make_config(pools: Vec<PoolConfig>, min_profit: f64) -> AppConfig {
    AppConfig {
        pools,
        trading: TradingConfig {
            fee_bps: 0,
            min_profit,
        },
        oracle: OracleConfig {
            timeout_secs: 5,
            cache_secs: 60,
        },
        execution: ExecutionConfig { interval_secs: 1 },
        gas: GasSettings::default(),
    }
}

fn temp_ledger(tag: &str) -> (ProfitLedger, PathBuf) {
    let path = std::env::temp_dir().join(format!("stratarb-{tag}-{}.json", uuid::Uuid::new_v4()));
    (ProfitLedger::new(path.to_str()), path)
}

/// Feed quoting PEPE and USDST at 1 USD each.
fn standard_feed() -> MockFeed {
    let feed = MockFeed::new();
    feed.set_price("PEPE", wei(1));
    feed.set_price(QUOTE_SYMBOL, wei(1));
    feed
}

/// One pool at reserves 4/9 with balances 10/10 and vouchers covering gas.
/// Against a 1.0 reference the engine sizes a 2-in 3-out sell worth 1.0.
fn standard_venue() -> MockVenue {
    let venue = MockVenue::new(0);
    venue.add_pool("p1", wei(4), wei(9), wei(10), wei(10));
    venue.set_gas(U256::ZERO, wei(1));
    venue
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_live_sell_executes_end_to_end() {
    let venue = standard_venue();
    let (ledger, path) = temp_ledger("live-sell");
    let engine = Engine::new(
        venue.clone(),
        standard_feed(),
        ledger,
        &make_config(vec![make_pool("p1", "PEPE")], 0.0),
        false,
    )
    .unwrap();

    let report = engine.scan_once().await;

    assert_eq!(report.executed(), 1);
    match &report.outcomes[0].1 {
        PoolOutcome::Executed {
            receipt,
            profit,
            profit_recorded,
        } => {
            assert!(!receipt.dry_run);
            assert_eq!(receipt.direction, Direction::XtoY);
            assert_eq!(*profit, I256::from_raw(wei(1)));
            assert!(profit_recorded);
        }
        other => panic!("expected execution, got {other}"),
    }

    // The venue saw exactly one swap, with the 4% output floor applied.
    let receipts = venue.get_receipts();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].amount_in, wei(2));
    assert_eq!(
        receipts[0].min_amount_out,
        wei(3) * U256::from(96u64) / U256::from(100u64)
    );

    // Reserves and balances moved by the full constant-product fill.
    assert_eq!(venue.reserves_of("p1"), Some((wei(6), wei(6))));
    let balances = venue.balances_of("p1").unwrap();
    assert_eq!(balances.x, wei(8));
    assert_eq!(balances.y, wei(13));

    // The ledger durably holds the realized profit at a 1 USD quote price.
    let record = ProfitLedger::new(path.to_str()).load();
    assert_eq!(record.cumulative_profit_wei, wei(1));
    assert!((record.cumulative_profit_usd - 1.0).abs() < 1e-9);

    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_dry_run_touches_neither_venue_nor_ledger() {
    let venue = standard_venue();
    let (ledger, path) = temp_ledger("dry-run");
    let engine = Engine::new(
        venue.clone(),
        standard_feed(),
        ledger,
        &make_config(vec![make_pool("p1", "PEPE")], 0.0),
        true,
    )
    .unwrap();

    let report = engine.scan_once().await;

    assert_eq!(report.executed(), 1);
    match &report.outcomes[0].1 {
        PoolOutcome::Executed { receipt, .. } => {
            assert!(receipt.dry_run);
            assert!(receipt.tx_hash.starts_with("dry-run-"));
        }
        other => panic!("expected execution, got {other}"),
    }

    assert!(venue.get_receipts().is_empty());
    assert_eq!(venue.reserves_of("p1"), Some((wei(4), wei(9))));
    assert!(!path.exists());
}

#[tokio::test]
async fn test_pool_converges_to_reference_price() {
    let venue = standard_venue();
    let (ledger, path) = temp_ledger("converge");
    let engine = Engine::new(
        venue.clone(),
        standard_feed(),
        ledger,
        &make_config(vec![make_pool("p1", "PEPE")], 0.0),
        false,
    )
    .unwrap();

    let first = engine.scan_once().await;
    assert_eq!(first.executed(), 1);

    // The first sell moved the pool to 6/6, exactly the 1.0 reference.
    let second = engine.scan_once().await;
    match &second.outcomes[0].1 {
        PoolOutcome::SkippedNoOpportunity { reason } => {
            assert!(reason.contains("equals oracle price"), "got: {reason}");
        }
        other => panic!("expected parity skip, got {other}"),
    }
    assert_eq!(venue.get_receipts().len(), 1);

    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_feed_outage_isolates_pools() {
    let venue = MockVenue::new(0);
    venue.add_pool("p-eth", wei(4), wei(9), wei(10), wei(10));
    venue.add_pool("p-pepe", wei(4), wei(9), wei(10), wei(10));
    venue.set_gas(U256::ZERO, wei(1));

    // ETH is deliberately unlisted; PEPE prices normally.
    let (ledger, path) = temp_ledger("feed-outage");
    let engine = Engine::new(
        venue.clone(),
        standard_feed(),
        ledger,
        &make_config(
            vec![make_pool("p-eth", "ETH"), make_pool("p-pepe", "PEPE")],
            0.0,
        ),
        false,
    )
    .unwrap();

    let report = engine.scan_once().await;

    assert_eq!(report.outcomes.len(), 2);
    match &report.outcomes[0].1 {
        PoolOutcome::SkippedExternalError { stage, message } => {
            assert_eq!(stage, "price feed");
            assert!(
                message.contains("No reference price for symbol: ETH"),
                "got: {message}"
            );
        }
        other => panic!("expected external error, got {other}"),
    }
    assert!(matches!(
        report.outcomes[1].1,
        PoolOutcome::Executed { .. }
    ));

    let receipts = venue.get_receipts();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].pool, "p-pepe");

    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_gas_floor_blocks_trading() {
    let venue = standard_venue();
    // 0.005 USDST is under the 0.01 reserve, 0.5 vouchers under the 1.0
    // waiver threshold.
    venue.set_gas(WEI_SCALE / U256::from(200u64), WEI_SCALE / U256::from(2u64));

    let (ledger, path) = temp_ledger("gas-floor");
    let engine = Engine::new(
        venue.clone(),
        standard_feed(),
        ledger,
        &make_config(vec![make_pool("p1", "PEPE")], 0.0),
        false,
    )
    .unwrap();

    let report = engine.scan_once().await;

    assert!(matches!(
        report.outcomes[0].1,
        PoolOutcome::SkippedGasUnavailable
    ));
    assert!(venue.get_receipts().is_empty());
    assert!(!path.exists());

    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_min_profit_floor_skips_marginal_trade() {
    let venue = standard_venue();
    let (ledger, path) = temp_ledger("min-profit");
    // The sized sell nets 1.0; demand 2.0.
    let engine = Engine::new(
        venue.clone(),
        standard_feed(),
        ledger,
        &make_config(vec![make_pool("p1", "PEPE")], 2.0),
        false,
    )
    .unwrap();

    let report = engine.scan_once().await;

    match &report.outcomes[0].1 {
        PoolOutcome::SkippedNoOpportunity { reason } => {
            assert!(reason.contains("Profit too low"), "got: {reason}");
        }
        other => panic!("expected skip, got {other}"),
    }
    assert!(venue.get_receipts().is_empty());

    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_cost_basis_blocks_cheap_sell() {
    let venue = standard_venue();
    // All inventory was acquired at 2.0; the sized sell nets only 1.5.
    venue.push_history(
        "p1",
        TradeRecord {
            timestamp: Utc::now(),
            side: TradeSide::Buy,
            amount: wei(2),
            price: wei(2),
        },
    );

    let (ledger, path) = temp_ledger("cost-basis");
    let engine = Engine::new(
        venue.clone(),
        standard_feed(),
        ledger,
        &make_config(vec![make_pool("p1", "PEPE")], 0.0),
        false,
    )
    .unwrap();

    let report = engine.scan_once().await;

    match &report.outcomes[0].1 {
        PoolOutcome::SkippedCostBasisViolation {
            sell_price,
            avg_cost,
        } => {
            assert_eq!(*sell_price, WEI_SCALE * U256::from(3u64) / U256::from(2u64));
            assert_eq!(*avg_cost, wei(2));
        }
        other => panic!("expected cost basis skip, got {other}"),
    }
    assert!(venue.get_receipts().is_empty());

    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_ledger_failure_still_reports_the_trade() {
    let venue = standard_venue();
    let ledger = ProfitLedger::new(Some("/nonexistent-dir/stratarb-scenario.json"));
    let engine = Engine::new(
        venue.clone(),
        standard_feed(),
        ledger,
        &make_config(vec![make_pool("p1", "PEPE")], 0.0),
        false,
    )
    .unwrap();

    let report = engine.scan_once().await;

    match &report.outcomes[0].1 {
        PoolOutcome::Executed {
            receipt,
            profit_recorded,
            ..
        } => {
            assert!(!receipt.dry_run);
            assert!(!profit_recorded);
        }
        other => panic!("expected execution, got {other}"),
    }
    // The swap itself went through; only the bookkeeping failed.
    assert_eq!(venue.get_receipts().len(), 1);
}

#[tokio::test]
async fn test_venue_outage_then_recovery() {
    let venue = standard_venue();
    let (ledger, path) = temp_ledger("recovery");
    let engine = Engine::new(
        venue.clone(),
        standard_feed(),
        ledger,
        &make_config(vec![make_pool("p1", "PEPE")], 0.0),
        false,
    )
    .unwrap();

    venue.set_error("maintenance window");
    let first = engine.scan_once().await;
    match &first.outcomes[0].1 {
        PoolOutcome::SkippedExternalError { stage, message } => {
            assert_eq!(stage, "pool state");
            assert!(message.contains("maintenance window"), "got: {message}");
        }
        other => panic!("expected external error, got {other}"),
    }

    venue.clear_error();
    let second = engine.scan_once().await;
    assert_eq!(second.executed(), 1);
    assert_eq!(venue.get_receipts().len(), 1);

    std::fs::remove_file(&path).ok();
}
