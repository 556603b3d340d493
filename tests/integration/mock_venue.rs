//! Mock venue and price feed for integration testing.
//!
//! Provides a deterministic `TradingVenue` backed by in-memory pool state.
//! Submitted swaps apply real constant-product math, so multi-pass
//! scenarios observe reserve movement, balance changes, and slippage
//! enforcement without any node behind them.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use alloy_primitives::U256;
use stratarb::chain::TradingVenue;
use stratarb::market::PriceFeed;
use stratarb::math::{BPS_DENOM, WEI_SCALE};
use stratarb::types::*;

// ---------------------------------------------------------------------------
// Venue
// ---------------------------------------------------------------------------

/// In-memory state of one mock pool.
#[derive(Debug, Clone)]
pub struct PoolState {
    pub reserve_x: U256,
    pub reserve_y: U256,
    pub balance_x: U256,
    pub balance_y: U256,
    pub history: Vec<TradeRecord>,
}

/// A mock trading venue for deterministic testing.
///
/// All state is shared behind `Arc`, so a clone handed to the engine and
/// a clone kept by the test observe the same pools and receipts.
#[derive(Clone)]
pub struct MockVenue {
    name: String,
    fee_bps: u32,
    pools: Arc<Mutex<HashMap<String, PoolState>>>,
    gas: Arc<Mutex<GasBalances>>,
    receipts: Arc<Mutex<Vec<TradeReceipt>>>,
    approved: Arc<Mutex<Vec<String>>>,
    /// If set, all operations will return this error.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockVenue {
    /// Create an empty venue whose pools charge `fee_bps` on input.
    pub fn new(fee_bps: u32) -> Self {
        Self {
            name: "mock".to_string(),
            fee_bps,
            pools: Arc::new(Mutex::new(HashMap::new())),
            gas: Arc::new(Mutex::new(GasBalances::default())),
            receipts: Arc::new(Mutex::new(Vec::new())),
            approved: Arc::new(Mutex::new(Vec::new())),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Register a pool with reserves and the account's token balances.
    pub fn add_pool(
        &self,
        address: &str,
        reserve_x: U256,
        reserve_y: U256,
        balance_x: U256,
        balance_y: U256,
    ) {
        self.pools.lock().unwrap().insert(
            address.to_string(),
            PoolState {
                reserve_x,
                reserve_y,
                balance_x,
                balance_y,
                history: Vec::new(),
            },
        );
    }

    /// Set the account's gas-paying balances.
    pub fn set_gas(&self, usdst: U256, voucher: U256) {
        *self.gas.lock().unwrap() = GasBalances { usdst, voucher };
    }

    /// Append a fill to a pool's reported trade history.
    pub fn push_history(&self, address: &str, record: TradeRecord) {
        if let Some(state) = self.pools.lock().unwrap().get_mut(address) {
            state.history.push(record);
        }
    }

    /// Force all subsequent operations to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Clear any forced error.
    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    /// All receipts for swaps that actually reached the venue.
    pub fn get_receipts(&self) -> Vec<TradeReceipt> {
        self.receipts.lock().unwrap().clone()
    }

    /// Pools that received an allowance setup call.
    pub fn approved_pools(&self) -> Vec<String> {
        self.approved.lock().unwrap().clone()
    }

    /// Current reserves of a pool, after any executed swaps.
    pub fn reserves_of(&self, address: &str) -> Option<(U256, U256)> {
        self.pools
            .lock()
            .unwrap()
            .get(address)
            .map(|state| (state.reserve_x, state.reserve_y))
    }

    /// Current account balances for a pool's token pair.
    pub fn balances_of(&self, address: &str) -> Option<AccountBalances> {
        self.pools.lock().unwrap().get(address).map(|state| AccountBalances {
            x: state.balance_x,
            y: state.balance_y,
        })
    }

    fn check_error(&self) -> Result<()> {
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }
        Ok(())
    }
}

/// Constant-product output for a fee-on-input swap, floor-truncated the
/// same way the pool contract truncates.
fn swap_output(amount_in: U256, reserve_in: U256, reserve_out: U256, fee_bps: u32) -> U256 {
    let keep = BPS_DENOM - U256::from(fee_bps as u64);
    let in_with_fee = amount_in * keep;
    let denominator = reserve_in * BPS_DENOM + in_with_fee;
    if denominator.is_zero() {
        return U256::ZERO;
    }
    in_with_fee * reserve_out / denominator
}

#[async_trait]
impl TradingVenue for MockVenue {
    async fn pool_reserves(&self, pool: &str) -> Result<(U256, U256)> {
        self.check_error()?;
        self.reserves_of(pool)
            .ok_or_else(|| anyhow!("Unknown pool: {pool}"))
    }

    async fn token_balances(&self, pool: &str) -> Result<AccountBalances> {
        self.check_error()?;
        self.balances_of(pool)
            .ok_or_else(|| anyhow!("Unknown pool: {pool}"))
    }

    async fn gas_balances(&self) -> Result<GasBalances> {
        self.check_error()?;
        Ok(*self.gas.lock().unwrap())
    }

    async fn trade_history(&self, pool: &str) -> Result<Vec<TradeRecord>> {
        self.check_error()?;
        self.pools
            .lock()
            .unwrap()
            .get(pool)
            .map(|state| state.history.clone())
            .ok_or_else(|| anyhow!("Unknown pool: {pool}"))
    }

    async fn submit_trade(&self, pool: &str, order: &SwapOrder) -> Result<TradeReceipt> {
        self.check_error()?;
        if order.deadline < Utc::now().timestamp() {
            return Err(anyhow!("Deadline passed for pool {pool}"));
        }

        let mut pools = self.pools.lock().unwrap();
        let state = pools
            .get_mut(pool)
            .ok_or_else(|| anyhow!("Unknown pool: {pool}"))?;

        match order.direction {
            Direction::XtoY => {
                if state.balance_x < order.amount_in {
                    return Err(anyhow!("Insufficient base balance for pool {pool}"));
                }
                let out = swap_output(
                    order.amount_in,
                    state.reserve_x,
                    state.reserve_y,
                    self.fee_bps,
                );
                if out < order.min_amount_out {
                    return Err(anyhow!(
                        "Slippage limit hit: {out} < {}",
                        order.min_amount_out
                    ));
                }
                state.reserve_x += order.amount_in;
                state.reserve_y -= out;
                state.balance_x -= order.amount_in;
                state.balance_y += out;
            }
            Direction::YtoX => {
                if state.balance_y < order.amount_in {
                    return Err(anyhow!("Insufficient quote balance for pool {pool}"));
                }
                let out = swap_output(
                    order.amount_in,
                    state.reserve_y,
                    state.reserve_x,
                    self.fee_bps,
                );
                if out < order.min_amount_out {
                    return Err(anyhow!(
                        "Slippage limit hit: {out} < {}",
                        order.min_amount_out
                    ));
                }
                state.reserve_y += order.amount_in;
                state.reserve_x -= out;
                state.balance_y -= order.amount_in;
                state.balance_x += out;
                // Buys land in the history the venue reports.
                let price = if out.is_zero() {
                    U256::ZERO
                } else {
                    order.amount_in * WEI_SCALE / out
                };
                state.history.push(TradeRecord {
                    timestamp: Utc::now(),
                    side: TradeSide::Buy,
                    amount: out,
                    price,
                });
            }
        }

        let receipt = TradeReceipt {
            tx_hash: format!("MOCK-{}", Uuid::new_v4()),
            pool: pool.to_string(),
            direction: order.direction,
            amount_in: order.amount_in,
            min_amount_out: order.min_amount_out,
            timestamp: Utc::now(),
            dry_run: false,
        };
        self.receipts.lock().unwrap().push(receipt.clone());

        Ok(receipt)
    }

    async fn ensure_allowances(&self, pool: &str) -> Result<()> {
        self.check_error()?;
        self.approved.lock().unwrap().push(pool.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Price feed
// ---------------------------------------------------------------------------

/// A mock USD price feed with per-symbol prices set by test code.
#[derive(Clone)]
pub struct MockFeed {
    prices: Arc<Mutex<HashMap<String, U256>>>,
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self {
            prices: Arc::new(Mutex::new(HashMap::new())),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Quote `symbol` at `price` USD (wei-scaled).
    pub fn set_price(&self, symbol: &str, price: U256) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    /// Drop a symbol's quote, so lookups report absence.
    pub fn remove_price(&self, symbol: &str) {
        self.prices.lock().unwrap().remove(symbol);
    }

    /// Force all subsequent lookups to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }
}

#[async_trait]
impl PriceFeed for MockFeed {
    async fn usd_price(&self, symbol: &str) -> Result<Option<U256>> {
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }
        Ok(self.prices.lock().unwrap().get(symbol).copied())
    }

    fn name(&self) -> &str {
        "mock-feed"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn wei(n: u64) -> U256 {
        U256::from(n) * WEI_SCALE
    }

    fn sell_order(amount_in: U256, min_out: U256) -> SwapOrder {
        SwapOrder {
            direction: Direction::XtoY,
            amount_in,
            min_amount_out: min_out,
            deadline: Utc::now().timestamp() + 60,
        }
    }

    #[tokio::test]
    async fn test_swap_moves_reserves_and_balances() {
        let venue = MockVenue::new(0);
        venue.add_pool("p1", wei(4), wei(9), wei(10), wei(10));

        let receipt = venue
            .submit_trade("p1", &sell_order(wei(2), wei(3)))
            .await
            .unwrap();
        assert!(receipt.tx_hash.starts_with("MOCK-"));

        // 2 in against 4/9 at zero fee nets exactly 3 out.
        assert_eq!(venue.reserves_of("p1"), Some((wei(6), wei(6))));
        let balances = venue.balances_of("p1").unwrap();
        assert_eq!(balances.x, wei(8));
        assert_eq!(balances.y, wei(13));
        assert_eq!(venue.get_receipts().len(), 1);
    }

    #[tokio::test]
    async fn test_slippage_floor_enforced() {
        let venue = MockVenue::new(0);
        venue.add_pool("p1", wei(4), wei(9), wei(10), wei(10));

        // The swap would net 3, so a floor of 4 must reject it untouched.
        let result = venue.submit_trade("p1", &sell_order(wei(2), wei(4))).await;
        assert!(result.unwrap_err().to_string().contains("Slippage"));
        assert_eq!(venue.reserves_of("p1"), Some((wei(4), wei(9))));
        assert!(venue.get_receipts().is_empty());
    }

    #[tokio::test]
    async fn test_buys_append_to_history() {
        let venue = MockVenue::new(0);
        venue.add_pool("p1", wei(4), wei(9), wei(10), wei(100));

        let order = SwapOrder {
            direction: Direction::YtoX,
            amount_in: wei(3),
            min_amount_out: wei(1),
            deadline: Utc::now().timestamp() + 60,
        };
        venue.submit_trade("p1", &order).await.unwrap();

        let history = venue.trade_history("p1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].side, TradeSide::Buy);
        // 3 quote in against 9/4 nets exactly 1 base, priced at 3.0.
        assert_eq!(history[0].amount, wei(1));
        assert_eq!(history[0].price, wei(3));
    }

    #[tokio::test]
    async fn test_unknown_pool_rejected() {
        let venue = MockVenue::new(0);
        let result = venue.pool_reserves("nope").await;
        assert!(result.unwrap_err().to_string().contains("Unknown pool"));
    }

    #[tokio::test]
    async fn test_forced_error_hits_every_operation() {
        let venue = MockVenue::new(0);
        venue.add_pool("p1", wei(4), wei(9), wei(10), wei(10));
        venue.set_error("simulated node outage");

        assert!(venue.pool_reserves("p1").await.is_err());
        assert!(venue.gas_balances().await.is_err());
        assert!(venue
            .submit_trade("p1", &sell_order(wei(1), U256::ZERO))
            .await
            .is_err());

        venue.clear_error();
        assert!(venue.pool_reserves("p1").await.is_ok());
    }

    #[tokio::test]
    async fn test_allowance_calls_recorded() {
        let venue = MockVenue::new(0);
        venue.add_pool("p1", wei(4), wei(9), wei(10), wei(10));
        venue.ensure_allowances("p1").await.unwrap();
        venue.ensure_allowances("p2").await.unwrap();
        assert_eq!(
            venue.approved_pools(),
            vec!["p1".to_string(), "p2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_feed_absence_vs_error() {
        let feed = MockFeed::new();
        feed.set_price("ETH", wei(3000));

        assert_eq!(feed.usd_price("ETH").await.unwrap(), Some(wei(3000)));
        assert_eq!(feed.usd_price("UNLISTED").await.unwrap(), None);

        feed.remove_price("ETH");
        assert_eq!(feed.usd_price("ETH").await.unwrap(), None);

        feed.set_error("rate limited");
        assert!(feed.usd_price("ETH").await.is_err());
    }
}
