//! Core engine — the per-pool price → gate → execute cycle.
//!
//! Each pass walks every configured pool independently; one pool's failure
//! or rejection never blocks the others. Every gate decision surfaces as a
//! `PoolOutcome` in the pass report, so a pass is auditable after the fact.

pub mod executor;

use alloy_primitives::U256;
use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::chain::TradingVenue;
use crate::config::{AppConfig, PoolConfig};
use crate::ledger::ProfitLedger;
use crate::market::PriceFeed;
use crate::math::{wei_to_f64, WEI_SCALE};
use crate::strategy::basis::{self, BasisVerdict};
use crate::strategy::gas::{GasConfig, GasPolicy, GasVerdict};
use crate::strategy::{Decision, TradePlanner};
use crate::types::{ArbError, Direction, PoolOutcome, PoolSnapshot, ScanReport};
use executor::TradeExecutor;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Symbol every pool is quoted in. USDST doubles as the gas token.
pub const QUOTE_SYMBOL: &str = "USDST";

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Orchestrates one venue, one price feed, and the strategy gates across
/// all configured pools.
///
/// The engine is clock-free: callers decide when a pass runs. Everything
/// time-dependent inside a pass (deadlines, receipts) stamps itself.
pub struct Engine<V, F> {
    venue: V,
    feed: F,
    planner: TradePlanner,
    gas_policy: GasPolicy,
    executor: TradeExecutor,
    ledger: ProfitLedger,
    pools: Vec<PoolConfig>,
    fee_bps: u32,
}

impl<V: TradingVenue, F: PriceFeed> Engine<V, F> {
    pub fn new(
        venue: V,
        feed: F,
        ledger: ProfitLedger,
        config: &AppConfig,
        dry_run: bool,
    ) -> Result<Self> {
        let planner = TradePlanner::new(config.min_profit_wei()?);
        let gas_policy = GasPolicy::new(GasConfig {
            reserve: config.gas_reserve_wei()?,
            voucher_threshold: config.voucher_threshold_wei()?,
        });
        Ok(Self {
            venue,
            feed,
            planner,
            gas_policy,
            executor: TradeExecutor::new(dry_run),
            ledger,
            pools: config.pools.clone(),
            fee_bps: config.trading.fee_bps,
        })
    }

    /// Run one pass over every configured pool, in configured order.
    pub async fn scan_once(&self) -> ScanReport {
        info!(
            pools = self.pools.len(),
            dry_run = self.executor.is_dry_run(),
            "Starting scan pass"
        );
        let mut outcomes = Vec::with_capacity(self.pools.len());
        for pool in &self.pools {
            let outcome = self.scan_pool(pool).await;
            info!(
                pool = %pool.address,
                token = %pool.external_token_name,
                outcome = %outcome,
                "Pool scan complete"
            );
            outcomes.push((pool.address.clone(), outcome));
        }
        let report = ScanReport {
            timestamp: Utc::now(),
            outcomes,
        };
        info!(summary = %report, "Scan pass complete");
        report
    }

    /// Scan one pool end to end. Infallible: collaborator errors fold into
    /// `SkippedExternalError` with the stage that broke.
    async fn scan_pool(&self, pool: &PoolConfig) -> PoolOutcome {
        let snapshot = match self.venue.pool_reserves(&pool.address).await {
            Ok((reserve_x, reserve_y)) => PoolSnapshot {
                reserve_x,
                reserve_y,
                fee_bps: self.fee_bps,
            },
            Err(e) => return external_error("pool state", e),
        };

        let (oracle_price, quote_usd) =
            match self.reference_price(&pool.external_token_name).await {
                Ok(prices) => prices,
                Err(e) => return external_error("price feed", e),
            };

        let pool_price = snapshot.spot_price();
        info!(
            pool = %pool.address,
            token = %pool.external_token_name,
            pool_price = format!("{:.6}", wei_to_f64(pool_price)),
            oracle_price = format!("{:.6}", wei_to_f64(oracle_price)),
            gap = format!("{:+.2}%", price_gap_pct(pool_price, oracle_price)),
            "Pool priced against reference"
        );

        let balances = match self.venue.token_balances(&pool.address).await {
            Ok(balances) => balances,
            Err(e) => return external_error("balances", e),
        };
        let gas = match self.venue.gas_balances().await {
            Ok(gas) => gas,
            Err(e) => return external_error("balances", e),
        };
        let spendable = match self.gas_policy.adjust(balances, gas) {
            GasVerdict::Available(balances) => balances,
            GasVerdict::Unavailable { usdst, voucher } => {
                warn!(
                    pool = %pool.address,
                    usdst = format!("{:.6}", wei_to_f64(usdst)),
                    voucher = format!("{:.6}", wei_to_f64(voucher)),
                    "Cannot pay for gas, skipping pool"
                );
                return PoolOutcome::SkippedGasUnavailable;
            }
        };

        let proposal = match self.planner.plan(&snapshot, oracle_price, &spendable) {
            Decision::Trade(proposal) => proposal,
            Decision::NoOpportunity { reason } => {
                return PoolOutcome::SkippedNoOpportunity { reason }
            }
        };
        info!(pool = %pool.address, proposal = %proposal, "Opportunity found");

        // Sells of earned inventory must clear acquisition cost; buys have
        // no basis to protect.
        if proposal.direction == Direction::XtoY {
            let history = match self.venue.trade_history(&pool.address).await {
                Ok(history) => history,
                Err(e) => return external_error("trade history", e),
            };
            if let BasisVerdict::Rejected {
                sell_price,
                avg_cost,
            } = basis::approve_sell(&history, proposal.input_amount, proposal.expected_output)
            {
                warn!(
                    pool = %pool.address,
                    sell_price = format!("{:.6}", wei_to_f64(sell_price)),
                    avg_cost = format!("{:.6}", wei_to_f64(avg_cost)),
                    "Sell below acquisition cost, skipping pool"
                );
                return PoolOutcome::SkippedCostBasisViolation {
                    sell_price,
                    avg_cost,
                };
            }
        }

        let receipt = match self
            .executor
            .execute(&self.venue, &pool.address, &proposal)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => return external_error("swap submission", e),
        };

        let profit = proposal.expected_profit;
        let mut profit_recorded = true;
        if !receipt.dry_run {
            match self.ledger.record(profit.unsigned_abs(), quote_usd) {
                Ok(record) => info!(
                    pool = %pool.address,
                    cumulative_usd = format!("{:.2}", record.cumulative_profit_usd),
                    "Profit recorded"
                ),
                Err(e) => {
                    error!(
                        pool = %pool.address,
                        tx_hash = %receipt.tx_hash,
                        error = %e,
                        "Trade confirmed but ledger write failed"
                    );
                    profit_recorded = false;
                }
            }
        }

        PoolOutcome::Executed {
            receipt,
            profit,
            profit_recorded,
        }
    }

    /// Reference price of the base token in quote tokens, plus the quote
    /// token's own USD price for ledger conversion.
    ///
    /// Both legs come from the feed so a de-pegged quote token still prices
    /// correctly: the ratio moves with it.
    async fn reference_price(&self, symbol: &str) -> Result<(U256, U256)> {
        let base = self
            .feed
            .usd_price(symbol)
            .await?
            .ok_or_else(|| ArbError::PriceUnavailable(symbol.to_string()))?;
        let quote = self
            .feed
            .usd_price(QUOTE_SYMBOL)
            .await?
            .ok_or_else(|| ArbError::PriceUnavailable(QUOTE_SYMBOL.to_string()))?;
        if quote.is_zero() {
            return Err(ArbError::PriceUnavailable(QUOTE_SYMBOL.to_string()).into());
        }
        let oracle = base
            .checked_mul(WEI_SCALE)
            .map(|scaled| scaled / quote)
            .unwrap_or(U256::ZERO);
        Ok((oracle, quote))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Signed percentage the pool price sits above the reference. Zero when
/// the reference is zero.
fn price_gap_pct(pool_price: U256, oracle_price: U256) -> f64 {
    let reference = wei_to_f64(oracle_price);
    if reference == 0.0 {
        return 0.0;
    }
    (wei_to_f64(pool_price) - reference) / reference * 100.0
}

fn external_error(stage: &str, error: anyhow::Error) -> PoolOutcome {
    warn!(stage = %stage, error = %error, "Pool scan stage failed");
    PoolOutcome::SkippedExternalError {
        stage: stage.to_string(),
        message: error.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
