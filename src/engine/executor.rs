//! Trade executor.
//!
//! Turns an approved proposal into a swap order with slippage and deadline
//! protection, then submits it through the venue. In dry-run mode the order
//! is logged and receipted without touching the chain.

use alloy_primitives::U256;
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::chain::TradingVenue;
use crate::math::{signed_wei_to_f64, wei_to_f64, BPS_DENOM};
use crate::types::{SwapOrder, TradeProposal, TradeReceipt};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Slippage tolerance applied to the expected output, in basis points.
const SLIPPAGE_BPS: u64 = 400;

/// Seconds after submission at which the pool must revert the swap.
const DEADLINE_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// Order construction
// ---------------------------------------------------------------------------

/// Build the swap order for a proposal as of `now` (unix seconds).
///
/// The output floor keeps the trade profitable under reserve drift between
/// sizing and execution; the deadline bounds how long a queued transaction
/// stays eligible.
pub fn build_order(proposal: &TradeProposal, now: i64) -> SwapOrder {
    let keep = BPS_DENOM - U256::from(SLIPPAGE_BPS);
    let min_amount_out = proposal
        .expected_output
        .checked_mul(keep)
        .map(|scaled| scaled / BPS_DENOM)
        .unwrap_or(U256::ZERO);
    SwapOrder {
        direction: proposal.direction,
        amount_in: proposal.input_amount,
        min_amount_out,
        deadline: now + DEADLINE_SECS,
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct TradeExecutor {
    dry_run: bool,
}

impl TradeExecutor {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Execute one proposal against `pool`.
    ///
    /// In dry-run mode, logs the order and returns a synthetic receipt
    /// without submitting anything. Live mode submits and waits for
    /// confirmation through the venue.
    pub async fn execute<V: TradingVenue + ?Sized>(
        &self,
        venue: &V,
        pool: &str,
        proposal: &TradeProposal,
    ) -> Result<TradeReceipt> {
        let order = build_order(proposal, Utc::now().timestamp());

        if self.dry_run {
            info!(
                pool = %pool,
                direction = %order.direction,
                amount_in = format!("{:.6}", wei_to_f64(order.amount_in)),
                min_out = format!("{:.6}", wei_to_f64(order.min_amount_out)),
                expected_profit = format!("{:+.6}", signed_wei_to_f64(proposal.expected_profit)),
                "[DRY RUN] Would execute swap"
            );
            return Ok(TradeReceipt::dry_run(pool, &order));
        }

        info!(pool = %pool, order = %order, "Submitting swap");
        let receipt = venue
            .submit_trade(pool, &order)
            .await
            .with_context(|| format!("Swap submission failed for pool {pool}"))?;
        info!(pool = %pool, tx_hash = %receipt.tx_hash, "Swap confirmed");
        Ok(receipt)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
