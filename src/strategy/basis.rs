//! Cost-basis guard.
//!
//! Refuses to sell the base token below its volume-weighted acquisition
//! cost. History arrives from the venue as time-ordered fills; only buys
//! enter the average. Recomputed per sell, never cached across scans.

use alloy_primitives::U256;
use tracing::debug;

use crate::math::{wei_to_f64, WEI_SCALE};
use crate::types::{TradeRecord, TradeSide};

/// Verdict on a proposed base-token sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasisVerdict {
    Approved,
    /// The sell would realize strictly less than the acquisition cost.
    Rejected { sell_price: U256, avg_cost: U256 },
}

/// Volume-weighted average acquisition cost over the buy fills in
/// `history`, wei-scaled quote per base. `None` when no base was ever
/// bought.
pub fn weighted_average_cost(history: &[TradeRecord]) -> Option<U256> {
    let mut total_cost = U256::ZERO;
    let mut total_amount = U256::ZERO;
    for record in history {
        if record.side != TradeSide::Buy || record.amount.is_zero() {
            continue;
        }
        let cost = record.amount.checked_mul(record.price)?;
        total_cost = total_cost.checked_add(cost)?;
        total_amount = total_amount.checked_add(record.amount)?;
    }
    if total_amount.is_zero() {
        return None;
    }
    Some(total_cost / total_amount)
}

/// Gate a sell of `input_amount` base for `expected_output` quote against
/// the account's buy history.
///
/// Rejects iff the effective sell price falls strictly below the weighted
/// average cost; selling exactly at cost passes. An account with no buy
/// history has nothing to protect and always passes.
pub fn approve_sell(
    history: &[TradeRecord],
    input_amount: U256,
    expected_output: U256,
) -> BasisVerdict {
    let avg_cost = match weighted_average_cost(history) {
        Some(cost) => cost,
        None => return BasisVerdict::Approved,
    };
    if input_amount.is_zero() {
        return BasisVerdict::Approved;
    }
    let sell_price = match expected_output.checked_mul(WEI_SCALE) {
        Some(scaled) => scaled / input_amount,
        None => U256::ZERO,
    };
    if sell_price < avg_cost {
        debug!(
            sell_price = wei_to_f64(sell_price),
            avg_cost = wei_to_f64(avg_cost),
            "Sell below cost basis"
        );
        return BasisVerdict::Rejected {
            sell_price,
            avg_cost,
        };
    }
    BasisVerdict::Approved
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
