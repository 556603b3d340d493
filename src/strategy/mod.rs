//! Strategy engine — direction selection, trade sizing, and the policy
//! gates that guard execution.

pub mod basis;
pub mod gas;
pub mod sizer;

use alloy_primitives::{I256, U256};
use tracing::debug;

use crate::math::{signed_wei_to_f64, wei_to_f64};
use crate::types::{AccountBalances, Direction, PoolSnapshot, TradeProposal};
use sizer::DirectionQuote;

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Outcome of planning one pool scan.
///
/// Rejections are decisions, not errors; `reason` carries the numbers that
/// drove them so the operator can audit every pass.
#[derive(Debug, Clone)]
pub enum Decision {
    /// A trade cleared the direction comparison and the profit gate.
    Trade(TradeProposal),
    NoOpportunity { reason: String },
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Sizes both swap directions against the reference price and gates the
/// winner on the configured profit floor.
pub struct TradePlanner {
    /// Minimum acceptable expected profit, wei-scaled quote tokens.
    min_profit: U256,
}

impl TradePlanner {
    pub fn new(min_profit: U256) -> Self {
        Self { min_profit }
    }

    /// Plan a trade for one pool.
    ///
    /// Both directions are evaluated every pass and the strictly higher
    /// profit wins; a trade executes only when that profit is positive and
    /// at least `min_profit`. A zero-or-negative best is never executed,
    /// even when the other direction is worse still.
    pub fn plan(
        &self,
        snapshot: &PoolSnapshot,
        oracle_price: U256,
        balances: &AccountBalances,
    ) -> Decision {
        if snapshot.reserve_x.is_zero() || snapshot.reserve_y.is_zero() || oracle_price.is_zero()
        {
            return no_opportunity(format!(
                "Invalid inputs (reserve_x={}, reserve_y={}, oracle_price={})",
                snapshot.reserve_x, snapshot.reserve_y, oracle_price,
            ));
        }
        if snapshot.fee_bps >= 10_000 {
            return no_opportunity(format!("Invalid fee_bps ({})", snapshot.fee_bps));
        }
        if balances.x.is_zero() && balances.y.is_zero() {
            return no_opportunity(format!(
                "No balances (balance_x={}, balance_y={})",
                balances.x, balances.y,
            ));
        }

        let pool_price = snapshot.spot_price();
        if pool_price == oracle_price {
            return no_opportunity(
                "Pool price equals oracle price (no arbitrage opportunity)".to_string(),
            );
        }

        let sell = sizer::evaluate(Direction::XtoY, snapshot, oracle_price, balances.x);
        let buy = sizer::evaluate(Direction::YtoX, snapshot, oracle_price, balances.y);
        debug!(
            sell_profit = signed_wei_to_f64(sell.profit),
            buy_profit = signed_wei_to_f64(buy.profit),
            sell_in = wei_to_f64(sell.amount_in),
            buy_in = wei_to_f64(buy.amount_in),
            "Direction quotes"
        );

        let best = if buy.is_viable() && (!sell.is_viable() || buy.profit > sell.profit) {
            buy
        } else {
            sell
        };

        // The direction the price gap points at, used for rejection detail.
        let natural = if pool_price > oracle_price { sell } else { buy };
        let natural_balance = match natural.direction {
            Direction::XtoY => balances.x,
            Direction::YtoX => balances.y,
        };

        if !best.is_viable() {
            return no_opportunity(describe_unviable(&natural, natural_balance));
        }
        if best.profit <= I256::ZERO || best.profit < I256::from_raw(self.min_profit) {
            return no_opportunity(format!(
                "Profit too low for {} (profit={:.6}, min_profit={:.6})",
                natural.direction,
                signed_wei_to_f64(natural.profit),
                wei_to_f64(self.min_profit),
            ));
        }

        Decision::Trade(TradeProposal {
            direction: best.direction,
            input_amount: best.amount_in,
            expected_output: best.expected_out,
            expected_profit: best.profit,
        })
    }
}

fn no_opportunity(reason: String) -> Decision {
    debug!(reason = %reason, "No opportunity");
    Decision::NoOpportunity { reason }
}

/// Reason text for a direction that produced no executable trade.
fn describe_unviable(quote: &DirectionQuote, balance: U256) -> String {
    let (opt_name, bal_name) = match quote.direction {
        Direction::XtoY => ("dx_opt", "balance_x"),
        Direction::YtoX => ("dy_opt", "balance_y"),
    };
    let clamped = quote.optimal_in.min(balance);
    if quote.optimal_in.is_zero() || clamped.is_zero() {
        format!(
            "No input available for {} ({}={}, {}={})",
            quote.direction, opt_name, quote.optimal_in, bal_name, balance,
        )
    } else {
        format!(
            "No output for {} (input={}, output=0)",
            quote.direction, clamped,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
