//! Shared types for the STRATARB engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that venue, strategy, and engine
//! modules can depend on them without circular references.

use alloy_primitives::{I256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::math::{signed_wei_to_f64, wei_to_f64, WEI_SCALE};

// ---------------------------------------------------------------------------
// Pool state & balances
// ---------------------------------------------------------------------------

/// Point-in-time state of a constant-product pool.
///
/// X is the pool's base token (tokenA), Y the quote token (tokenB, USDST).
/// Reserves are wei-scaled integers straight from the chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub reserve_x: U256,
    pub reserve_y: U256,
    /// Swap fee charged on the input amount, in basis points.
    pub fee_bps: u32,
}

impl PoolSnapshot {
    /// Instantaneous pool price of X in Y, wei-scaled. Zero if X is empty.
    pub fn spot_price(&self) -> U256 {
        if self.reserve_x.is_zero() {
            return U256::ZERO;
        }
        self.reserve_y
            .checked_mul(WEI_SCALE)
            .map(|scaled| scaled / self.reserve_x)
            .unwrap_or(U256::ZERO)
    }
}

impl fmt::Display for PoolSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x={:.4} y={:.4} fee={}bps",
            wei_to_f64(self.reserve_x),
            wei_to_f64(self.reserve_y),
            self.fee_bps,
        )
    }
}

/// Trading balances for one pool's token pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalances {
    pub x: U256,
    pub y: U256,
}

impl fmt::Display for AccountBalances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x={:.6} y={:.6}", wei_to_f64(self.x), wei_to_f64(self.y))
    }
}

/// Balances of the assets that can pay for transaction gas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasBalances {
    pub usdst: U256,
    pub voucher: U256,
}

impl fmt::Display for GasBalances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "usdst={:.6} voucher={:.6}",
            wei_to_f64(self.usdst),
            wei_to_f64(self.voucher),
        )
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Swap direction through a pool.
///
/// `XtoY` sells the base token for quote; `YtoX` buys base with quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    XtoY,
    YtoX,
}

impl Direction {
    /// The opposite direction.
    pub fn opposite(&self) -> Self {
        match self {
            Direction::XtoY => Direction::YtoX,
            Direction::YtoX => Direction::XtoY,
        }
    }

    /// Whether this swap sends pool tokenA (the base side) in.
    pub fn is_a_to_b(&self) -> bool {
        matches!(self, Direction::XtoY)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::XtoY => write!(f, "X->Y"),
            Direction::YtoX => write!(f, "Y->X"),
        }
    }
}

/// Side of a historical fill, from the account's point of view on the
/// base token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// The opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            TradeSide::Buy => TradeSide::Sell,
            TradeSide::Sell => TradeSide::Buy,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trade types
// ---------------------------------------------------------------------------

/// One historical fill from the venue, used for cost-basis accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub side: TradeSide,
    /// Base-token amount, wei-scaled.
    pub amount: U256,
    /// Quote per base unit paid or received, wei-scaled.
    pub price: U256,
}

impl fmt::Display for TradeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} @ {:.6} [{}]",
            self.side,
            wei_to_f64(self.amount),
            wei_to_f64(self.price),
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
        )
    }
}

/// A fully sized trade ready for execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TradeProposal {
    pub direction: Direction,
    pub input_amount: U256,
    /// Output the pool math predicts for `input_amount`.
    pub expected_output: U256,
    /// Quote-token profit predicted for this trade. May be negative.
    pub expected_profit: I256,
}

impl TradeProposal {
    /// Effective quote-per-base price of the proposal. `None` for a zero
    /// input amount.
    pub fn effective_price(&self) -> Option<U256> {
        let (base, quote) = match self.direction {
            Direction::XtoY => (self.input_amount, self.expected_output),
            Direction::YtoX => (self.expected_output, self.input_amount),
        };
        if base.is_zero() {
            return None;
        }
        quote.checked_mul(WEI_SCALE).map(|scaled| scaled / base)
    }
}

impl fmt::Display for TradeProposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in={:.6} out={:.6} profit={:+.6}",
            self.direction,
            wei_to_f64(self.input_amount),
            wei_to_f64(self.expected_output),
            signed_wei_to_f64(self.expected_profit),
        )
    }
}

/// Swap call arguments as they go to the venue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwapOrder {
    pub direction: Direction,
    pub amount_in: U256,
    /// Slippage floor passed to the pool contract.
    pub min_amount_out: U256,
    /// Unix seconds after which the pool must revert the swap.
    pub deadline: i64,
}

impl fmt::Display for SwapOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in={:.6} min_out={:.6} deadline={}",
            self.direction,
            wei_to_f64(self.amount_in),
            wei_to_f64(self.min_amount_out),
            self.deadline,
        )
    }
}

/// Receipt returned after a swap is submitted (or simulated).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub tx_hash: String,
    pub pool: String,
    pub direction: Direction,
    pub amount_in: U256,
    pub min_amount_out: U256,
    pub timestamp: DateTime<Utc>,
    pub dry_run: bool,
}

impl TradeReceipt {
    /// Build a receipt for a simulated trade that never left the process.
    pub fn dry_run(pool: &str, order: &SwapOrder) -> Self {
        TradeReceipt {
            tx_hash: format!("dry-run-{}", uuid::Uuid::new_v4()),
            pool: pool.to_string(),
            direction: order.direction,
            amount_in: order.amount_in,
            min_amount_out: order.min_amount_out,
            timestamp: Utc::now(),
            dry_run: true,
        }
    }
}

impl fmt::Display for TradeReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} in={:.6} min_out={:.6} [{}]{}",
            self.pool,
            self.direction,
            wei_to_f64(self.amount_in),
            wei_to_f64(self.min_amount_out),
            self.tx_hash,
            if self.dry_run { " (dry run)" } else { "" },
        )
    }
}

// ---------------------------------------------------------------------------
// Scan outcomes
// ---------------------------------------------------------------------------

/// Outcome of scanning a single pool.
///
/// A scan cycle never aborts on a per-pool failure; every configured pool
/// reports exactly one of these per pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PoolOutcome {
    /// A trade was sized, passed every gate, and was submitted (or, in
    /// dry-run mode, simulated). `profit_recorded` is false when the trade
    /// confirmed but the ledger write failed.
    Executed {
        receipt: TradeReceipt,
        profit: I256,
        profit_recorded: bool,
    },
    SkippedNoOpportunity {
        reason: String,
    },
    SkippedGasUnavailable,
    SkippedCostBasisViolation {
        sell_price: U256,
        avg_cost: U256,
    },
    /// A collaborator call failed. `stage` names the call that broke.
    SkippedExternalError {
        stage: String,
        message: String,
    },
}

impl fmt::Display for PoolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolOutcome::Executed {
                receipt,
                profit,
                profit_recorded,
            } => write!(
                f,
                "executed {} profit={:+.6}{}",
                receipt.tx_hash,
                signed_wei_to_f64(*profit),
                if *profit_recorded {
                    ""
                } else {
                    " (ledger write failed)"
                },
            ),
            PoolOutcome::SkippedNoOpportunity { reason } => {
                write!(f, "no opportunity: {reason}")
            }
            PoolOutcome::SkippedGasUnavailable => write!(f, "gas unavailable"),
            PoolOutcome::SkippedCostBasisViolation {
                sell_price,
                avg_cost,
            } => write!(
                f,
                "cost basis violation (sell={:.6} avg={:.6})",
                wei_to_f64(*sell_price),
                wei_to_f64(*avg_cost),
            ),
            PoolOutcome::SkippedExternalError { stage, message } => {
                write!(f, "external error at {stage}: {message}")
            }
        }
    }
}

/// Summary of one pass over every configured pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub timestamp: DateTime<Utc>,
    /// Pool address paired with its outcome, in configured order.
    pub outcomes: Vec<(String, PoolOutcome)>,
}

impl ScanReport {
    /// Number of pools that executed a trade this pass.
    pub fn executed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, PoolOutcome::Executed { .. }))
            .count()
    }

    /// Number of pools skipped for any reason.
    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.executed()
    }

    /// Sum of expected profits across executed trades this pass.
    pub fn total_profit(&self) -> I256 {
        let mut total = I256::ZERO;
        for (_, outcome) in &self.outcomes {
            if let PoolOutcome::Executed { profit, .. } = outcome {
                total += *profit;
            }
        }
        total
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scanned={} executed={} skipped={} profit={:+.6}",
            self.outcomes.len(),
            self.executed(),
            self.skipped(),
            signed_wei_to_f64(self.total_profit()),
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for STRATARB.
#[derive(Debug, thiserror::Error)]
pub enum ArbError {
    #[error("Venue error ({venue}): {message}")]
    Venue { venue: String, message: String },

    #[error("Price feed error ({feed}): {message}")]
    PriceFeed { feed: String, message: String },

    #[error("No reference price for symbol: {0}")]
    PriceUnavailable(String),

    #[error("Transaction failed ({tx_hash}): {message}")]
    TransactionFailed { tx_hash: String, message: String },

    #[error("Timed out waiting for transaction {0}")]
    TransactionTimeout(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
