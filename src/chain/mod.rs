//! On-chain venue integration.
//!
//! Defines the `TradingVenue` trait and provides the STRATO implementation:
//! - STRATO — Cirrus table reads for pool state and balances, plus the
//!   parallel transaction endpoint for swaps and approvals.

pub mod oauth;
pub mod strato;

use alloy_primitives::U256;
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::types::{AccountBalances, GasBalances, SwapOrder, TradeReceipt, TradeRecord};

/// Abstraction over the venue that holds pools and account balances.
///
/// Implementors provide pool state reads, balance lookups, trade history,
/// and swap submission. The engine only talks to this trait, so tests run
/// against an in-memory venue with no node behind it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TradingVenue: Send + Sync {
    /// Current pool reserves as (base, quote), both in wei.
    async fn pool_reserves(&self, pool: &str) -> Result<(U256, U256)>;

    /// Bot-account balances of the pool's two tokens.
    async fn token_balances(&self, pool: &str) -> Result<AccountBalances>;

    /// USDST and voucher balances backing transaction fees.
    async fn gas_balances(&self) -> Result<GasBalances>;

    /// Past acquisitions of the pool's base token, oldest first.
    async fn trade_history(&self, pool: &str) -> Result<Vec<TradeRecord>>;

    /// Submit a swap and wait for on-chain confirmation.
    async fn submit_trade(&self, pool: &str, order: &SwapOrder) -> Result<TradeReceipt>;

    /// Approve the pool to spend any of its tokens not yet at max allowance.
    async fn ensure_allowances(&self, pool: &str) -> Result<()>;

    /// Venue name for logging and identification.
    fn name(&self) -> &str;
}
