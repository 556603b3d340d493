//! External reference-price feeds.
//!
//! Defines the `PriceFeed` trait and provides the Alchemy implementation.

pub mod alchemy;

use alloy_primitives::U256;
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Abstraction over the external price source.
///
/// Prices are USD per whole token, wei-scaled. `Ok(None)` means the source
/// has no listing for the symbol; absence is a handled state, not an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Current USD price for a token symbol, wei-scaled.
    async fn usd_price(&self, symbol: &str) -> Result<Option<U256>>;

    /// Feed name for logging and identification.
    fn name(&self) -> &str;
}
