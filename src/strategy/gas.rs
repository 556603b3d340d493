//! Gas reserve policy.
//!
//! STRATO charges transaction gas in USDST unless the account holds
//! prepaid vouchers, so the engine must never commit the quote tokens that
//! keep transactions payable. This policy shaves the reserve off the
//! spendable quote balance before sizing.

use alloy_primitives::U256;
use tracing::debug;

use crate::math::{wei_to_f64, WEI_SCALE};
use crate::types::{AccountBalances, GasBalances};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Gas reserve configuration, wei-scaled.
#[derive(Debug, Clone)]
pub struct GasConfig {
    /// Quote tokens held back for gas when no vouchers cover it.
    pub reserve: U256,
    /// Voucher balance at or above which the reserve is waived.
    pub voucher_threshold: U256,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            reserve: WEI_SCALE / U256::from(100u64), // 0.01 USDST
            voucher_threshold: WEI_SCALE,            // 1 voucher
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Result of applying the gas policy to a pool's balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasVerdict {
    /// Trading may proceed with the (possibly reduced) balances.
    Available(AccountBalances),
    /// Neither vouchers nor USDST can cover gas; the pool must be skipped.
    Unavailable { usdst: U256, voucher: U256 },
}

pub struct GasPolicy {
    config: GasConfig,
}

impl GasPolicy {
    pub fn new(config: GasConfig) -> Self {
        Self { config }
    }

    /// Access the gas configuration.
    pub fn config(&self) -> &GasConfig {
        &self.config
    }

    /// Decide whether gas is covered and what remains spendable.
    ///
    /// Vouchers at or above the threshold waive the reserve outright and
    /// the balances pass through untouched; voucher sufficiency is an
    /// independent override, not an additive discount. Otherwise the
    /// reserve comes out of the quote balance, clamped at zero. The base
    /// balance is never reduced. The caller's balances are a derived view;
    /// nothing on-chain changes here.
    pub fn adjust(&self, balances: AccountBalances, gas: GasBalances) -> GasVerdict {
        if gas.voucher >= self.config.voucher_threshold {
            debug!(
                voucher = wei_to_f64(gas.voucher),
                "Gas covered by vouchers, reserve waived"
            );
            return GasVerdict::Available(balances);
        }

        if gas.usdst >= self.config.reserve {
            let spendable_y = balances
                .y
                .checked_sub(self.config.reserve)
                .unwrap_or(U256::ZERO);
            debug!(
                reserve = wei_to_f64(self.config.reserve),
                spendable = wei_to_f64(spendable_y),
                "Gas reserve withheld from quote balance"
            );
            return GasVerdict::Available(AccountBalances {
                x: balances.x,
                y: spendable_y,
            });
        }

        GasVerdict::Unavailable {
            usdst: gas.usdst,
            voucher: gas.voucher,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
