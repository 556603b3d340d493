//! Constant-product trade sizing.
//!
//! Swap output and the closed-form optimal input for moving a pool's spot
//! price onto a reference price. All arithmetic is integer with floor
//! division; truncation favors the pool, so sized trades never over-state
//! their output. Overflow in any intermediate product degrades to "no
//! trade" rather than wrapping.

use alloy_primitives::{I256, U256};

use crate::math::{isqrt, signed_sub, BPS_DENOM, WEI_SCALE};
use crate::types::{Direction, PoolSnapshot};

/// A sized trade in one direction, profit measured in quote tokens.
#[derive(Debug, Clone, Copy)]
pub struct DirectionQuote {
    pub direction: Direction,
    /// Closed-form optimal input before the balance clamp.
    pub optimal_in: U256,
    /// Input actually affordable: `min(optimal_in, balance)`. Zero when the
    /// direction yields no trade.
    pub amount_in: U256,
    pub expected_out: U256,
    /// Profit at the reference price for the clamped input. May be negative.
    pub profit: I256,
}

impl DirectionQuote {
    fn empty(direction: Direction) -> Self {
        DirectionQuote {
            direction,
            optimal_in: U256::ZERO,
            amount_in: U256::ZERO,
            expected_out: U256::ZERO,
            profit: I256::ZERO,
        }
    }

    /// Whether this direction produced an executable (possibly
    /// unprofitable) trade.
    pub fn is_viable(&self) -> bool {
        !self.amount_in.is_zero()
    }
}

/// Swap output for `amount_in` against `(reserve_in, reserve_out)`, fee
/// charged on the input side.
///
/// Returns zero for degenerate inputs (zero amount, empty reserve, fee at
/// or above 100%) and on overflow.
pub fn amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256, fee_bps: u32) -> U256 {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return U256::ZERO;
    }
    if fee_bps >= 10_000 {
        return U256::ZERO;
    }
    let fee_factor = BPS_DENOM - U256::from(fee_bps);
    let effective_in = match amount_in.checked_mul(fee_factor) {
        Some(scaled) => scaled / BPS_DENOM,
        None => return U256::ZERO,
    };
    let numerator = match reserve_out.checked_mul(effective_in) {
        Some(n) => n,
        None => return U256::ZERO,
    };
    let denominator = match reserve_in.checked_add(effective_in) {
        Some(d) => d,
        None => return U256::ZERO,
    };
    numerator / denominator
}

/// Input that moves the pool's spot price of the input token down to
/// `target_price` (wei-scaled, output per input unit), grossed up for the
/// fee so the post-fee amount lands on target.
///
/// The post-trade reserve target is `isqrt(k * WEI / target_price)`; the
/// floor square root never over-shoots, so the sized trade never crosses
/// the reference price. Returns zero when the pool already sits at or past
/// the target on this side.
pub fn optimal_input(
    reserve_in: U256,
    reserve_out: U256,
    target_price: U256,
    fee_bps: u32,
) -> U256 {
    if reserve_in.is_zero() || reserve_out.is_zero() || target_price.is_zero() {
        return U256::ZERO;
    }
    if fee_bps >= 10_000 {
        return U256::ZERO;
    }
    let k = match reserve_in.checked_mul(reserve_out) {
        Some(k) => k,
        None => return U256::ZERO,
    };
    let scaled = match k.checked_mul(WEI_SCALE) {
        Some(s) => s,
        None => return U256::ZERO,
    };
    let target_reserve_in = isqrt(scaled / target_price);
    if target_reserve_in <= reserve_in {
        return U256::ZERO;
    }
    let shortfall = target_reserve_in - reserve_in;
    let fee_factor = BPS_DENOM - U256::from(fee_bps);
    match shortfall.checked_mul(BPS_DENOM) {
        Some(grossed) => grossed / fee_factor,
        None => U256::ZERO,
    }
}

/// Profit (in quote) of buying base: spend `amount_in` quote, value the
/// `amount_out` base received at `price`. `None` on overflow.
pub fn buy_profit(amount_in: U256, amount_out: U256, price: U256) -> Option<I256> {
    let value_out = amount_out.checked_mul(price)? / WEI_SCALE;
    Some(signed_sub(value_out, amount_in))
}

/// Profit (in quote) of selling base: value `amount_in` base at `price`,
/// compare with the `amount_out` quote received. `None` on overflow.
pub fn sell_profit(amount_in: U256, amount_out: U256, price: U256) -> Option<I256> {
    let value_in = amount_in.checked_mul(price)? / WEI_SCALE;
    Some(signed_sub(amount_out, value_in))
}

/// Size a trade in `direction` against `snapshot`, clamp it to `balance`,
/// and price the result at `oracle_price` (quote per base, wei-scaled).
///
/// Profit comes from the clamped input's actual pool output, never from the
/// unclamped closed form.
pub fn evaluate(
    direction: Direction,
    snapshot: &PoolSnapshot,
    oracle_price: U256,
    balance: U256,
) -> DirectionQuote {
    let mut quote = DirectionQuote::empty(direction);

    let (reserve_in, reserve_out, target_price) = match direction {
        Direction::XtoY => (snapshot.reserve_x, snapshot.reserve_y, oracle_price),
        Direction::YtoX => {
            // Target price of the quote token measured in base: WEI^2 / oracle.
            let squared = match WEI_SCALE.checked_mul(WEI_SCALE) {
                Some(s) => s,
                None => return quote,
            };
            if oracle_price.is_zero() {
                return quote;
            }
            (snapshot.reserve_y, snapshot.reserve_x, squared / oracle_price)
        }
    };

    quote.optimal_in = optimal_input(reserve_in, reserve_out, target_price, snapshot.fee_bps);
    if quote.optimal_in.is_zero() {
        return quote;
    }

    let amount_in = quote.optimal_in.min(balance);
    if amount_in.is_zero() {
        return quote;
    }

    let expected_out = amount_out(amount_in, reserve_in, reserve_out, snapshot.fee_bps);
    if expected_out.is_zero() {
        return quote;
    }

    let profit = match direction {
        Direction::XtoY => sell_profit(amount_in, expected_out, oracle_price),
        Direction::YtoX => buy_profit(amount_in, expected_out, oracle_price),
    };
    let profit = match profit {
        Some(p) => p,
        None => return quote,
    };

    quote.amount_in = amount_in;
    quote.expected_out = expected_out;
    quote.profit = profit;
    quote
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
