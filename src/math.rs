//! Fixed-point arithmetic primitives shared by the sizing and pricing code.
//!
//! Every engine quantity is an integer scaled by 1e18 ("wei"). Floats never
//! enter trade math; they appear only in log formatting and when converting
//! human-unit config fields at load time.

use alloy_primitives::{I256, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// 1e18, the scale shared by token amounts and prices.
pub const WEI_SCALE: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Basis-point denominator (100% = 10_000 bps).
pub const BPS_DENOM: U256 = U256::from_limbs([10_000u64, 0, 0, 0]);

/// Unlimited token allowance.
pub const MAX_ALLOWANCE: U256 = U256::MAX;

/// Floor integer square root by Newton's method.
///
/// Never over-estimates: `isqrt(n) * isqrt(n) <= n` for all `n`.
pub fn isqrt(n: U256) -> U256 {
    if n <= U256::from(1u64) {
        return n;
    }
    let mut x = n;
    let mut y = (x + U256::from(1u64)) >> 1;
    while y < x {
        x = y;
        y = (x + n / x) >> 1;
    }
    x
}

/// Signed difference `a - b` of two unsigned wei amounts.
pub fn signed_sub(a: U256, b: U256) -> I256 {
    if a >= b {
        I256::from_raw(a - b)
    } else {
        -I256::from_raw(b - a)
    }
}

/// Approximate wei amount in token units. Log formatting only, never math.
///
/// Goes through the decimal string so magnitudes past u128 still format.
pub fn wei_to_f64(x: U256) -> f64 {
    x.to_string().parse::<f64>().unwrap_or(0.0) / 1e18
}

/// Signed variant of [`wei_to_f64`].
pub fn signed_wei_to_f64(x: I256) -> f64 {
    let magnitude = wei_to_f64(x.unsigned_abs());
    if x.is_negative() {
        -magnitude
    } else {
        magnitude
    }
}

/// Convert a decimal token amount (e.g. config `min_profit = 0.01`) to wei.
///
/// Exact decimal arithmetic, so `0.01` becomes precisely `10^16` rather
/// than the nearest f64. Truncates sub-wei fractions. Negative in, `None`.
pub fn decimal_to_wei(value: Decimal) -> Option<U256> {
    if value.is_sign_negative() {
        return None;
    }
    let scaled = value.checked_mul(Decimal::from(1_000_000_000_000_000_000u64))?;
    scaled.trunc().to_u128().map(U256::from)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
