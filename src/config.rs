//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Human-readable amounts (USDST, minimum profit) are written as decimal
//! token units in the file and converted to wei on demand. Secrets never
//! live here. OAuth credentials and node URLs come from the environment.

use anyhow::{bail, Context, Result};
use alloy_primitives::U256;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;

use crate::math::decimal_to_wei;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub pools: Vec<PoolConfig>,
    pub trading: TradingConfig,
    pub oracle: OracleConfig,
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub gas: GasSettings,
}

/// One pool to scan. The external token name keys the oracle lookup.
#[derive(Debug, Deserialize, Clone)]
pub struct PoolConfig {
    pub address: String,
    pub external_token_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TradingConfig {
    /// Pool swap fee in basis points (30 = 0.3%).
    pub fee_bps: u32,
    /// Minimum profit per trade in quote token units.
    pub min_profit: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    pub timeout_secs: u64,
    #[serde(default = "default_cache_secs")]
    pub cache_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExecutionConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// Gas reserve settings in token units. Converted to wei via accessors.
#[derive(Debug, Deserialize, Clone)]
pub struct GasSettings {
    #[serde(default = "default_gas_reserve")]
    pub reserve: f64,
    #[serde(default = "default_voucher_threshold")]
    pub voucher_threshold: f64,
}

impl Default for GasSettings {
    fn default() -> Self {
        Self {
            reserve: default_gas_reserve(),
            voucher_threshold: default_voucher_threshold(),
        }
    }
}

fn default_cache_secs() -> u64 {
    60
}

fn default_interval_secs() -> u64 {
    10
}

fn default_gas_reserve() -> f64 {
    0.01
}

fn default_voucher_threshold() -> f64 {
    1.0
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.pools.is_empty() {
            bail!("Config must list at least one [[pools]] entry");
        }
        for pool in &self.pools {
            if pool.address.is_empty() {
                bail!("Pool address must not be empty");
            }
            if pool.external_token_name.is_empty() {
                bail!("Pool {} is missing external_token_name", pool.address);
            }
        }
        if self.trading.fee_bps >= 10_000 {
            bail!("fee_bps must be below 10000, got {}", self.trading.fee_bps);
        }
        if self.trading.min_profit < 0.0 {
            bail!("min_profit must not be negative");
        }
        if self.gas.reserve < 0.0 || self.gas.voucher_threshold < 0.0 {
            bail!("Gas reserve settings must not be negative");
        }
        Ok(())
    }

    /// Minimum profit threshold in wei.
    pub fn min_profit_wei(&self) -> Result<U256> {
        token_units_to_wei(self.trading.min_profit)
            .with_context(|| format!("Invalid min_profit: {}", self.trading.min_profit))
    }

    /// USDST gas reserve in wei.
    pub fn gas_reserve_wei(&self) -> Result<U256> {
        token_units_to_wei(self.gas.reserve)
            .with_context(|| format!("Invalid gas reserve: {}", self.gas.reserve))
    }

    /// Voucher threshold in wei.
    pub fn voucher_threshold_wei(&self) -> Result<U256> {
        token_units_to_wei(self.gas.voucher_threshold)
            .with_context(|| format!("Invalid voucher threshold: {}", self.gas.voucher_threshold))
    }
}

/// Convert a token-unit amount to wei exactly, without f64 multiplication.
fn token_units_to_wei(value: f64) -> Result<U256> {
    let decimal = Decimal::from_f64(value)
        .with_context(|| format!("Amount is not representable: {value}"))?;
    decimal_to_wei(decimal).with_context(|| format!("Amount does not fit in wei: {value}"))
}
