//! Alchemy Prices API feed.
//!
//! API docs: https://docs.alchemy.com/reference/get-token-prices-by-symbol
//! Base URL: https://api.g.alchemy.com/prices/v1
//! Auth: API key in the URL path (`ALCHEMY_API_KEY`).
//!
//! Price values arrive as decimal strings and are scaled to wei through
//! `rust_decimal`, so "0.01" becomes exactly 10^16. A per-symbol cache
//! bounds request volume across back-to-back scan cycles.

use alloy_primitives::U256;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::PriceFeed;
use crate::math::decimal_to_wei;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://api.g.alchemy.com/prices/v1";
const FEED_NAME: &str = "alchemy";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    data: Vec<TokenPrices>,
}

#[derive(Debug, Deserialize)]
struct TokenPrices {
    #[serde(default)]
    prices: Vec<PriceEntry>,
    /// Set when the API knows the symbol but has no quote for it.
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceEntry {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

struct CachedPrice {
    price: U256,
    fetched_at: Instant,
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// Alchemy price feed with a TTL cache per symbol.
pub struct AlchemyPriceFeed {
    http: Client,
    api_key: String,
    cache_ttl: Duration,
    cache: Mutex<HashMap<String, CachedPrice>>,
}

impl AlchemyPriceFeed {
    /// Create a feed from the `ALCHEMY_API_KEY` environment variable.
    pub fn from_env(timeout_secs: u64, cache_secs: u64) -> Result<Self> {
        let api_key = std::env::var("ALCHEMY_API_KEY")
            .context("ALCHEMY_API_KEY environment variable not set")?;
        Self::new(api_key, timeout_secs, cache_secs)
    }

    /// Create a feed with an explicit key (for testing).
    pub fn new(api_key: String, timeout_secs: u64, cache_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("STRATARB/0.1.0 (amm-arbitrage-engine)")
            .build()
            .context("Failed to build HTTP client for Alchemy")?;

        Ok(Self {
            http,
            api_key,
            cache_ttl: Duration::from_secs(cache_secs),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Warm the cache for all configured symbols.
    ///
    /// Failures here are logged, not fatal: a symbol that cannot be priced
    /// at startup will simply skip its pool until the feed recovers.
    pub async fn prefetch(&self, symbols: &[String]) {
        for symbol in symbols {
            match self.usd_price(symbol).await {
                Ok(Some(price)) => {
                    debug!(symbol = %symbol, price = %price, "Price prefetched")
                }
                Ok(None) => warn!(symbol = %symbol, "No price listed for symbol"),
                Err(err) => warn!(symbol = %symbol, error = %err, "Price prefetch failed"),
            }
        }
    }

    // -- Internal helpers --------------------------------------------------

    fn cached(&self, symbol: &str) -> Option<U256> {
        let cache = self.cache.lock().unwrap();
        cache.get(symbol).and_then(|entry| {
            if entry.fetched_at.elapsed() < self.cache_ttl {
                Some(entry.price)
            } else {
                None
            }
        })
    }

    fn store(&self, symbol: &str, price: U256) {
        let mut cache = self.cache.lock().unwrap();
        cache.insert(
            symbol.to_string(),
            CachedPrice {
                price,
                fetched_at: Instant::now(),
            },
        );
    }

    async fn fetch_price(&self, symbol: &str) -> Result<Option<U256>> {
        let url = format!("{BASE_URL}/{}/tokens/by-symbol", self.api_key);

        let resp = self
            .http
            .get(&url)
            .query(&[("symbols", symbol)])
            .send()
            .await
            .with_context(|| format!("Alchemy price request failed for {symbol}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Alchemy price request failed {status}: {body}");
        }

        let parsed: PriceResponse = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse Alchemy price response for {symbol}"))?;

        Ok(extract_usd_price(&parsed))
    }
}

/// Pull the USD price out of a by-symbol response and scale it to wei.
fn extract_usd_price(resp: &PriceResponse) -> Option<U256> {
    let token = resp.data.first()?;
    if token.error.as_deref().is_some_and(|e| !e.is_empty()) {
        return None;
    }
    let entry = token
        .prices
        .iter()
        .find(|p| p.currency.as_deref().is_some_and(|c| c.eq_ignore_ascii_case("usd")))
        .or_else(|| token.prices.first())?;
    let value = entry.value.as_deref()?;
    let decimal = parse_decimal(value)?;
    decimal_to_wei(decimal)
}

/// Plain decimal strings first, scientific notation as a fallback.
fn parse_decimal(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .ok()
        .or_else(|| Decimal::from_scientific(value).ok())
}

// ---------------------------------------------------------------------------
// PriceFeed trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl PriceFeed for AlchemyPriceFeed {
    async fn usd_price(&self, symbol: &str) -> Result<Option<U256>> {
        if let Some(price) = self.cached(symbol) {
            return Ok(Some(price));
        }

        let price = self.fetch_price(symbol).await?;
        if let Some(price) = price {
            self.store(symbol, price);
            debug!(symbol = symbol, price = %price, "Price fetched");
        }
        Ok(price)
    }

    fn name(&self) -> &str {
        FEED_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
