//! STRATO venue integration.
//!
//! Pool state, balances, and trade history come from Cirrus, the node's
//! indexed table store (PostgREST query dialect). Swaps and approvals go
//! through the parallel transaction endpoint and are polled to completion
//! via the transaction results endpoint.
//!
//! Endpoints:
//! - `GET  /cirrus/search/{table}` — indexed contract state
//! - `POST /strato/v2.3/transaction/parallel?resolve=true` — submit calls
//! - `POST /bloc/v2.2/transactions/results` — confirmation polling

use alloy_primitives::U256;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::oauth::OAuthClient;
use super::TradingVenue;
use crate::math::{MAX_ALLOWANCE, WEI_SCALE};
use crate::types::{
    AccountBalances, ArbError, GasBalances, SwapOrder, TradeReceipt, TradeRecord, TradeSide,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const VENUE_NAME: &str = "strato";

/// USDST token contract address; the quote side of every pool.
const USDST_ADDRESS: &str = "937efa7e3a77e20bbdbd7c0d32b6514f368c1010";

/// Query and polling requests.
const HTTP_TIMEOUT_SECS: u64 = 10;
/// Transaction submission carries node-side resolution, so it runs longer.
const SUBMIT_TIMEOUT_SECS: u64 = 30;

const POLL_INTERVAL_SECS: u64 = 2;
const CONFIRM_TIMEOUT_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// API response types (Cirrus JSON → Rust)
// ---------------------------------------------------------------------------

/// One `BlockApps-Pool` row with nested token joins. Reserve columns arrive
/// as strings, integers, or floats depending on the node's cast behavior,
/// so they stay `serde_json::Value` until [`parse_uint`] normalizes them.
#[derive(Debug, Deserialize)]
struct PoolRow {
    #[serde(default)]
    address: Option<String>,
    #[serde(rename = "tokenABalance", default)]
    token_a_balance: Option<serde_json::Value>,
    #[serde(rename = "tokenBBalance", default)]
    token_b_balance: Option<serde_json::Value>,
    #[serde(rename = "tokenA", default)]
    token_a: Option<TokenRow>,
    #[serde(rename = "tokenB", default)]
    token_b: Option<TokenRow>,
}

/// Nested token record: metadata plus the bot account's balance and pool
/// allowance (both filtered server-side to a single row).
#[derive(Debug, Deserialize)]
struct TokenRow {
    #[serde(default)]
    address: Option<String>,
    #[serde(rename = "_symbol", default)]
    symbol: Option<String>,
    #[serde(default)]
    balances: Vec<ValueRow>,
    #[serde(default)]
    allowances: Vec<ValueRow>,
}

#[derive(Debug, Deserialize)]
struct ValueRow {
    #[serde(default)]
    value: Option<serde_json::Value>,
}

/// One `_balances` row re-labelled by the select alias.
#[derive(Debug, Deserialize)]
struct BalanceRow {
    #[serde(default)]
    balance: Option<serde_json::Value>,
}

/// One `BlockApps-Pool-Swap` row.
#[derive(Debug, Deserialize)]
struct SwapRow {
    #[serde(rename = "amountIn", default)]
    amount_in: Option<serde_json::Value>,
    #[serde(rename = "amountOut", default)]
    amount_out: Option<serde_json::Value>,
    #[serde(rename = "block_timestamp", default)]
    block_timestamp: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsed pool state
// ---------------------------------------------------------------------------

/// A pool document assembled from one Cirrus query: reserves, token
/// metadata, and the bot account's balances and allowances.
#[derive(Debug, Clone)]
pub struct PoolDocument {
    pub address: String,
    pub token_a: TokenState,
    pub token_b: TokenState,
    pub reserve_a: U256,
    pub reserve_b: U256,
}

#[derive(Debug, Clone)]
pub struct TokenState {
    pub address: String,
    pub symbol: String,
    /// Bot-account balance, wei.
    pub balance: U256,
    /// Allowance granted to the pool, wei.
    pub allowance: U256,
}

/// Outcome of one confirmation poll.
#[derive(Debug, PartialEq, Eq)]
enum TxStatus {
    Success,
    Failed(String),
    Pending,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Normalize a Cirrus numeric column to `U256`.
///
/// Columns cast with `::text` arrive as decimal strings; uncast columns can
/// arrive as JSON integers or floats. Unparseable values become zero, which
/// downstream validation treats as an empty pool or balance.
fn parse_uint(value: &serde_json::Value) -> U256 {
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            U256::from_str_radix(s, 10)
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| U256::from(f.max(0.0) as u128)))
                .unwrap_or(U256::ZERO)
        }
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                U256::from(u)
            } else if let Some(f) = n.as_f64() {
                U256::from(f.max(0.0) as u128)
            } else {
                U256::ZERO
            }
        }
        _ => U256::ZERO,
    }
}

fn opt_uint(value: Option<&serde_json::Value>) -> U256 {
    value.map(parse_uint).unwrap_or(U256::ZERO)
}

fn parse_token_row(row: Option<TokenRow>) -> Result<TokenState> {
    let row = row.context("token record absent")?;
    let address = row
        .address
        .filter(|a| !a.is_empty())
        .context("token address absent")?;
    Ok(TokenState {
        address,
        symbol: row.symbol.unwrap_or_default(),
        balance: opt_uint(row.balances.first().and_then(|b| b.value.as_ref())),
        allowance: opt_uint(row.allowances.first().and_then(|a| a.value.as_ref())),
    })
}

fn parse_pool_row(row: PoolRow, pool: &str) -> Result<PoolDocument> {
    let token_a = parse_token_row(row.token_a)
        .with_context(|| format!("Pool {pool} is missing tokenA metadata"))?;
    let token_b = parse_token_row(row.token_b)
        .with_context(|| format!("Pool {pool} is missing tokenB metadata"))?;
    Ok(PoolDocument {
        address: row.address.unwrap_or_else(|| pool.to_string()),
        reserve_a: opt_uint(row.token_a_balance.as_ref()),
        reserve_b: opt_uint(row.token_b_balance.as_ref()),
        token_a,
        token_b,
    })
}

/// Cirrus block timestamps arrive as RFC 3339 or as a bare
/// `YYYY-MM-DD HH:MM:SS`. Unparseable values collapse to the epoch rather
/// than failing the whole history query.
fn parse_block_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return DateTime::UNIX_EPOCH;
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return naive.and_utc();
    }
    DateTime::UNIX_EPOCH
}

/// Convert swap rows into buy records, oldest first.
///
/// Each row spent `amountIn` USDST for `amountOut` base tokens, so the
/// per-unit price is `amountIn · WEI_SCALE / amountOut`. Rows with zero
/// output carry no price information and are dropped.
fn parse_swap_rows(rows: Vec<SwapRow>) -> Vec<TradeRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let amount_out = opt_uint(row.amount_out.as_ref());
            if amount_out.is_zero() {
                return None;
            }
            let amount_in = opt_uint(row.amount_in.as_ref());
            let price = amount_in.checked_mul(WEI_SCALE)? / amount_out;
            Some(TradeRecord {
                timestamp: parse_block_timestamp(row.block_timestamp.as_deref()),
                side: TradeSide::Buy,
                amount: amount_out,
                price,
            })
        })
        .collect()
}

/// STRATO returns the submitted transaction in one of three shapes: a list
/// of objects, a single object, or a bare hash string.
fn extract_transaction_hash(data: &serde_json::Value) -> Result<String> {
    match data {
        serde_json::Value::Array(items) => {
            let first = items
                .first()
                .context("No transaction data returned from STRATO")?;
            match first {
                serde_json::Value::String(s) => Ok(s.clone()),
                _ => first
                    .get("hash")
                    .and_then(|h| h.as_str())
                    .map(str::to_string)
                    .context("No transaction hash returned from STRATO"),
            }
        }
        serde_json::Value::Object(map) => map
            .get("hash")
            .and_then(|h| h.as_str())
            .map(str::to_string)
            .context("No transaction hash returned from STRATO"),
        serde_json::Value::String(s) => Ok(s.clone()),
        _ => anyhow::bail!("No transaction hash returned from STRATO"),
    }
}

fn parse_tx_status(tx: &serde_json::Value) -> TxStatus {
    match tx.get("status").and_then(|s| s.as_str()) {
        Some("Success") => TxStatus::Success,
        Some("Failed") | Some("Failure") => {
            let message = tx
                .get("txResult")
                .and_then(|r| r.get("message"))
                .and_then(|m| m.as_str())
                .or_else(|| tx.get("error").and_then(|e| e.as_str()))
                .unwrap_or("unknown error")
                .to_string();
            TxStatus::Failed(message)
        }
        _ => TxStatus::Pending,
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// STRATO venue client.
pub struct StratoClient {
    http: Client,
    oauth: OAuthClient,
    node_url: String,
    account: String,
}

impl StratoClient {
    /// Connect to the node named by `STRATO_NODE_URL`.
    ///
    /// Authenticates and resolves the bot account address up front; the
    /// address is immutable for a given credential set.
    pub async fn connect(oauth: OAuthClient) -> Result<Self> {
        let node_url = std::env::var("STRATO_NODE_URL")
            .context("STRATO_NODE_URL environment variable not set")?;
        let node_url = node_url.trim_end_matches('/').to_string();

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent("STRATARB/0.1.0 (amm-arbitrage-engine)")
            .build()
            .context("Failed to build HTTP client for STRATO")?;

        let account = oauth.fetch_account_address(&node_url).await?;
        info!(account = %account, node = %node_url, "Connected to STRATO node");

        Ok(Self {
            http,
            oauth,
            node_url,
            account,
        })
    }

    /// The bot account address.
    pub fn account(&self) -> &str {
        &self.account
    }

    // -- Cirrus queries ----------------------------------------------------

    async fn cirrus_search<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let access_token = self.oauth.access_token().await?;
        let url = format!("{}/cirrus/search/{table}", self.node_url);

        debug!(table = table, "Cirrus query");

        let resp = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {access_token}"))
            .query(params)
            .send()
            .await
            .with_context(|| format!("Cirrus {table} request failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Cirrus {table} query failed {status}: {body}");
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse Cirrus {table} response"))
    }

    /// Fetch the pool document with the bot account's nested balances and
    /// allowances in a single query. `!left` joins keep the token metadata
    /// even when the account holds nothing yet.
    pub async fn fetch_pool(&self, pool: &str) -> Result<PoolDocument> {
        let select = "address,tokenABalance,tokenBBalance,\
             tokenA:tokenA_fkey(address,_symbol,_name,\
             balances:BlockApps-Token-_balances!left(key,value::text),\
             allowances:BlockApps-Token-_allowances!left(key,key2,value::text)),\
             tokenB:tokenB_fkey(address,_symbol,_name,\
             balances:BlockApps-Token-_balances!left(key,value::text),\
             allowances:BlockApps-Token-_allowances!left(key,key2,value::text))";
        let params = [
            ("address", format!("eq.{pool}")),
            ("select", select.to_string()),
            ("tokenA.balances.key", format!("eq.{}", self.account)),
            ("tokenB.balances.key", format!("eq.{}", self.account)),
            ("tokenA.allowances.key", format!("eq.{}", self.account)),
            ("tokenA.allowances.key2", format!("eq.{pool}")),
            ("tokenB.allowances.key", format!("eq.{}", self.account)),
            ("tokenB.allowances.key2", format!("eq.{pool}")),
        ];

        let rows: Vec<PoolRow> = self.cirrus_search("BlockApps-Pool", &params).await?;
        let row = rows
            .into_iter()
            .next()
            .with_context(|| format!("No pool found at address {pool}"))?;
        parse_pool_row(row, pool)
    }

    // -- Transactions ------------------------------------------------------

    /// Submit a FUNCTION call through the parallel endpoint, returning its
    /// hash. Numeric arguments are passed as decimal strings; wei amounts
    /// exceed what JSON numbers can carry.
    async fn send_transaction(
        &self,
        contract_address: &str,
        method: &str,
        args: serde_json::Value,
    ) -> Result<String> {
        let access_token = self.oauth.access_token().await?;
        let envelope = serde_json::json!({
            "txs": [{
                "type": "FUNCTION",
                "payload": {
                    "contractAddress": contract_address,
                    "method": method,
                    "args": args,
                }
            }]
        });

        let url = format!(
            "{}/strato/v2.3/transaction/parallel?resolve=true",
            self.node_url
        );

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {access_token}"))
            .json(&envelope)
            .timeout(std::time::Duration::from_secs(SUBMIT_TIMEOUT_SECS))
            .send()
            .await
            .with_context(|| format!("STRATO {method} submission failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("STRATO {method} submission rejected {status}: {body}");
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .context("Failed to parse STRATO transaction response")?;
        let tx_hash = extract_transaction_hash(&data)?;

        info!(tx_hash = %tx_hash, method = method, "Transaction sent");
        Ok(tx_hash)
    }

    /// Poll until the transaction succeeds, fails, or the timeout lapses.
    /// Transient polling errors are logged and retried; an on-chain failure
    /// propagates immediately with the node's message.
    async fn wait_for_transaction(&self, tx_hash: &str) -> Result<()> {
        let started = std::time::Instant::now();
        let timeout = std::time::Duration::from_secs(CONFIRM_TIMEOUT_SECS);

        loop {
            if started.elapsed() >= timeout {
                return Err(ArbError::TransactionTimeout(tx_hash.to_string()).into());
            }

            match self.transaction_status(tx_hash).await {
                Ok(TxStatus::Success) => {
                    info!(tx_hash = %tx_hash, "Transaction confirmed");
                    return Ok(());
                }
                Ok(TxStatus::Failed(message)) => {
                    return Err(ArbError::TransactionFailed {
                        tx_hash: tx_hash.to_string(),
                        message,
                    }
                    .into());
                }
                Ok(TxStatus::Pending) => {}
                Err(err) => {
                    warn!(tx_hash = %tx_hash, error = %err, "Error checking transaction status");
                }
            }

            tokio::time::sleep(std::time::Duration::from_secs(POLL_INTERVAL_SECS)).await;
        }
    }

    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatus> {
        let access_token = self.oauth.access_token().await?;
        let url = format!("{}/bloc/v2.2/transactions/results", self.node_url);

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {access_token}"))
            .json(&serde_json::json!([tx_hash]))
            .send()
            .await
            .context("Transaction results request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Transaction results query failed {status}: {body}");
        }

        let data: Vec<serde_json::Value> = resp
            .json()
            .await
            .context("Failed to parse transaction results response")?;
        let tx = data
            .first()
            .context("No transaction data returned from STRATO")?;
        Ok(parse_tx_status(tx))
    }
}

// ---------------------------------------------------------------------------
// TradingVenue trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl TradingVenue for StratoClient {
    /// Pool reserves as (base, quote). Every fetch is fresh; reserves move
    /// under us between scans.
    async fn pool_reserves(&self, pool: &str) -> Result<(U256, U256)> {
        let doc = self.fetch_pool(pool).await?;
        Ok((doc.reserve_a, doc.reserve_b))
    }

    async fn token_balances(&self, pool: &str) -> Result<AccountBalances> {
        let doc = self.fetch_pool(pool).await?;
        Ok(AccountBalances {
            x: doc.token_a.balance,
            y: doc.token_b.balance,
        })
    }

    async fn gas_balances(&self) -> Result<GasBalances> {
        let usdst_params = [
            ("address", format!("eq.{USDST_ADDRESS}")),
            ("key", format!("eq.{}", self.account)),
            ("select", "balance:value::text".to_string()),
        ];
        let usdst_rows: Vec<BalanceRow> = self
            .cirrus_search("BlockApps-Token-_balances", &usdst_params)
            .await?;

        let voucher_params = [
            ("key", format!("eq.{}", self.account)),
            ("select", "balance:value::text".to_string()),
        ];
        let voucher_rows: Vec<BalanceRow> = self
            .cirrus_search("BlockApps-Voucher-_balances", &voucher_params)
            .await?;

        Ok(GasBalances {
            usdst: opt_uint(usdst_rows.first().and_then(|r| r.balance.as_ref())),
            voucher: opt_uint(voucher_rows.first().and_then(|r| r.balance.as_ref())),
        })
    }

    /// Past USDST-for-base swaps by this account on this pool, oldest
    /// first. These are the acquisition records behind the cost basis.
    async fn trade_history(&self, pool: &str) -> Result<Vec<TradeRecord>> {
        let doc = self.fetch_pool(pool).await?;
        let params = [
            ("address", format!("eq.{pool}")),
            ("sender", format!("eq.{}", self.account)),
            ("tokenIn", format!("eq.{USDST_ADDRESS}")),
            ("tokenOut", format!("eq.{}", doc.token_a.address)),
            (
                "select",
                "amountIn::text,amountOut::text,block_timestamp".to_string(),
            ),
            ("order", "block_timestamp.asc".to_string()),
        ];

        let rows: Vec<SwapRow> = self.cirrus_search("BlockApps-Pool-Swap", &params).await?;
        Ok(parse_swap_rows(rows))
    }

    async fn submit_trade(&self, pool: &str, order: &SwapOrder) -> Result<TradeReceipt> {
        let args = serde_json::json!({
            "isAToB": order.direction.is_a_to_b(),
            "amountIn": order.amount_in.to_string(),
            "minAmountOut": order.min_amount_out.to_string(),
            "deadline": order.deadline.to_string(),
        });

        let tx_hash = self.send_transaction(pool, "swap", args).await?;
        self.wait_for_transaction(&tx_hash).await?;

        Ok(TradeReceipt {
            tx_hash,
            pool: pool.to_string(),
            direction: order.direction,
            amount_in: order.amount_in,
            min_amount_out: order.min_amount_out,
            timestamp: Utc::now(),
            dry_run: false,
        })
    }

    /// Approve the pool for any of its tokens still below max allowance.
    /// Runs once per pool at startup so swaps never fail on allowance.
    async fn ensure_allowances(&self, pool: &str) -> Result<()> {
        let doc = self.fetch_pool(pool).await?;

        for token in [&doc.token_a, &doc.token_b] {
            if token.allowance >= MAX_ALLOWANCE {
                continue;
            }

            info!(token = %token.symbol, pool = %pool, "Approving token for pool...");

            let args = serde_json::json!({
                "spender": pool,
                "value": MAX_ALLOWANCE.to_string(),
            });
            let tx_hash = self.send_transaction(&token.address, "approve", args).await?;
            self.wait_for_transaction(&tx_hash)
                .await
                .with_context(|| format!("Approval failed for {}", token.symbol))?;

            info!(token = %token.symbol, "Token approved");
        }

        Ok(())
    }

    fn name(&self) -> &str {
        VENUE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
