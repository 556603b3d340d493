//! Profit ledger.
//!
//! A single durable JSON record of cumulative realized profit, shared by
//! every pool and potentially by overlapping process instances. Each
//! update holds an exclusive advisory lock on the file for the whole
//! read-modify-write-persist sequence, so concurrent writers serialize
//! instead of losing updates.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use alloy_primitives::U256;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::math::{wei_to_f64, WEI_SCALE};

/// Default ledger file path.
const DEFAULT_LEDGER_FILE: &str = "profit.json";

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// On-disk ledger record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfitRecord {
    /// Cumulative realized profit in USD wei.
    #[serde(with = "wei_decimal")]
    pub cumulative_profit_wei: U256,
    /// Display value in whole USD, derived from the wei counter.
    pub cumulative_profit_usd: f64,
}

/// Wei counters persist as decimal strings; files written by earlier
/// tooling carry plain JSON integers, which also parse.
mod wei_decimal {
    use alloy_primitives::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        let text = match &raw {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            other => return Err(de::Error::custom(format!("invalid wei value: {other}"))),
        };
        U256::from_str_radix(&text, 10).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

pub struct ProfitLedger {
    path: String,
}

impl ProfitLedger {
    pub fn new(path: Option<&str>) -> Self {
        Self {
            path: path.unwrap_or(DEFAULT_LEDGER_FILE).to_string(),
        }
    }

    /// The ledger file path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Read the current record. An absent file is a fresh start; content
    /// that does not parse loads as zero with a warning, since it may mask
    /// lost history.
    pub fn load(&self) -> ProfitRecord {
        if !Path::new(&self.path).exists() {
            info!(path = %self.path, "No profit ledger found, starting from zero");
            return ProfitRecord::default();
        }
        match std::fs::read_to_string(&self.path) {
            Ok(text) => parse_record(&text, &self.path),
            Err(err) => {
                warn!(
                    path = %self.path,
                    error = %err,
                    "Failed to read profit ledger, treating as zero"
                );
                ProfitRecord::default()
            }
        }
    }

    /// Add `profit_wei` quote tokens, valued at `quote_usd_price` USD per
    /// token, to the cumulative counters and persist.
    ///
    /// The whole read-modify-write runs under an exclusive advisory lock
    /// on the ledger file, so overlapping processes serialize here rather
    /// than lose updates. Every failure propagates: the trade is already
    /// on-chain, and silently dropping the update would lose the
    /// operator's profit history.
    pub fn record(&self, profit_wei: U256, quote_usd_price: U256) -> Result<ProfitRecord> {
        let usd_wei = profit_wei
            .checked_mul(quote_usd_price)
            .map(|scaled| scaled / WEI_SCALE)
            .context("Profit USD conversion overflowed")?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)
            .context(format!("Failed to open profit ledger {}", self.path))?;

        lock_exclusive(&file).context("Failed to lock profit ledger")?;

        let mut text = String::new();
        file.read_to_string(&mut text)
            .context("Failed to read profit ledger")?;
        let mut record = if text.trim().is_empty() {
            ProfitRecord::default()
        } else {
            parse_record(&text, &self.path)
        };

        record.cumulative_profit_wei = record
            .cumulative_profit_wei
            .checked_add(usd_wei)
            .context("Cumulative profit overflowed")?;
        record.cumulative_profit_usd = wei_to_f64(record.cumulative_profit_wei);

        let json =
            serde_json::to_string_pretty(&record).context("Failed to serialise profit ledger")?;
        file.seek(SeekFrom::Start(0))
            .context("Failed to rewind profit ledger")?;
        file.set_len(0)
            .context("Failed to truncate profit ledger")?;
        file.write_all(json.as_bytes())
            .context("Failed to write profit ledger")?;
        file.flush().context("Failed to flush profit ledger")?;
        file.sync_all().context("Failed to sync profit ledger")?;
        // The advisory lock releases when `file` drops.

        debug!(
            path = %self.path,
            added_usd = wei_to_f64(usd_wei),
            total_usd = record.cumulative_profit_usd,
            "Profit recorded"
        );
        Ok(record)
    }
}

fn parse_record(text: &str, path: &str) -> ProfitRecord {
    match serde_json::from_str(text) {
        Ok(record) => record,
        Err(err) => {
            warn!(path, error = %err, "Corrupt profit ledger, treating as first run");
            ProfitRecord::default()
        }
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &std::fs::File) -> Result<()> {
    use std::os::unix::io::AsRawFd;
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error()).context("flock failed")
    }
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &std::fs::File) -> Result<()> {
    // Advisory locking is unix-only; elsewhere the single-process
    // discipline stands alone.
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
