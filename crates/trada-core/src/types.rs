//! Core types shared across the teletrada crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::error::{Error, Result};

pub const BTC: &str = "BTC";
pub const BNB: &str = "BNB";
pub const ETH: &str = "ETH";
pub const LTC: &str = "LTC";
pub const USDT: &str = "USDT";

/// Identifier of a tradeable asset, e.g. `BTC` or `USDT`.
///
/// Case is normalised by the caller; comparisons are exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolType(String);

impl SymbolType {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SymbolType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SymbolType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for SymbolType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for SymbolType {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SymbolType {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// One unit of `base` is worth `value` units of `quote`, observed at `at`.
///
/// The serialized field names match the on-disk snapshot format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    #[serde(rename = "Base")]
    pub base: SymbolType,
    #[serde(rename = "As")]
    pub quote: SymbolType,
    #[serde(rename = "Price")]
    pub value: f64,
    #[serde(rename = "At")]
    pub at: DateTime<Utc>,
    #[serde(rename = "Exchange", default)]
    pub source: String,
}

impl Price {
    pub fn new(
        base: impl Into<SymbolType>,
        quote: impl Into<SymbolType>,
        value: f64,
        at: DateTime<Utc>,
        source: &str,
    ) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
            value,
            at,
            source: source.to_string(),
        }
    }

    /// Price of a symbol in itself, always 1.0.
    pub fn identity(symbol: &SymbolType, at: DateTime<Utc>) -> Self {
        Self {
            base: symbol.clone(),
            quote: symbol.clone(),
            value: 1.0,
            at,
            source: String::new(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.base == self.quote
    }

    pub fn validate(&self) -> Result<()> {
        if self.base.is_empty() {
            return Err(invalid("Base symbol cannot be blank"));
        }
        if self.quote.is_empty() {
            return Err(invalid("As symbol cannot be blank"));
        }
        if !self.value.is_finite() || self.value <= 0.0 {
            return Err(invalid(format!(
                "Price must be greater than zero, got {}",
                self.value
            )));
        }
        if self.at == DateTime::<Utc>::UNIX_EPOCH {
            return Err(invalid("At cannot be zero"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidPrice {
        reason: reason.into(),
    }
}

/// Latest known day-level OHLC statistics for a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub base: SymbolType,
    pub quote: SymbolType,
    pub open: f64,
    pub close: f64,
    pub weighted_avg: f64,
    pub high: f64,
    pub low: f64,
    pub change_abs: f64,
    pub change_pct: f64,
    pub at: DateTime<Utc>,
    pub source: String,
}

/// Raw holding of one asset as reported by a balance provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoinBalance {
    pub symbol: SymbolType,
    pub exchange: String,
    pub free: f64,
    pub locked: f64,
}

impl CoinBalance {
    pub fn new(symbol: impl Into<SymbolType>, exchange: &str, free: f64, locked: f64) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: exchange.to_string(),
            free,
            locked,
        }
    }

    pub fn total(&self) -> f64 {
        self.free + self.locked
    }
}
