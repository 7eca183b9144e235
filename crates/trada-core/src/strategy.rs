//! Buy/sell trading rules evaluated against archived prices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

use crate::error::{Error, Result};
use crate::ports::PriceLookup;
use crate::types::SymbolType;

/// Condition a strategy checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Never triggers. Building block for other strategies.
    Base,
    /// Never triggers.
    DoNothing,
    /// Triggers when the price is strictly above the threshold.
    PriceAbove { threshold: f64 },
    /// Triggers when the price is strictly below the threshold.
    PriceBelow { threshold: f64 },
}

impl StrategyKind {
    pub fn price_above(threshold: f64) -> Self {
        Self::PriceAbove { threshold }
    }

    pub fn price_below(threshold: f64) -> Self {
        Self::PriceBelow { threshold }
    }

    fn threshold(&self) -> Option<f64> {
        match self {
            StrategyKind::PriceAbove { threshold } | StrategyKind::PriceBelow { threshold } => {
                Some(*threshold)
            }
            StrategyKind::Base | StrategyKind::DoNothing => None,
        }
    }
}

/// A rule bound to one `(symbol, quote)` pair.
///
/// Running state and the trigger counter are interior-mutable so a strategy
/// can be shared between a portfolio and the simulation evaluating it.
#[derive(Debug)]
pub struct Strategy {
    id: String,
    symbol: SymbolType,
    quote: SymbolType,
    coin_percent: f64,
    kind: StrategyKind,
    running: AtomicBool,
    trigger_count: AtomicU64,
}

/// Serializable view of a strategy for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    pub id: String,
    pub description: String,
    pub symbol: SymbolType,
    pub quote: SymbolType,
    pub coin_percent: f64,
    pub is_running: bool,
    pub trigger_count: u64,
}

impl Strategy {
    /// Create a stopped strategy, rejecting invalid parameters.
    pub fn new(
        id: impl Into<String>,
        symbol: impl Into<SymbolType>,
        quote: impl Into<SymbolType>,
        coin_percent: f64,
        kind: StrategyKind,
    ) -> Result<Self> {
        let id = id.into();
        let symbol = symbol.into();
        let quote = quote.into();

        if id.is_empty() {
            return Err(invalid("ID must be provided"));
        }
        if symbol.is_empty() {
            return Err(invalid("Symbol must be provided"));
        }
        if quote.is_empty() {
            return Err(invalid("As coin must be provided"));
        }
        if coin_percent.is_nan() || coin_percent <= 0.0 {
            return Err(invalid("Coin percentage must be greater than 0"));
        }
        if coin_percent > 100.0 {
            return Err(invalid("Coin percentage cannot be greater than 100"));
        }
        if let Some(threshold) = kind.threshold() {
            if threshold.is_nan() || threshold <= 0.0 {
                return Err(invalid("Price threshold must be greater than 0"));
            }
        }

        Ok(Self {
            id,
            symbol,
            quote,
            coin_percent,
            kind,
            running: AtomicBool::new(false),
            trigger_count: AtomicU64::new(0),
        })
    }

    pub fn base(
        id: impl Into<String>,
        symbol: impl Into<SymbolType>,
        quote: impl Into<SymbolType>,
        coin_percent: f64,
    ) -> Result<Self> {
        Self::new(id, symbol, quote, coin_percent, StrategyKind::Base)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn symbol(&self) -> &SymbolType {
        &self.symbol
    }

    pub fn quote(&self) -> &SymbolType {
        &self.quote
    }

    pub fn coin_percent(&self) -> f64 {
        self.coin_percent
    }

    pub fn kind(&self) -> &StrategyKind {
        &self.kind
    }

    pub fn description(&self) -> String {
        match &self.kind {
            StrategyKind::Base => "Base strategy for building other strategies upon".to_string(),
            StrategyKind::DoNothing => "Strategy that never triggers".to_string(),
            StrategyKind::PriceAbove { threshold } => format!(
                "Triggers when {} price as {} is above {}",
                self.symbol, self.quote, threshold
            ),
            StrategyKind::PriceBelow { threshold } => format!(
                "Triggers when {} price as {} is below {}",
                self.symbol, self.quote, threshold
            ),
        }
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn trigger_count(&self) -> u64 {
        self.trigger_count.load(Ordering::SeqCst)
    }

    /// Check the condition at `at`.
    ///
    /// A stopped strategy reports `false` without touching prices. A hit
    /// increments the trigger counter; it never trades.
    pub fn condition_met(&self, prices: &dyn PriceLookup, at: DateTime<Utc>) -> Result<bool> {
        if !self.is_running() {
            return Ok(false);
        }

        let met = match &self.kind {
            StrategyKind::Base | StrategyKind::DoNothing => false,
            StrategyKind::PriceAbove { threshold } => self.price_at(prices, at)? > *threshold,
            StrategyKind::PriceBelow { threshold } => self.price_at(prices, at)? < *threshold,
        };

        if met {
            let count = self.trigger_count.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(strategy = %self.id, symbol = %self.symbol, %at, count, "Strategy condition met");
        }
        Ok(met)
    }

    fn price_at(&self, prices: &dyn PriceLookup, at: DateTime<Utc>) -> Result<f64> {
        prices
            .price_as(&self.symbol, &self.quote, at)
            .map(|price| price.value)
            .map_err(|e| Error::StrategyEvaluation {
                id: self.id.clone(),
                source: Box::new(e),
            })
    }

    pub fn summary(&self) -> StrategySummary {
        StrategySummary {
            id: self.id.clone(),
            description: self.description(),
            symbol: self.symbol.clone(),
            quote: self.quote.clone(),
            coin_percent: self.coin_percent,
            is_running: self.is_running(),
            trigger_count: self.trigger_count(),
        }
    }
}

fn invalid(reason: &str) -> Error {
    Error::InvalidStrategy {
        reason: reason.to_string(),
    }
}
