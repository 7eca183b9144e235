//! Collaborator contracts.
//!
//! Exchange clients, metrics writers and the price archive are all reached
//! through these traits so each can be swapped for a simulated or mocked
//! implementation.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::portfolio::Portfolio;
use crate::types::{CoinBalance, DaySummary, Price, SymbolType};

/// Source of current coin holdings.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn balances(&self) -> Result<Vec<CoinBalance>>;
}

/// Source of raw price ticks and day-level summaries.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PriceProvider: Send + Sync {
    /// Latest tick for every pair the provider knows about.
    async fn latest_prices(&self) -> Result<Vec<Price>>;

    /// One day summary per known pair.
    async fn day_summaries(&self) -> Result<Vec<DaySummary>>;
}

/// Destination for computed metrics.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetricsSink: Send + Sync {
    async fn save_price_metrics(&self, prices: &[Price]) -> Result<()>;

    async fn save_portfolio_metrics(&self, portfolio: &Portfolio) -> Result<()>;
}

/// Point-in-time price queries, resolved with triangulation where needed.
#[cfg_attr(test, mockall::automock)]
pub trait PriceLookup: Send + Sync {
    fn latest_price_as(&self, base: &SymbolType, quote: &SymbolType) -> Result<Price>;

    fn price_as(&self, base: &SymbolType, quote: &SymbolType, at: DateTime<Utc>) -> Result<Price>;

    fn day_summary_as(&self, base: &SymbolType, quote: &SymbolType) -> Result<DaySummary>;
}
