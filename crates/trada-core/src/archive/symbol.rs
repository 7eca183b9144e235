//! Per-asset price history.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::types::{DaySummary, Price, SymbolType};

/// Price observations for one base asset, grouped by quote currency and
/// kept sorted by observation time.
#[derive(Clone)]
pub struct Symbol {
    symbol_type: SymbolType,
    prices: HashMap<SymbolType, Vec<Price>>,
    day_summaries: HashMap<SymbolType, DaySummary>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Symbol")
            .field("symbol_type", &self.symbol_type)
            .field("quotes", &self.quote_types())
            .field("day_summaries", &self.day_summaries.len())
            .finish()
    }
}

impl Symbol {
    pub fn new(symbol_type: impl Into<SymbolType>, clock: Arc<dyn Clock>) -> Self {
        Self {
            symbol_type: symbol_type.into(),
            prices: HashMap::new(),
            day_summaries: HashMap::new(),
            clock,
        }
    }

    pub fn symbol_type(&self) -> &SymbolType {
        &self.symbol_type
    }

    /// Quote currencies this symbol has been priced in, sorted.
    pub fn quote_types(&self) -> Vec<SymbolType> {
        let mut quotes: Vec<_> = self.prices.keys().cloned().collect();
        quotes.sort();
        quotes
    }

    /// Number of stored observations for a quote currency.
    pub fn price_count(&self, quote: &SymbolType) -> usize {
        self.prices.get(quote).map(Vec::len).unwrap_or(0)
    }

    /// Store a validated observation, keeping the per-quote sequence sorted.
    ///
    /// Observations with an equal timestamp keep their arrival order.
    /// Identity prices are implied and never stored.
    pub fn add_price(&mut self, price: Price) -> Result<()> {
        price.validate()?;
        if price.base != self.symbol_type {
            return Err(Error::InvalidPrice {
                reason: format!(
                    "price for {} cannot be stored against symbol {}",
                    price.base, self.symbol_type
                ),
            });
        }
        if price.is_identity() {
            return Ok(());
        }

        let prices = self.prices.entry(price.quote.clone()).or_default();
        let idx = prices.partition_point(|p| p.at <= price.at);
        prices.insert(idx, price);
        Ok(())
    }

    /// Replace the day summary for the summary's quote currency.
    pub fn add_day_summary(&mut self, summary: DaySummary) {
        self.day_summaries.insert(summary.quote.clone(), summary);
    }

    pub fn day_summary_as(&self, quote: &SymbolType) -> Result<DaySummary> {
        self.day_summaries
            .get(quote)
            .cloned()
            .ok_or_else(|| Error::NoDaySummary {
                base: self.symbol_type.clone(),
                quote: quote.clone(),
            })
    }

    /// Most recent observation in `quote`.
    pub fn latest_price_as(&self, quote: &SymbolType) -> Result<Price> {
        if *quote == self.symbol_type {
            return Ok(Price::identity(&self.symbol_type, self.clock.now()));
        }

        self.history(quote)?
            .last()
            .cloned()
            .ok_or_else(|| self.no_price_data(quote))
    }

    /// Price in `quote` at `at`, linearly interpolated between the bracketing
    /// observations.
    ///
    /// Requests after the newest observation return the newest value and
    /// requests before the oldest return the oldest value. The returned
    /// price always carries the requested timestamp.
    pub fn price_as(&self, quote: &SymbolType, at: DateTime<Utc>) -> Result<Price> {
        if *quote == self.symbol_type {
            return Ok(Price::identity(&self.symbol_type, at));
        }

        let prices = self.history(quote)?;
        let idx = prices.partition_point(|p| p.at < at);

        let mut price = if idx == prices.len() {
            prices[idx - 1].clone()
        } else if prices[idx].at == at || idx == 0 {
            prices[idx].clone()
        } else {
            let before = &prices[idx - 1];
            let after = &prices[idx];
            let ratio = elapsed(before.at, at) / elapsed(before.at, after.at);

            let mut interpolated = before.clone();
            interpolated.value = before.value * (1.0 - ratio) + after.value * ratio;
            interpolated
        };

        price.at = at;
        Ok(price)
    }

    fn history(&self, quote: &SymbolType) -> Result<&[Price]> {
        match self.prices.get(quote) {
            Some(prices) if !prices.is_empty() => Ok(prices),
            _ => Err(self.no_price_data(quote)),
        }
    }

    fn no_price_data(&self, quote: &SymbolType) -> Error {
        Error::NoPriceData {
            base: self.symbol_type.clone(),
            quote: quote.clone(),
        }
    }
}

fn elapsed(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let span: Duration = to - from;
    span.num_microseconds()
        .map(|us| us as f64)
        .unwrap_or_else(|| span.num_milliseconds() as f64 * 1000.0)
}
