//! Price archive.
//!
//! Registry of [`Symbol`] histories that answers "what was A worth in B at
//! time T", triangulating through a bridge currency when no direct quote was
//! ever observed.

mod snapshot;
mod symbol;

pub use snapshot::{read_snapshot, snapshot_file_name, write_snapshot};
pub use symbol::Symbol;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::ports::{MetricsSink, PriceLookup, PriceProvider};
use crate::types::{DaySummary, Price, SymbolType, BTC};

/// Point-in-time view of archive activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveStatus {
    pub last_updated: Option<DateTime<Utc>>,
    pub update_count: u64,
    pub total_symbols: usize,
}

#[derive(Default)]
struct ArchiveState {
    symbols: HashMap<SymbolType, Symbol>,
    update_count: u64,
    last_updated: Option<DateTime<Utc>>,
}

/// Shared store of every observed price.
///
/// Lookups take the read lock; insertions and counter updates take the
/// write lock for the smallest consistent unit (one price, one summary, one
/// counter bump).
pub struct Archive {
    state: RwLock<ArchiveState>,
    bridge: SymbolType,
    clock: Arc<dyn Clock>,
    price_provider: Option<Arc<dyn PriceProvider>>,
    metrics_sink: Option<Arc<dyn MetricsSink>>,
    snapshot_dir: Option<PathBuf>,
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status();
        f.debug_struct("Archive")
            .field("bridge", &self.bridge)
            .field("status", &status)
            .field("snapshot_dir", &self.snapshot_dir)
            .finish()
    }
}

impl Archive {
    /// Create an empty archive bridging through BTC.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(ArchiveState::default()),
            bridge: SymbolType::from(BTC),
            clock,
            price_provider: None,
            metrics_sink: None,
            snapshot_dir: None,
        }
    }

    pub fn with_bridge(mut self, bridge: impl Into<SymbolType>) -> Self {
        self.bridge = bridge.into();
        self
    }

    pub fn with_price_provider(mut self, provider: Arc<dyn PriceProvider>) -> Self {
        self.price_provider = Some(provider);
        self
    }

    pub fn with_metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics_sink = Some(sink);
        self
    }

    /// Write every fetched price batch into `dir` as a snapshot file.
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    pub fn bridge(&self) -> &SymbolType {
        &self.bridge
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn read(&self) -> RwLockReadGuard<'_, ArchiveState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ArchiveState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot copy of a symbol's history.
    pub fn get_symbol(&self, symbol_type: &SymbolType) -> Result<Symbol> {
        self.read()
            .symbols
            .get(symbol_type)
            .cloned()
            .ok_or_else(|| Error::SymbolNotFound(symbol_type.clone()))
    }

    /// Register a symbol. Returns `false` and leaves the archive untouched
    /// when the type is already known.
    pub fn add_symbol(&self, symbol: Symbol) -> bool {
        let mut state = self.write();
        if state.symbols.contains_key(symbol.symbol_type()) {
            return false;
        }
        debug!(symbol = %symbol.symbol_type(), "Symbol added");
        state.symbols.insert(symbol.symbol_type().clone(), symbol);
        true
    }

    /// Every known base symbol with the quote currencies it has prices in.
    pub fn symbol_types(&self) -> BTreeMap<SymbolType, Vec<SymbolType>> {
        self.read()
            .symbols
            .iter()
            .map(|(symbol_type, symbol)| (symbol_type.clone(), symbol.quote_types()))
            .collect()
    }

    /// Validate and store one observation, creating its symbol on first sight.
    pub fn add_price(&self, price: Price) -> Result<()> {
        price.validate()?;

        let mut state = self.write();
        let clock = &self.clock;
        let symbol = state
            .symbols
            .entry(price.base.clone())
            .or_insert_with(|| {
                info!(symbol = %price.base, "New symbol added");
                Symbol::new(price.base.clone(), Arc::clone(clock))
            });
        symbol.add_price(price)
    }

    /// Replace the day summary for a pair the archive already holds prices
    /// for. Summaries never create symbols.
    pub fn add_day_summary(&self, summary: DaySummary) -> Result<()> {
        let mut state = self.write();
        let symbol = state
            .symbols
            .get_mut(&summary.base)
            .ok_or_else(|| Error::SymbolNotFound(summary.base.clone()))?;
        if symbol.price_count(&summary.quote) == 0 {
            return Err(Error::NoPriceData {
                base: summary.base.clone(),
                quote: summary.quote.clone(),
            });
        }
        symbol.add_day_summary(summary);
        Ok(())
    }

    pub fn latest_price_as(&self, base: &SymbolType, quote: &SymbolType) -> Result<Price> {
        self.resolve(base, quote, None)
    }

    pub fn price_as(
        &self,
        base: &SymbolType,
        quote: &SymbolType,
        at: DateTime<Utc>,
    ) -> Result<Price> {
        self.resolve(base, quote, Some(at))
    }

    /// Day summary for a directly observed pair.
    pub fn day_summary_as(&self, base: &SymbolType, quote: &SymbolType) -> Result<DaySummary> {
        self.read()
            .symbols
            .get(base)
            .ok_or_else(|| Error::SymbolNotFound(base.clone()))?
            .day_summary_as(quote)
    }

    /// Direct quote first, then `base -> bridge -> quote`. Never more than
    /// two hops.
    fn resolve(
        &self,
        base: &SymbolType,
        quote: &SymbolType,
        at: Option<DateTime<Utc>>,
    ) -> Result<Price> {
        if base == quote {
            return Ok(Price::identity(base, at.unwrap_or_else(|| self.clock.now())));
        }

        let state = self.read();
        if let Ok(price) = self.direct(&state, base, quote, at) {
            return Ok(price);
        }

        let no_route = |missing_base: &SymbolType, missing_quote: &SymbolType| Error::NoRoute {
            base: base.clone(),
            quote: quote.clone(),
            missing_base: missing_base.clone(),
            missing_quote: missing_quote.clone(),
        };

        let to_bridge = self
            .direct(&state, base, &self.bridge, at)
            .map_err(|_| no_route(base, &self.bridge))?;
        let from_bridge = self
            .direct(&state, &self.bridge, quote, at)
            .map_err(|_| no_route(&self.bridge, quote))?;

        Ok(Price {
            base: base.clone(),
            quote: quote.clone(),
            value: to_bridge.value * from_bridge.value,
            at: at.unwrap_or(from_bridge.at),
            source: to_bridge.source,
        })
    }

    fn direct(
        &self,
        state: &ArchiveState,
        base: &SymbolType,
        quote: &SymbolType,
        at: Option<DateTime<Utc>>,
    ) -> Result<Price> {
        if base == quote {
            return Ok(Price::identity(base, at.unwrap_or_else(|| self.clock.now())));
        }
        let symbol = state
            .symbols
            .get(base)
            .ok_or_else(|| Error::SymbolNotFound(base.clone()))?;
        match at {
            Some(at) => symbol.price_as(quote, at),
            None => symbol.latest_price_as(quote),
        }
    }

    pub fn status(&self) -> ArchiveStatus {
        let state = self.read();
        ArchiveStatus {
            last_updated: state.last_updated,
            update_count: state.update_count,
            total_symbols: state.symbols.len(),
        }
    }

    fn provider(&self) -> Result<&Arc<dyn PriceProvider>> {
        self.price_provider.as_ref().ok_or_else(|| Error::Config {
            message: "archive has no price provider".to_string(),
        })
    }

    /// Pull the latest ticks from the provider and store them.
    ///
    /// Invalid ticks are logged and skipped. The batch is forwarded to the
    /// metrics sink after it is stored; a sink failure is returned only after
    /// the update counters have moved, so stored prices are never rolled
    /// back. Returns the number of prices stored.
    pub async fn update_prices(&self) -> Result<usize> {
        let prices = self
            .provider()?
            .latest_prices()
            .await
            .map_err(|e| Error::provider("failed to get latest prices", e))?;

        let mut stored = Vec::with_capacity(prices.len());
        for price in prices {
            match self.add_price(price.clone()) {
                Ok(()) => stored.push(price),
                Err(e) => warn!(error = %e, base = %price.base, quote = %price.quote, "Skipping invalid price"),
            }
        }

        if let Some(dir) = &self.snapshot_dir {
            if let Err(e) = write_snapshot(dir, &stored) {
                warn!(error = %e, dir = %dir.display(), "Failed to write price snapshot");
            }
        }

        let sink_result = match &self.metrics_sink {
            Some(sink) => sink.save_price_metrics(&stored).await,
            None => Ok(()),
        };

        {
            let mut state = self.write();
            state.update_count += 1;
            state.last_updated = Some(self.clock.now());
        }

        debug!(count = stored.len(), "Prices updated");
        sink_result?;
        Ok(stored.len())
    }

    /// Pull one day summary per pair from the provider, replacing any
    /// previous summary. Entries for pairs with no stored prices are logged
    /// and skipped.
    pub async fn update_day_summaries(&self) -> Result<usize> {
        let summaries = self
            .provider()?
            .day_summaries()
            .await
            .map_err(|e| Error::provider("failed to get day summaries", e))?;

        let mut stored = 0;
        for summary in summaries {
            let (base, quote) = (summary.base.clone(), summary.quote.clone());
            match self.add_day_summary(summary) {
                Ok(()) => stored += 1,
                Err(e) => warn!(error = %e, %base, %quote, "Skipping day summary for unknown pair"),
            }
        }

        info!(count = stored, "Day summaries updated");
        Ok(stored)
    }
}

impl PriceLookup for Archive {
    fn latest_price_as(&self, base: &SymbolType, quote: &SymbolType) -> Result<Price> {
        Archive::latest_price_as(self, base, quote)
    }

    fn price_as(&self, base: &SymbolType, quote: &SymbolType, at: DateTime<Utc>) -> Result<Price> {
        Archive::price_as(self, base, quote, at)
    }

    fn day_summary_as(&self, base: &SymbolType, quote: &SymbolType) -> Result<DaySummary> {
        Archive::day_summary_as(self, base, quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ports::{MockMetricsSink, MockPriceProvider};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 5, 5, 0, 0, 0).unwrap()
    }

    fn sym(s: &str) -> SymbolType {
        SymbolType::from(s)
    }

    fn seeded() -> Archive {
        let archive = Archive::new(Arc::new(ManualClock::new(t0())));
        archive.add_price(Price::new("LTC", "BTC", 0.1, t0(), "binance")).unwrap();
        archive.add_price(Price::new("BTC", "ETH", 20.0, t0(), "binance")).unwrap();
        archive
            .add_price(Price::new("BTC", "USDT", 20000.0, t0() + Duration::minutes(1), "binance"))
            .unwrap();
        archive
    }

    #[test]
    fn test_add_symbol_reports_new() {
        let archive = Archive::new(Arc::new(ManualClock::new(t0())));
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));

        assert!(archive.add_symbol(Symbol::new("BTC", Arc::clone(&clock))));
        assert!(!archive.add_symbol(Symbol::new("BTC", clock)));
        assert_eq!(archive.status().total_symbols, 1);
        assert!(archive.get_symbol(&sym("BTC")).is_ok());
        assert!(archive.get_symbol(&sym("ETH")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_direct_price_returned_unmodified() {
        let archive = seeded();
        let price = archive.latest_price_as(&sym("LTC"), &sym("BTC")).unwrap();
        assert_eq!(price, Price::new("LTC", "BTC", 0.1, t0(), "binance"));
    }

    #[test]
    fn test_triangulation_via_bridge() {
        let archive = seeded();

        let ltc_eth = archive.latest_price_as(&sym("LTC"), &sym("ETH")).unwrap();
        assert_eq!(ltc_eth.value, 0.1 * 20.0);
        assert_eq!(ltc_eth.source, "binance");

        let ltc_usdt = archive.latest_price_as(&sym("LTC"), &sym("USDT")).unwrap();
        assert_eq!(ltc_usdt.value, 0.1 * 20000.0);
        assert_eq!(ltc_usdt.at, t0() + Duration::minutes(1));

        let at = t0() + Duration::hours(5);
        let historic = archive.price_as(&sym("LTC"), &sym("USDT"), at).unwrap();
        assert_eq!(historic.value, 0.1 * 20000.0);
        assert_eq!(historic.at, at);
    }

    #[test]
    fn test_triangulation_names_missing_leg() {
        let archive = seeded();
        archive.add_price(Price::new("ETH", "USDT", 800.0, t0(), "binance")).unwrap();

        let err = archive.latest_price_as(&sym("ETH"), &sym("GBP")).unwrap_err();
        assert!(err.to_string().contains("no ETH/BTC prices"), "{}", err);

        let err = archive.price_as(&sym("LTC"), &sym("GBP"), t0()).unwrap_err();
        assert!(err.to_string().contains("no BTC/GBP prices"), "{}", err);
        assert!(matches!(err, Error::NoRoute { .. }));
    }

    #[test]
    fn test_identity_without_data() {
        let archive = Archive::new(Arc::new(ManualClock::new(t0())));
        let price = archive.price_as(&sym("XRP"), &sym("XRP"), t0()).unwrap();
        assert_eq!(price.value, 1.0);
        assert_eq!(archive.status().total_symbols, 0);
    }

    #[test]
    fn test_symbol_types() {
        let archive = seeded();
        let types = archive.symbol_types();
        assert_eq!(types[&sym("BTC")], vec![sym("ETH"), sym("USDT")]);
        assert_eq!(types[&sym("LTC")], vec![sym("BTC")]);
    }

    #[tokio::test]
    async fn test_update_prices_creates_symbols() {
        let clock = Arc::new(ManualClock::new(t0()));
        let mut provider = MockPriceProvider::new();
        provider.expect_latest_prices().times(1).returning(|| {
            Ok(vec![
                Price::new("BTC", "USDT", 10000.0, t0(), "mock"),
                Price::new("ETH", "BTC", 0.08, t0(), "mock"),
                Price::new("ETH", "USDT", 800.0, t0(), "mock"),
                Price::new("LTC", "USDT", -1.0, t0(), "mock"),
            ])
        });
        let mut sink = MockMetricsSink::new();
        sink.expect_save_price_metrics().times(1).returning(|_| Ok(()));

        let archive = Archive::new(clock)
            .with_price_provider(Arc::new(provider))
            .with_metrics_sink(Arc::new(sink));
        assert_eq!(archive.status().update_count, 0);

        let stored = archive.update_prices().await.unwrap();
        assert_eq!(stored, 3);

        let status = archive.status();
        assert_eq!(status.update_count, 1);
        assert_eq!(status.total_symbols, 2);
        assert_eq!(status.last_updated, Some(t0()));
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_prices() {
        let mut provider = MockPriceProvider::new();
        provider
            .expect_latest_prices()
            .returning(|| Ok(vec![Price::new("BTC", "USDT", 10000.0, t0(), "mock")]));
        let mut sink = MockMetricsSink::new();
        sink.expect_save_price_metrics()
            .returning(|_| Err(Error::Metrics("database unavailable".to_string())));

        let archive = Archive::new(Arc::new(ManualClock::new(t0())))
            .with_price_provider(Arc::new(provider))
            .with_metrics_sink(Arc::new(sink));

        let err = archive.update_prices().await.unwrap_err();
        assert!(matches!(err, Error::Metrics(_)));
        assert_eq!(archive.status().update_count, 1);
        assert!(archive.latest_price_as(&sym("BTC"), &sym("USDT")).is_ok());
    }

    #[tokio::test]
    async fn test_provider_failure_is_wrapped() {
        let mut provider = MockPriceProvider::new();
        provider
            .expect_latest_prices()
            .returning(|| Err(Error::provider("binance", "timeout")));

        let archive =
            Archive::new(Arc::new(ManualClock::new(t0()))).with_price_provider(Arc::new(provider));

        let err = archive.update_prices().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Provider);
        assert!(err.to_string().contains("failed to get latest prices"));
        assert_eq!(archive.status().update_count, 0);
    }

    #[tokio::test]
    async fn test_update_day_summaries_skips_unknown_pairs() {
        let summary = |base: &str, quote: &str| DaySummary {
            base: base.into(),
            quote: quote.into(),
            open: 9000.0,
            close: 10000.0,
            weighted_avg: 9500.0,
            high: 10100.0,
            low: 8800.0,
            change_abs: 1000.0,
            change_pct: 11.1,
            at: t0(),
            source: "mock".to_string(),
        };
        let mut provider = MockPriceProvider::new();
        provider
            .expect_day_summaries()
            .returning(move || {
                Ok(vec![
                    summary("BTC", "USDT"),
                    summary("ETH", ""),
                    summary("BTC", "GBP"),
                    summary("XRP", "GBP"),
                ])
            });

        let archive =
            Archive::new(Arc::new(ManualClock::new(t0()))).with_price_provider(Arc::new(provider));
        archive.add_price(Price::new("BTC", "USDT", 9500.0, t0(), "mock")).unwrap();

        assert_eq!(archive.update_day_summaries().await.unwrap(), 1);
        assert_eq!(
            archive.day_summary_as(&sym("BTC"), &sym("USDT")).unwrap().close,
            10000.0
        );
        assert!(archive.day_summary_as(&sym("BTC"), &sym("GBP")).is_err());
        assert!(archive.day_summary_as(&sym("XRP"), &sym("GBP")).unwrap_err().is_not_found());

        assert_eq!(archive.status().total_symbols, 1);
        assert_eq!(
            archive.symbol_types().keys().map(|s| s.as_str()).collect::<Vec<_>>(),
            vec!["BTC"]
        );
    }
}
