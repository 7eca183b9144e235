//! Teletrada server state and the read views exposed to remote clients.

use backtester::{SimulationContext, SimulationManager};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use trada_core::{
    Archive, ArchiveStatus, BalanceProvider, Clock, Config, LogMetricsSink, MetricsSink,
    Portfolio, PriceProvider, Result, SharedPortfolio, SimulatedExchange, Strategy, SymbolType,
};

use crate::status_log::{LogEntry, StatusLog};

pub const LIVE_PORTFOLIO: &str = "LIVE";

/// Server uptime and archive activity.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub server_started: DateTime<Utc>,
    pub archive: ArchiveStatus,
}

/// Day-level movement derived from the latest day summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayChange {
    pub opening: f64,
    pub closing: f64,
    pub highest: f64,
    pub lowest: f64,
    pub change_24h: f64,
    pub change_pct_24h: f64,
    /// Current price minus yesterday's close.
    pub change_today: f64,
    pub change_pct_today: f64,
}

/// Latest price of a pair, with day movement when a summary exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceView {
    pub base: SymbolType,
    pub quote: SymbolType,
    pub current: f64,
    pub at: DateTime<Utc>,
    pub source: String,
    pub day: Option<DayChange>,
}

/// Owns the archive, the live portfolio and every simulation.
pub struct TradaServer {
    config: Config,
    clock: Arc<dyn Clock>,
    archive: Arc<Archive>,
    balances: Arc<dyn BalanceProvider>,
    metrics: Arc<dyn MetricsSink>,
    live: SharedPortfolio,
    simulations: SimulationManager,
    status_log: StatusLog,
    started_at: DateTime<Utc>,
}

impl TradaServer {
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock>,
        balances: Arc<dyn BalanceProvider>,
        prices: Arc<dyn PriceProvider>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let mut archive = Archive::new(Arc::clone(&clock))
            .with_bridge(config.bridge_symbol.as_str())
            .with_price_provider(prices)
            .with_metrics_sink(Arc::clone(&metrics));
        if let Some(dir) = &config.snapshot_dir {
            archive = archive.with_snapshot_dir(dir.clone());
        }
        let archive = Arc::new(archive);

        let live = Portfolio::live(LIVE_PORTFOLIO).into_shared();
        let ctx = SimulationContext::new(Arc::clone(&archive), Arc::clone(&clock), Arc::clone(&live))
            .with_sample_frequency(config.sample_frequency());

        Self {
            status_log: StatusLog::new(config.status_log_capacity, Arc::clone(&clock)),
            started_at: clock.now(),
            simulations: SimulationManager::new(ctx),
            config,
            clock,
            archive,
            balances,
            metrics,
            live,
        }
    }

    /// Server backed by the simulated exchange and the logging metrics sink.
    pub fn simulated(config: Config, clock: Arc<dyn Clock>) -> Self {
        let exchange = Arc::new(SimulatedExchange::new(Arc::clone(&clock)));
        Self::new(
            config,
            clock,
            exchange.clone(),
            exchange,
            Arc::new(LogMetricsSink::new()),
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn archive(&self) -> &Arc<Archive> {
        &self.archive
    }

    pub fn live_portfolio(&self) -> &SharedPortfolio {
        &self.live
    }

    pub fn simulations(&self) -> &SimulationManager {
        &self.simulations
    }

    pub fn status_log(&self) -> &StatusLog {
        &self.status_log
    }

    /// Load the snapshot directory, fetch prices and build the live
    /// portfolio with default strategies.
    ///
    /// A failed snapshot load or balance refresh aborts start-up. Missing
    /// prices only leave the live portfolio unpriced until the next update.
    pub async fn init(&self) -> Result<()> {
        if let Some(dir) = &self.config.load_prices_dir {
            let loaded = self.archive.load_prices(dir)?;
            self.status_log
                .log(format!("Loaded {} prices from {}", loaded, dir.display()));
        }

        if let Err(e) = self.archive.update_prices().await {
            warn!(error = %e, "Initial price update failed");
            self.status_log.log(format!("ERROR: updating prices - {}", e));
        }

        self.status_log.log("Initialising portfolios");
        let default_quote = SymbolType::from(self.config.default_quote.as_str());
        let mut live = self.live.write().await;
        live.refresh_balances(self.balances.as_ref(), &default_quote, self.clock.now())
            .await?;

        let symbols: Vec<_> = live
            .balances()
            .values()
            .map(|b| (b.symbol.clone(), b.quote.clone()))
            .collect();
        for (symbol, quote) in symbols {
            let buy = Strategy::base("base-buy", symbol.clone(), quote.clone(), 100.0)?;
            let sell = Strategy::base("base-sell", symbol.clone(), quote, 100.0)?;
            live.set_buy_strategy(&symbol, Arc::new(buy))?;
            live.set_sell_strategy(&symbol, Arc::new(sell))?;
        }

        if let Err(e) = live.reprice(self.archive.as_ref()) {
            warn!(error = %e, "Failed to price live portfolio");
            self.status_log
                .log(format!("Failed to initialise portfolio: {}", e));
        }

        info!(balances = live.balances().len(), "Live portfolio initialised");
        self.status_log.log("Initialised portfolios");
        Ok(())
    }

    /// Refresh and reprice the live portfolio, then reprice every realtime
    /// simulation.
    pub async fn update_portfolios(&self) -> Result<()> {
        let default_quote = SymbolType::from(self.config.default_quote.as_str());
        {
            let mut live = self.live.write().await;
            live.refresh_balances(self.balances.as_ref(), &default_quote, self.clock.now())
                .await?;
            live.reprice(self.archive.as_ref())?;
        }

        for simulation in self.simulations.realtime_simulations() {
            simulation.reprice()?;
        }
        Ok(())
    }

    /// Send portfolio metrics for the live portfolio and every simulation.
    pub async fn save_metrics(&self) -> Result<()> {
        let live = self.live.read().await.clone();
        self.metrics.save_portfolio_metrics(&live).await?;

        for simulation in self.simulations.list() {
            self.metrics
                .save_portfolio_metrics(&simulation.portfolio())
                .await?;
        }
        Ok(())
    }

    pub fn status(&self) -> ServerStatus {
        ServerStatus {
            server_started: self.started_at,
            archive: self.archive.status(),
        }
    }

    /// Latest price of `base` in `quote`, triangulated if needed.
    pub fn prices(&self, base: &SymbolType, quote: &SymbolType) -> Result<PriceView> {
        let price = self.archive.latest_price_as(base, quote)?;
        let day = self
            .archive
            .day_summary_as(base, quote)
            .ok()
            .map(|summary| {
                let change_today = price.value - summary.close;
                DayChange {
                    opening: summary.open,
                    closing: summary.close,
                    highest: summary.high,
                    lowest: summary.low,
                    change_24h: summary.change_abs,
                    change_pct_24h: summary.change_pct,
                    change_today,
                    change_pct_today: if change_today != 0.0 {
                        change_today / summary.close * 100.0
                    } else {
                        0.0
                    },
                }
            });

        Ok(PriceView {
            base: price.base,
            quote: price.quote,
            current: price.value,
            at: price.at,
            source: price.source,
            day,
        })
    }

    /// Latest prices of every known symbol in `quote`. Symbols with no route
    /// are left out.
    pub fn all_prices(&self, quote: &SymbolType) -> Vec<PriceView> {
        self.archive
            .symbol_types()
            .keys()
            .filter_map(|base| self.prices(base, quote).ok())
            .collect()
    }

    pub async fn portfolio(&self) -> Portfolio {
        self.live.read().await.clone()
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.status_log.entries()
    }
}
