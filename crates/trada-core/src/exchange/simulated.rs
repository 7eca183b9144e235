use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::clock::Clock;
use crate::error::Result;
use crate::ports::{BalanceProvider, PriceProvider};
use crate::types::{CoinBalance, DaySummary, Price, SymbolType, BTC, ETH, LTC, USDT};

pub const MOCK_EXCHANGE: &str = "mockexchange";

/// Daily move reported for every pair in generated day summaries.
const DAY_CHANGE_PCT: f64 = 25.0;

struct ExchangeState {
    balances: Vec<CoinBalance>,
    rates: BTreeMap<(SymbolType, SymbolType), f64>,
}

/// In-process exchange with fixed holdings and settable rates.
///
/// Ticks are stamped with the injected clock, so advancing a manual clock
/// between updates produces a replayable price history.
pub struct SimulatedExchange {
    state: RwLock<ExchangeState>,
    clock: Arc<dyn Clock>,
}

impl SimulatedExchange {
    /// Exchange seeded with the standard mock holdings and rates.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let exchange = Self::empty(clock);
        for (coin, amount) in [(BTC, 12.5), (ETH, 122.5), (LTC, 222.5)] {
            exchange.set_balance(CoinBalance::new(coin, MOCK_EXCHANGE, amount, amount));
        }

        let btc_as_eth = 12.0;
        let btc_as_ltc = 55.0;
        exchange.set_rate(BTC, USDT, 10000.0);
        exchange.set_rate(BTC, ETH, btc_as_eth);
        exchange.set_rate(BTC, LTC, btc_as_ltc);
        exchange.set_rate(ETH, BTC, 1.0 / btc_as_eth);
        exchange.set_rate(ETH, USDT, 800.0);
        exchange.set_rate(LTC, BTC, 1.0 / btc_as_ltc);
        exchange.set_rate(LTC, USDT, 180.0);
        exchange
    }

    /// Exchange with no holdings and no rates.
    pub fn empty(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(ExchangeState {
                balances: Vec::new(),
                rates: BTreeMap::new(),
            }),
            clock,
        }
    }

    /// Insert or replace the holding for the coin's symbol.
    pub fn set_balance(&self, coin: CoinBalance) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        match state.balances.iter_mut().find(|b| b.symbol == coin.symbol) {
            Some(existing) => *existing = coin,
            None => state.balances.push(coin),
        }
    }

    /// Set the rate reported for `base/quote` on the next tick.
    pub fn set_rate(&self, base: impl Into<SymbolType>, quote: impl Into<SymbolType>, value: f64) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.rates.insert((base.into(), quote.into()), value);
    }

    pub fn rate(&self, base: &SymbolType, quote: &SymbolType) -> Option<f64> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.rates.get(&(base.clone(), quote.clone())).copied()
    }
}

#[async_trait]
impl BalanceProvider for SimulatedExchange {
    async fn balances(&self) -> Result<Vec<CoinBalance>> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state.balances.clone())
    }
}

#[async_trait]
impl PriceProvider for SimulatedExchange {
    async fn latest_prices(&self) -> Result<Vec<Price>> {
        let now = self.clock.now();
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .rates
            .iter()
            .map(|((base, quote), value)| {
                Price::new(base.clone(), quote.clone(), *value, now, MOCK_EXCHANGE)
            })
            .collect())
    }

    async fn day_summaries(&self) -> Result<Vec<DaySummary>> {
        let now = self.clock.now();
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .rates
            .iter()
            .map(|((base, quote), close)| {
                let open = close / (1.0 + DAY_CHANGE_PCT / 100.0);
                DaySummary {
                    base: base.clone(),
                    quote: quote.clone(),
                    open,
                    close: *close,
                    weighted_avg: (open + close) / 2.0,
                    high: *close,
                    low: open,
                    change_abs: close - open,
                    change_pct: DAY_CHANGE_PCT,
                    at: now,
                    source: MOCK_EXCHANGE.to_string(),
                }
            })
            .collect())
    }
}
