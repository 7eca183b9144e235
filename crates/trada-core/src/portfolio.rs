//! Portfolios of coin balances priced against the archive.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::ports::{BalanceProvider, PriceLookup};
use crate::strategy::Strategy;
use crate::types::{CoinBalance, Price, SymbolType};

/// Portfolio shared between the scheduler, simulations and read views.
pub type SharedPortfolio = Arc<RwLock<Portfolio>>;

/// Holding of one asset, optionally priced in a quote currency.
#[derive(Debug, Clone, Serialize)]
pub struct Balance {
    pub symbol: SymbolType,
    pub exchange: String,
    pub free: f64,
    pub locked: f64,
    /// `free + locked`, recomputed on every refresh.
    pub total: f64,
    pub at: DateTime<Utc>,
    pub quote: SymbolType,
    pub price: f64,
    pub value: f64,
    pub price_24h: f64,
    pub value_24h: f64,
    pub change_24h: f64,
    pub change_pct_24h: f64,
    #[serde(skip)]
    pub buy_strategy: Option<Arc<Strategy>>,
    #[serde(skip)]
    pub sell_strategy: Option<Arc<Strategy>>,
}

impl Balance {
    /// New unpriced balance from a provider holding.
    pub fn from_coin(coin: CoinBalance, quote: impl Into<SymbolType>, at: DateTime<Utc>) -> Self {
        Self {
            total: coin.total(),
            symbol: coin.symbol,
            exchange: coin.exchange,
            free: coin.free,
            locked: coin.locked,
            at,
            quote: quote.into(),
            price: 0.0,
            value: 0.0,
            price_24h: 0.0,
            value_24h: 0.0,
            change_24h: 0.0,
            change_pct_24h: 0.0,
            buy_strategy: None,
            sell_strategy: None,
        }
    }

    fn update_coin(&mut self, coin: CoinBalance, at: DateTime<Utc>) {
        self.total = coin.total();
        self.exchange = coin.exchange;
        self.free = coin.free;
        self.locked = coin.locked;
        self.at = at;
    }

    /// Reprice from the latest archived price.
    pub fn reprice(&mut self, prices: &dyn PriceLookup) -> Result<()> {
        let price = prices
            .latest_price_as(&self.symbol, &self.quote)
            .map_err(|e| self.reprice_error(e))?;
        self.reprice_using(price, prices)
    }

    /// Reprice from the archived price at `at`.
    pub fn reprice_at(&mut self, prices: &dyn PriceLookup, at: DateTime<Utc>) -> Result<()> {
        let price = prices
            .price_as(&self.symbol, &self.quote, at)
            .map_err(|e| self.reprice_error(e))?;
        self.reprice_using(price, prices)
    }

    fn reprice_using(&mut self, price: Price, prices: &dyn PriceLookup) -> Result<()> {
        if price.base != self.symbol {
            return Err(Error::MismatchedPrice {
                symbol: self.symbol.clone(),
                price_base: price.base,
            });
        }

        self.price = price.value;
        self.value = price.value * self.total;
        self.at = price.at;
        self.quote = price.quote;

        // 24h stats are optional; keep the previous values when absent
        if let Ok(summary) = prices.day_summary_as(&self.symbol, &self.quote) {
            self.price_24h = summary.close;
            self.value_24h = summary.close * self.total;
            self.change_24h = summary.change_abs;
            self.change_pct_24h = summary.change_pct;
        }
        Ok(())
    }

    fn reprice_error(&self, source: Error) -> Error {
        Error::Reprice {
            symbol: self.symbol.clone(),
            quote: self.quote.clone(),
            source: Box::new(source),
        }
    }

    /// `self - before` for every numeric field; identity fields are copied
    /// from `self`. Strategies are not carried over.
    fn minus(&self, before: &Balance) -> Balance {
        Balance {
            symbol: self.symbol.clone(),
            exchange: self.exchange.clone(),
            free: self.free - before.free,
            locked: self.locked - before.locked,
            total: self.total - before.total,
            at: self.at,
            quote: self.quote.clone(),
            price: self.price - before.price,
            value: self.value - before.value,
            price_24h: self.price_24h - before.price_24h,
            value_24h: self.value_24h - before.value_24h,
            change_24h: self.change_24h - before.change_24h,
            change_pct_24h: self.change_pct_24h - before.change_pct_24h,
            buy_strategy: None,
            sell_strategy: None,
        }
    }

    fn without_strategies(&self) -> Balance {
        Balance {
            buy_strategy: None,
            sell_strategy: None,
            ..self.clone()
        }
    }
}

/// Named collection of balances, one per asset.
#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    name: String,
    is_live: bool,
    balances: BTreeMap<SymbolType, Balance>,
}

impl Portfolio {
    /// Portfolio refreshed from a balance provider.
    pub fn live(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_live: true,
            balances: BTreeMap::new(),
        }
    }

    /// Portfolio that is only ever repriced, never refreshed.
    pub fn simulated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_live: false,
            balances: BTreeMap::new(),
        }
    }

    pub fn into_shared(self) -> SharedPortfolio {
        Arc::new(RwLock::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_live(&self) -> bool {
        self.is_live
    }

    pub fn balances(&self) -> &BTreeMap<SymbolType, Balance> {
        &self.balances
    }

    pub fn balance(&self, symbol: &SymbolType) -> Option<&Balance> {
        self.balances.get(symbol)
    }

    pub fn balance_mut(&mut self, symbol: &SymbolType) -> Option<&mut Balance> {
        self.balances.get_mut(symbol)
    }

    /// Insert or replace a balance keyed by its symbol.
    pub fn insert_balance(&mut self, balance: Balance) {
        self.balances.insert(balance.symbol.clone(), balance);
    }

    /// Sum of every balance value. Only meaningful when all balances share a
    /// quote currency.
    pub fn total_value(&self) -> f64 {
        self.balances.values().map(|b| b.value).sum()
    }

    /// Replace holdings with the provider's current balances.
    ///
    /// Existing balances keep their quote currency, prices and strategies;
    /// new ones are quoted in `default_quote`.
    pub async fn refresh_balances(
        &mut self,
        provider: &dyn BalanceProvider,
        default_quote: &SymbolType,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !self.is_live {
            return Err(Error::NotLive(self.name.clone()));
        }

        let coins = provider
            .balances()
            .await
            .map_err(|e| Error::provider("failed to get balances from exchange", e))?;

        for coin in coins {
            match self.balances.get_mut(&coin.symbol) {
                Some(balance) => balance.update_coin(coin, now),
                None => {
                    info!(portfolio = %self.name, symbol = %coin.symbol, "New balance");
                    let balance = Balance::from_coin(coin, default_quote.clone(), now);
                    self.balances.insert(balance.symbol.clone(), balance);
                }
            }
        }
        debug!(portfolio = %self.name, balances = self.balances.len(), "Balances refreshed");
        Ok(())
    }

    /// Reprice every balance from the latest prices. Stops at the first
    /// balance with no price route.
    pub fn reprice(&mut self, prices: &dyn PriceLookup) -> Result<()> {
        for balance in self.balances.values_mut() {
            balance.reprice(prices)?;
        }
        Ok(())
    }

    /// Reprice every balance at `at`. Stops at the first balance with no
    /// price route.
    pub fn reprice_at(&mut self, prices: &dyn PriceLookup, at: DateTime<Utc>) -> Result<()> {
        for balance in self.balances.values_mut() {
            balance.reprice_at(prices, at)?;
        }
        Ok(())
    }

    /// Deep copy as a simulated portfolio with no strategies attached.
    pub fn clone_as(&self, name: impl Into<String>) -> Portfolio {
        Portfolio {
            name: name.into(),
            is_live: false,
            balances: self
                .balances
                .iter()
                .map(|(symbol, balance)| (symbol.clone(), balance.without_strategies()))
                .collect(),
        }
    }

    /// Per-symbol difference `self - before`, named `<name>[diff]`.
    pub fn diff(&self, before: &Portfolio) -> Result<Portfolio> {
        let mut balances = BTreeMap::new();
        for (symbol, now) in &self.balances {
            let then = before
                .balances
                .get(symbol)
                .ok_or_else(|| Error::MismatchedPortfolios(symbol.clone()))?;
            balances.insert(symbol.clone(), now.minus(then));
        }

        Ok(Portfolio {
            name: format!("{}[diff]", self.name),
            is_live: false,
            balances,
        })
    }

    pub fn set_buy_strategy(&mut self, symbol: &SymbolType, strategy: Arc<Strategy>) -> Result<()> {
        self.known_balance(symbol)?.buy_strategy = Some(strategy);
        Ok(())
    }

    pub fn set_sell_strategy(&mut self, symbol: &SymbolType, strategy: Arc<Strategy>) -> Result<()> {
        self.known_balance(symbol)?.sell_strategy = Some(strategy);
        Ok(())
    }

    fn known_balance(&mut self, symbol: &SymbolType) -> Result<&mut Balance> {
        let name = &self.name;
        self.balances
            .get_mut(symbol)
            .ok_or_else(|| Error::UnknownSymbol {
                portfolio: name.clone(),
                symbol: symbol.clone(),
            })
    }

    /// Every attached strategy, sell before buy per balance.
    pub fn strategies(&self) -> Vec<Arc<Strategy>> {
        self.balances
            .values()
            .flat_map(|b| [b.sell_strategy.clone(), b.buy_strategy.clone()])
            .flatten()
            .collect()
    }
}
