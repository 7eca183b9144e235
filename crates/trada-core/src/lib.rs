//! Teletrada Core Library
//!
//! Shared types, the time-indexed price archive, portfolios and trading
//! strategies for the teletrada system.
//!
//! # Features
//!
//! - **Price Archive**: per-symbol time-sorted price history with linear
//!   interpolation and two-hop triangulation through a bridge currency
//! - **Portfolios**: live and simulated balances, repricing, cloning, diffing
//! - **Strategies**: price-threshold conditions evaluated against the archive
//! - **Ports**: balance/price providers, metrics sink and clock traits so every
//!   collaborator can be injected

pub mod archive;
pub mod clock;
pub mod config;
pub mod error;
pub mod exchange;
pub mod metrics;
pub mod portfolio;
pub mod ports;
pub mod strategy;
pub mod types;

pub use archive::{Archive, ArchiveStatus, Symbol};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use exchange::SimulatedExchange;
pub use metrics::LogMetricsSink;
pub use portfolio::{Balance, Portfolio, SharedPortfolio};
pub use ports::{BalanceProvider, MetricsSink, PriceLookup, PriceProvider};
pub use strategy::{Strategy, StrategyKind, StrategySummary};
pub use types::{CoinBalance, DaySummary, Price, SymbolType};
