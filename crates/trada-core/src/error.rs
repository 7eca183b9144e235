//! Error types for the teletrada system.

use thiserror::Error;

use crate::types::SymbolType;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Price invalid: {reason}")]
    InvalidPrice { reason: String },

    #[error("Strategy invalid: {reason}")]
    InvalidStrategy { reason: String },

    #[error("When value {0} is not valid")]
    InvalidWindow(String),

    #[error("Sample frequency must be positive, got {0} seconds")]
    InvalidSampleFrequency(i64),

    #[error("Symbol: {0} not found")]
    SymbolNotFound(SymbolType),

    #[error("Symbol: {base} has no price information for: {quote}")]
    NoPriceData { base: SymbolType, quote: SymbolType },

    #[error("Symbol: {base} has no daily summary for: {quote}")]
    NoDaySummary { base: SymbolType, quote: SymbolType },

    #[error("unable to convert {base} to {quote} as there is no {missing_base}/{missing_quote} prices")]
    NoRoute {
        base: SymbolType,
        quote: SymbolType,
        missing_base: SymbolType,
        missing_quote: SymbolType,
    },

    #[error("Simulation Id: {0} not found")]
    SimulationNotFound(String),

    #[error("Cannot create simulation {0} as it already exists")]
    DuplicateSimulation(String),

    #[error("Simulation Id: {0} is already started")]
    AlreadyRunning(String),

    #[error("Simulation Id: {0} is not running")]
    NotRunning(String),

    #[error("Simulated portfolio: {0} cannot have balances refreshed from exchange")]
    NotLive(String),

    #[error("Portfolio: {portfolio} has no balance for {symbol}")]
    UnknownSymbol { portfolio: String, symbol: SymbolType },

    #[error("Before portfolio did not contain a balance for {0}")]
    MismatchedPortfolios(SymbolType),

    #[error("Cannot reprice symbol: {symbol} with price: {price_base}")]
    MismatchedPrice { symbol: SymbolType, price_base: SymbolType },

    #[error("failed to reprice {symbol} as {quote}: {source}")]
    Reprice {
        symbol: SymbolType,
        quote: SymbolType,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to evaluate strategy {id}: {source}")]
    StrategyEvaluation {
        id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{context}: {message}")]
    Provider { context: String, message: String },

    #[error("Metrics sink error: {0}")]
    Metrics(String),

    #[error("Failed to load prices from file: {path}: {source}")]
    Snapshot {
        path: String,
        #[source]
        source: Box<Error>,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Broad classes callers branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input violated an invariant; nothing was mutated.
    Validation,
    /// Unknown symbol, simulation, price data or triangulation route.
    NotFound,
    /// Operation not allowed in the current state.
    StateConflict,
    /// An external provider or sink failed.
    Provider,
    /// Filesystem, encoding or configuration failure.
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidPrice { .. }
            | Error::InvalidStrategy { .. }
            | Error::InvalidWindow(_)
            | Error::InvalidSampleFrequency(_)
            | Error::MismatchedPrice { .. } => ErrorKind::Validation,
            Error::SymbolNotFound(_)
            | Error::NoPriceData { .. }
            | Error::NoDaySummary { .. }
            | Error::NoRoute { .. }
            | Error::SimulationNotFound(_)
            | Error::UnknownSymbol { .. }
            | Error::MismatchedPortfolios(_) => ErrorKind::NotFound,
            Error::DuplicateSimulation(_)
            | Error::AlreadyRunning(_)
            | Error::NotRunning(_)
            | Error::NotLive(_) => ErrorKind::StateConflict,
            Error::Provider { .. } | Error::Metrics(_) => ErrorKind::Provider,
            Error::Reprice { source, .. }
            | Error::StrategyEvaluation { source, .. }
            | Error::Snapshot { source, .. } => source.kind(),
            Error::Json(_) | Error::Io(_) | Error::ConfigFile(_) | Error::Config { .. } => {
                ErrorKind::Io
            }
        }
    }

    /// Wrap a provider failure with the operation that triggered it.
    pub fn provider(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Error::Provider {
            context: context.into(),
            message: err.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type Result<T> = std::result::Result<T, Error>;
