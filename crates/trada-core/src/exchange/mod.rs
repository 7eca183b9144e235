//! Exchange-side providers.
//!
//! Only the simulated exchange ships with the core; live exchange clients
//! implement the same [`BalanceProvider`](crate::ports::BalanceProvider) and
//! [`PriceProvider`](crate::ports::PriceProvider) ports.

mod simulated;

pub use simulated::{SimulatedExchange, MOCK_EXCHANGE};
