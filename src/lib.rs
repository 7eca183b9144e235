//! Teletrada: crypto price archive, portfolio tracking and strategy
//! simulation.
//!
//! This is the root crate that provides benchmark and integration-test
//! access to the workspace. For actual functionality, use the individual
//! crates directly:
//!
//! - `trada-core`: price archive, portfolios, strategies, ports
//! - `backtester`: simulations over recorded price history
//! - `trada-server`: live portfolio, scheduler and read views

pub use backtester as simulation;
pub use trada_core as core;
pub use trada_server as server;
