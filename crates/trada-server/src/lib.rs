//! Teletrada Server
//!
//! Keeps the price archive fresh, prices the live portfolio and hosts
//! simulations over recorded history.
//!
//! # Features
//!
//! - **Scheduler**: periodic price updates, portfolio repricing and metrics,
//!   plus a daily day-summary refresh at UTC midnight
//! - **Status Log**: bounded activity log readable by clients
//! - **Read Views**: server status, prices with day movement, live portfolio

pub mod scheduler;
pub mod server;
pub mod status_log;

pub use scheduler::Scheduler;
pub use server::{DayChange, PriceView, ServerStatus, TradaServer, LIVE_PORTFOLIO};
pub use status_log::{LogEntry, StatusLog};
