//! Backtester
//!
//! Replays archived prices against simulated copies of the live portfolio.
//!
//! # Features
//!
//! - **Simulation**: created from the live portfolio, started over a
//!   historical window or in realtime mode, stopped cooperatively
//! - **Replay**: reprices the simulated portfolio at every sample and
//!   evaluates the attached buy/sell strategies
//! - **Manager**: registry of simulations keyed by id
//!
//! # Example
//!
//! ```ignore
//! use backtester::{SimulationContext, SimulationManager};
//!
//! let manager = SimulationManager::new(SimulationContext::new(archive, clock, live));
//! manager.create("sim-1", "last week").await?;
//! let run = manager.start("sim-1", "LAST_WEEK").await?;
//! run.await?;
//!
//! let diff = manager.get("sim-1")?.last_diff();
//! ```

pub mod manager;
pub mod simulation;
pub mod window;

// Re-exports
pub use manager::SimulationManager;
pub use simulation::{Simulation, SimulationContext, SimulationStatus, DEFAULT_SAMPLE_FREQUENCY_SECS};
pub use window::SimulationWindow;
