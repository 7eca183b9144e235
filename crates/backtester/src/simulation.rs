//! Backtest simulation state machine.
//!
//! A simulation owns a simulated copy of the live portfolio. Starting it
//! replays a window of archived prices against that copy at a fixed sample
//! frequency, repricing at every sample and evaluating the attached
//! strategies. Strategies are evaluated only; no virtual trades are made.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use trada_core::{
    Archive, Clock, Error, Portfolio, Result, SharedPortfolio, Strategy, StrategySummary,
    SymbolType,
};

use crate::window::SimulationWindow;

/// Sampling period used when none is configured.
pub const DEFAULT_SAMPLE_FREQUENCY_SECS: i64 = 300;

/// Shared collaborators for every simulation.
#[derive(Clone)]
pub struct SimulationContext {
    pub archive: Arc<Archive>,
    pub clock: Arc<dyn Clock>,
    pub live: SharedPortfolio,
    pub sample_frequency: Duration,
}

impl SimulationContext {
    pub fn new(archive: Arc<Archive>, clock: Arc<dyn Clock>, live: SharedPortfolio) -> Self {
        Self {
            archive,
            clock,
            live,
            sample_frequency: Duration::seconds(DEFAULT_SAMPLE_FREQUENCY_SECS),
        }
    }

    pub fn with_sample_frequency(mut self, sample_frequency: Duration) -> Self {
        self.sample_frequency = sample_frequency;
        self
    }
}

#[derive(Debug)]
struct SimulationState {
    portfolio: Portfolio,
    live_at_start: Option<Portfolio>,
    window: Option<SimulationWindow>,
    use_historical_data: bool,
    use_realtime_data: bool,
    range_from: Option<DateTime<Utc>>,
    range_to: Option<DateTime<Utc>>,
    is_running: bool,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    run_started: Option<Instant>,
    samples: u64,
    last_diff: Option<Portfolio>,
    last_error: Option<String>,
}

impl SimulationState {
    fn mark_stopped(&mut self) {
        self.is_running = false;
        let elapsed = self
            .run_started
            .map(|started| Duration::from_std(started.elapsed()).unwrap_or_else(|_| Duration::zero()))
            .unwrap_or_else(Duration::zero);
        self.stopped_at = self.started_at.map(|started| started + elapsed);
    }
}

/// Full state of a simulation for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationStatus {
    pub id: String,
    pub name: String,
    pub is_running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub window: Option<SimulationWindow>,
    pub use_historical_data: bool,
    pub use_realtime_data: bool,
    pub range_from: Option<DateTime<Utc>>,
    pub range_to: Option<DateTime<Utc>>,
    pub sample_frequency_secs: i64,
    pub samples: u64,
    pub portfolio: Portfolio,
    pub live_now: Portfolio,
    pub live_at_start: Option<Portfolio>,
    pub last_diff: Option<Portfolio>,
    pub last_error: Option<String>,
    pub strategies: Vec<StrategySummary>,
}

/// One backtest: a simulated portfolio plus its run history.
pub struct Simulation {
    id: String,
    name: String,
    ctx: SimulationContext,
    state: RwLock<SimulationState>,
    generation: AtomicU64,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Simulation")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("window", &state.window)
            .field("is_running", &state.is_running)
            .field("samples", &state.samples)
            .finish()
    }
}

impl Simulation {
    /// Create a simulation working on a clone of the live portfolio.
    pub async fn create(
        id: impl Into<String>,
        name: impl Into<String>,
        ctx: SimulationContext,
    ) -> Self {
        let id = id.into();
        let name = name.into();
        let portfolio = ctx.live.read().await.clone_as(name.clone());

        Self {
            id,
            name,
            ctx,
            state: RwLock::new(SimulationState {
                portfolio,
                live_at_start: None,
                window: None,
                use_historical_data: false,
                use_realtime_data: false,
                range_from: None,
                range_to: None,
                is_running: false,
                started_at: None,
                stopped_at: None,
                run_started: None,
                samples: 0,
                last_diff: None,
                last_error: None,
            }),
            generation: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> RwLockReadGuard<'_, SimulationState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SimulationState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_running(&self) -> bool {
        self.read().is_running
    }

    pub fn is_realtime(&self) -> bool {
        self.read().use_realtime_data
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.read().started_at
    }

    pub fn stopped_at(&self) -> Option<DateTime<Utc>> {
        self.read().stopped_at
    }

    /// Copy of the working portfolio.
    pub fn portfolio(&self) -> Portfolio {
        self.read().portfolio.clone()
    }

    /// Difference produced by the last completed historical run.
    pub fn last_diff(&self) -> Option<Portfolio> {
        self.read().last_diff.clone()
    }

    pub fn set_buy_strategy(&self, symbol: &SymbolType, strategy: Strategy) -> Result<Arc<Strategy>> {
        let strategy = Arc::new(strategy);
        self.write()
            .portfolio
            .set_buy_strategy(symbol, Arc::clone(&strategy))?;
        Ok(strategy)
    }

    pub fn set_sell_strategy(&self, symbol: &SymbolType, strategy: Strategy) -> Result<Arc<Strategy>> {
        let strategy = Arc::new(strategy);
        self.write()
            .portfolio
            .set_sell_strategy(symbol, Arc::clone(&strategy))?;
        Ok(strategy)
    }

    /// Start a run over `window` and return the handle of the background
    /// task. Returns as soon as the task is spawned.
    pub async fn start(self: &Arc<Self>, window: SimulationWindow) -> Result<JoinHandle<()>> {
        if self.ctx.sample_frequency <= Duration::zero() {
            return Err(Error::InvalidSampleFrequency(
                self.ctx.sample_frequency.num_seconds(),
            ));
        }
        if self.is_running() {
            return Err(Error::AlreadyRunning(self.id.clone()));
        }
        let live_at_start = self
            .ctx
            .live
            .read()
            .await
            .clone_as(format!("{}[start]", self.name));
        let now = self.ctx.clock.now();

        let generation = {
            let mut state = self.write();
            if state.is_running {
                return Err(Error::AlreadyRunning(self.id.clone()));
            }

            let range = window.range_ending(now);
            state.window = Some(window);
            state.use_realtime_data = window.is_realtime();
            state.use_historical_data = !window.is_realtime();
            state.range_from = range.map(|(from, _)| from);
            state.range_to = range.map(|(_, to)| to);
            state.live_at_start = Some(live_at_start);
            state.is_running = true;
            state.started_at = Some(now);
            state.stopped_at = None;
            state.run_started = Some(Instant::now());
            state.samples = 0;
            state.last_error = None;

            for strategy in state.portfolio.strategies() {
                strategy.start();
            }
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        info!(simulation = %self.id, %window, "Simulation started");

        let sim = Arc::clone(self);
        Ok(tokio::task::spawn_blocking(move || sim.run(generation)))
    }

    /// Request a cooperative stop. A replay notices at its next sample.
    pub fn stop(&self) -> Result<()> {
        let mut state = self.write();
        if !state.is_running {
            return Err(Error::NotRunning(self.id.clone()));
        }
        state.mark_stopped();
        for strategy in state.portfolio.strategies() {
            strategy.stop();
        }
        info!(simulation = %self.id, "Simulation stop requested");
        Ok(())
    }

    /// Reprice the working portfolio from the latest prices.
    pub fn reprice(&self) -> Result<()> {
        self.write().portfolio.reprice(self.ctx.archive.as_ref())
    }

    pub async fn status(&self) -> SimulationStatus {
        let live_now = self.ctx.live.read().await.clone();
        let state = self.read();
        SimulationStatus {
            id: self.id.clone(),
            name: self.name.clone(),
            is_running: state.is_running,
            started_at: state.started_at,
            stopped_at: state.stopped_at,
            window: state.window,
            use_historical_data: state.use_historical_data,
            use_realtime_data: state.use_realtime_data,
            range_from: state.range_from,
            range_to: state.range_to,
            sample_frequency_secs: self.ctx.sample_frequency.num_seconds(),
            samples: state.samples,
            portfolio: state.portfolio.clone(),
            live_now,
            live_at_start: state.live_at_start.clone(),
            last_diff: state.last_diff.clone(),
            last_error: state.last_error.clone(),
            strategies: state
                .portfolio
                .strategies()
                .iter()
                .map(|s| s.summary())
                .collect(),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.read().is_running && self.generation.load(Ordering::SeqCst) == generation
    }

    fn run(&self, generation: u64) {
        let historical = self.read().use_historical_data;
        let result = if historical {
            self.replay(generation)
        } else {
            self.follow_live()
        };

        let mut state = self.write();
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if let Err(e) = result {
            error!(simulation = %self.id, error = %e, "Simulation run failed");
            state.last_error = Some(e.to_string());
        }
        if state.is_running {
            state.mark_stopped();
            for strategy in state.portfolio.strategies() {
                strategy.stop();
            }
        }
        info!(
            simulation = %self.id,
            samples = state.samples,
            "Simulation stopped"
        );
    }

    /// Realtime runs are repriced by the scheduler; nothing to replay here.
    fn follow_live(&self) -> Result<()> {
        debug!(simulation = %self.id, "Realtime simulation has no replay");
        Ok(())
    }

    fn replay(&self, generation: u64) -> Result<()> {
        let (from, to, before) = {
            let state = self.read();
            let (Some(from), Some(to)) = (state.range_from, state.range_to) else {
                return Err(Error::InvalidWindow("historical run without a range".to_string()));
            };
            (from, to, state.portfolio.clone())
        };
        let step = self.ctx.sample_frequency;
        let archive = self.ctx.archive.as_ref();

        let mut at = from;
        while at <= to {
            if !self.is_current(generation) {
                warn!(simulation = %self.id, %at, "Replay interrupted");
                return Ok(());
            }

            let strategies = {
                let mut state = self.write();
                state.portfolio.reprice_at(archive, at)?;
                state.samples += 1;
                state.portfolio.strategies()
            };
            for strategy in strategies {
                strategy.condition_met(archive, at)?;
            }
            at += step;
        }

        let mut state = self.write();
        let diff = state.portfolio.diff(&before)?;
        state.last_diff = Some(diff);
        Ok(())
    }
}
