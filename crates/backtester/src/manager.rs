//! Registry of simulations keyed by id.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;
use trada_core::{Error, Result, Strategy, SymbolType};

use crate::simulation::{Simulation, SimulationContext};
use crate::window::SimulationWindow;

/// Creates, looks up and drives simulations.
pub struct SimulationManager {
    ctx: SimulationContext,
    simulations: DashMap<String, Arc<Simulation>>,
}

impl SimulationManager {
    pub fn new(ctx: SimulationContext) -> Self {
        Self {
            ctx,
            simulations: DashMap::new(),
        }
    }

    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    /// Create a simulation over a clone of the live portfolio.
    pub async fn create(&self, id: &str, name: &str) -> Result<Arc<Simulation>> {
        if self.simulations.contains_key(id) {
            return Err(Error::DuplicateSimulation(id.to_string()));
        }

        let simulation = Arc::new(Simulation::create(id, name, self.ctx.clone()).await);
        match self.simulations.entry(id.to_string()) {
            Entry::Occupied(_) => Err(Error::DuplicateSimulation(id.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&simulation));
                info!(simulation = id, name, "Simulation created");
                Ok(simulation)
            }
        }
    }

    pub fn get(&self, id: &str) -> Result<Arc<Simulation>> {
        self.simulations
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::SimulationNotFound(id.to_string()))
    }

    /// All simulations, ordered by id.
    pub fn list(&self) -> Vec<Arc<Simulation>> {
        let mut simulations: Vec<_> = self
            .simulations
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        simulations.sort_by(|a, b| a.id().cmp(b.id()));
        simulations
    }

    /// Start a simulation; `when` is one of the window names such as
    /// `LAST_DAY` or `REALTIME`.
    pub async fn start(&self, id: &str, when: &str) -> Result<JoinHandle<()>> {
        let simulation = self.get(id)?;
        let window: SimulationWindow = when.parse()?;
        simulation.start(window).await
    }

    pub fn stop(&self, id: &str) -> Result<()> {
        self.get(id)?.stop()
    }

    pub fn set_buy_strategy(
        &self,
        id: &str,
        symbol: &SymbolType,
        strategy: Strategy,
    ) -> Result<Arc<Strategy>> {
        self.get(id)?.set_buy_strategy(symbol, strategy)
    }

    pub fn set_sell_strategy(
        &self,
        id: &str,
        symbol: &SymbolType,
        strategy: Strategy,
    ) -> Result<Arc<Strategy>> {
        self.get(id)?.set_sell_strategy(symbol, strategy)
    }

    /// Simulations that follow live prices instead of replaying history.
    pub fn realtime_simulations(&self) -> Vec<Arc<Simulation>> {
        self.list()
            .into_iter()
            .filter(|simulation| simulation.is_realtime())
            .collect()
    }
}
