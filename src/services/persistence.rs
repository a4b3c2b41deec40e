use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::SimulationConfig;
use crate::error::Result;
use crate::models::unit::UnitInformation;
use crate::services::general_demand::GeneralDemand;
use crate::services::ledger::AccountStore;
use crate::services::market_clearing::Market;

/// Complete simulation state: registry, clock, market, ledgers and unit trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub config: SimulationConfig,
    /// actor id -> participant id
    pub registered: BTreeMap<String, String>,
    pub step: u64,
    pub registration_open: bool,
    pub market: Market,
    pub accounts: AccountStore,
    pub unit_pool: BTreeMap<String, UnitInformation>,
    pub general_demand: GeneralDemand,
}

pub trait PersistenceHandler {
    fn write(&self, snapshot: &SimulationSnapshot) -> Result<()>;

    fn load(&self) -> Result<SimulationSnapshot>;
}

/// Stores the snapshot as one pretty-printed JSON document
#[derive(Debug, Clone)]
pub struct JsonPersistenceHandler {
    path: PathBuf,
}

impl JsonPersistenceHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl PersistenceHandler for JsonPersistenceHandler {
    fn write(&self, snapshot: &SimulationSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        // write then rename so a crash never leaves a truncated snapshot
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
        fs::rename(&tmp, &self.path)?;
        info!(path = %self.path.display(), step = snapshot.step, "Snapshot written");
        Ok(())
    }

    fn load(&self) -> Result<SimulationSnapshot> {
        let bytes = fs::read(&self.path)?;
        let snapshot: SimulationSnapshot = serde_json::from_slice(&bytes)?;
        info!(path = %self.path.display(), step = snapshot.step, "Snapshot loaded");
        Ok(snapshot)
    }
}
