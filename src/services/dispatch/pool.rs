use std::collections::BTreeMap;
use tracing::debug;

use super::{LoadUnit, PvUnit, Resource, Vpp};
use crate::error::{MarketError, Result};
use crate::models::unit::{
    BatteryInformation, StrategyKind, UnitInformation, UnitInput, UnitResult,
};
use crate::services::dispatch::BatteryUnit;
use crate::services::general_demand::default_load_profile;

/// Dispatch trees of all registered actors
#[derive(Debug, Default)]
pub struct UnitPool {
    actor_to_root: BTreeMap<String, Resource>,
}

impl UnitPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the tree of `actor_id`, returning the one it replaces
    pub fn insert_actor_root(&mut self, actor_id: &str, root: Resource) -> Option<Resource> {
        debug!(actor_id, root = root.id(), "Unit tree installed");
        self.actor_to_root.insert(actor_id.to_string(), root)
    }

    pub fn root(&self, actor_id: &str) -> Option<&Resource> {
        self.actor_to_root.get(actor_id)
    }

    pub fn contains(&self, actor_id: &str) -> bool {
        self.actor_to_root.contains_key(actor_id)
    }

    pub fn step_actor(
        &mut self,
        actor_id: &str,
        input: &UnitInput,
        step: usize,
    ) -> Result<UnitResult> {
        self.actor_to_root
            .get_mut(actor_id)
            .ok_or_else(|| MarketError::UnknownParticipant(actor_id.to_string()))?
            .step(input, step)
    }

    pub fn read_information(&self, actor_id: &str) -> Option<Vec<UnitInformation>> {
        self.root(actor_id).map(Resource::read_information)
    }

    pub fn remove_actor(&mut self, actor_id: &str) -> Option<Resource> {
        self.actor_to_root.remove(actor_id)
    }

    pub fn reset(&mut self) {
        self.actor_to_root.clear();
    }

    /// Full parameter trees keyed by actor
    pub fn snapshot(&self) -> BTreeMap<String, UnitInformation> {
        self.actor_to_root
            .iter()
            .map(|(actor, root)| (actor.clone(), root.read_full_information()))
            .collect()
    }

    pub fn from_snapshot(snapshot: BTreeMap<String, UnitInformation>) -> Result<Self> {
        let actor_to_root = snapshot
            .into_iter()
            .map(|(actor, info)| Ok((actor, Resource::from_information(info)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { actor_to_root })
    }
}

/// Household allocated to every new actor: load, rooftop PV and a home battery
pub fn allocate_default_actor_units(actor_id: &str) -> Result<Resource> {
    let load = LoadUnit::from_profile(
        "load",
        default_load_profile(),
        default_load_profile().iter().map(|p| p * 0.1).collect(),
    );
    let pv = PvUnit::with_daily_profile("pv", 15.0, 20.0);
    let battery = BatteryUnit::new(BatteryInformation {
        unit_id: "battery".into(),
        cap_kwh: 10.0,
        p_charge_max_kw: 3.0,
        p_discharge_max_kw: 3.0,
        soc_min_percent: 10.0,
        soc_percent: 50.0,
        last_step: None,
    });

    let vpp = Vpp::with_units(
        format!("vpp-{}", actor_id),
        StrategyKind::AdjustViaBatteries,
        [
            Resource::Load(load),
            Resource::Pv(pv),
            Resource::Battery(battery),
        ],
    )?;
    Ok(Resource::Vpp(vpp))
}
