//! Physical resources and the composite (VPP) dispatch tree.
//!
//! Every registered actor owns one tree. The driver steps the root with the
//! actor's commercial setpoint once per tick and reads back the realized power.

pub mod battery;
pub mod load;
pub mod pool;
pub mod pv;
pub mod vpp;

pub use battery::BatteryUnit;
pub use load::LoadUnit;
pub use pool::UnitPool;
pub use pv::PvUnit;
pub use vpp::{BatteryAdjustStrategy, DispatchStrategy, SumAllStrategy, Vpp};

use crate::error::{MarketError, Result};
use crate::models::unit::{UnitInformation, UnitInput, UnitResult, VppInformation};

/// A node of the dispatch tree
#[derive(Debug)]
pub enum Resource {
    Load(LoadUnit),
    Pv(PvUnit),
    Battery(BatteryUnit),
    Vpp(Vpp),
}

impl Resource {
    pub fn id(&self) -> &str {
        match self {
            Resource::Load(unit) => unit.id(),
            Resource::Pv(unit) => unit.id(),
            Resource::Battery(unit) => unit.id(),
            Resource::Vpp(vpp) => vpp.id(),
        }
    }

    /// Whether the node can follow a setpoint
    pub fn is_adjustable(&self) -> bool {
        match self {
            Resource::Battery(_) => true,
            Resource::Vpp(vpp) => vpp.is_adjustable(),
            Resource::Load(_) | Resource::Pv(_) => false,
        }
    }

    pub fn step(&mut self, input: &UnitInput, step: usize) -> Result<UnitResult> {
        match self {
            Resource::Load(unit) => unit.step(input, step),
            Resource::Pv(unit) => unit.step(input, step),
            Resource::Battery(unit) => unit.step(input, step),
            Resource::Vpp(vpp) => vpp.step(input, step),
        }
    }

    /// Leaf information records, nested composites flattened in order
    pub fn read_information(&self) -> Vec<UnitInformation> {
        match self {
            Resource::Vpp(vpp) => vpp
                .units()
                .iter()
                .flat_map(Resource::read_information)
                .collect(),
            leaf => vec![leaf.read_full_information()],
        }
    }

    /// Nested parameter tree, enough to rebuild the node with `from_information`
    pub fn read_full_information(&self) -> UnitInformation {
        match self {
            Resource::Load(unit) => UnitInformation::Load(unit.information()),
            Resource::Pv(unit) => UnitInformation::Pv(unit.information()),
            Resource::Battery(unit) => UnitInformation::Battery(unit.information()),
            Resource::Vpp(vpp) => UnitInformation::Vpp(VppInformation {
                unit_id: vpp.id().to_string(),
                strategy: vpp.strategy(),
                units: vpp
                    .units()
                    .iter()
                    .map(Resource::read_full_information)
                    .collect(),
            }),
        }
    }

    pub fn from_information(info: UnitInformation) -> Result<Self> {
        Ok(match info {
            UnitInformation::Load(info) => Resource::Load(LoadUnit::new(info)),
            UnitInformation::Pv(info) => Resource::Pv(PvUnit::new(info)),
            UnitInformation::Battery(info) => {
                if info.cap_kwh < 0.0 || info.soc_percent < 0.0 || info.soc_percent > 100.0 {
                    return Err(MarketError::invalid_input(format!(
                        "battery '{}' has an invalid capacity or state of charge",
                        info.unit_id
                    )));
                }
                Resource::Battery(BatteryUnit::new(info))
            }
            UnitInformation::Vpp(info) => Resource::Vpp(Vpp::with_units(
                info.unit_id,
                info.strategy,
                info.units
                    .into_iter()
                    .map(Resource::from_information)
                    .collect::<Result<Vec<_>>>()?,
            )?),
        })
    }

    /// Summed demand of every load in the tree for `len` steps from `start`
    pub fn load_forecast(&self, start: usize, len: usize) -> Vec<f64> {
        match self {
            Resource::Load(unit) => unit.forecast(start, len),
            Resource::Vpp(vpp) => vpp.units().iter().fold(vec![0.0; len], |mut acc, unit| {
                for (total, value) in acc.iter_mut().zip(unit.load_forecast(start, len)) {
                    *total += value;
                }
                acc
            }),
            Resource::Pv(_) | Resource::Battery(_) => vec![0.0; len],
        }
    }
}

/// Time indices of a leaf may repeat but never go back
pub(crate) fn advance_clock(unit_id: &str, last_step: &mut Option<usize>, step: usize) -> Result<()> {
    if let Some(last) = *last_step {
        if step < last {
            return Err(MarketError::TimeRewind {
                unit_id: unit_id.to_string(),
                last_step: last,
                requested_step: step,
            });
        }
    }
    *last_step = Some(step);
    Ok(())
}
