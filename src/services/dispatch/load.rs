use super::advance_clock;
use crate::error::Result;
use crate::models::unit::{DemandInformation, UnitInput, UnitResult};

/// Load following a perfectly forecast demand profile
#[derive(Debug, Clone, PartialEq)]
pub struct LoadUnit {
    info: DemandInformation,
}

impl LoadUnit {
    pub fn new(info: DemandInformation) -> Self {
        Self { info }
    }

    pub fn from_profile(unit_id: impl Into<String>, p_kw: Vec<f64>, q_kvar: Vec<f64>) -> Self {
        Self::new(DemandInformation {
            unit_id: unit_id.into(),
            perfect_demand_p_kw: p_kw,
            perfect_demand_q_kvar: q_kvar,
            last_step: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.info.unit_id
    }

    /// Demand at time index `step`; profiles wrap around
    pub fn demand_at(&self, step: usize) -> (f64, f64) {
        (
            wrapped(&self.info.perfect_demand_p_kw, step),
            wrapped(&self.info.perfect_demand_q_kvar, step),
        )
    }

    /// Active power demand for `len` steps starting at `start`
    pub fn forecast(&self, start: usize, len: usize) -> Vec<f64> {
        (start..start + len)
            .map(|step| wrapped(&self.info.perfect_demand_p_kw, step))
            .collect()
    }

    /// Loads ignore the setpoint and draw their demand
    pub fn step(&mut self, _input: &UnitInput, step: usize) -> Result<UnitResult> {
        advance_clock(&self.info.unit_id, &mut self.info.last_step, step)?;
        let (p_kw, q_kvar) = self.demand_at(step);
        Ok(UnitResult::new(-p_kw, -q_kvar))
    }

    pub fn information(&self) -> DemandInformation {
        self.info.clone()
    }
}

fn wrapped(profile: &[f64], step: usize) -> f64 {
    if profile.is_empty() {
        0.0
    } else {
        profile[step % profile.len()]
    }
}
