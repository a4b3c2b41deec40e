use std::f64::consts::PI;

use super::advance_clock;
use crate::error::Result;
use crate::models::unit::{PvInformation, UnitInput, UnitResult};

/// PV generator producing whatever the irradiance allows; never curtailed
#[derive(Debug, Clone, PartialEq)]
pub struct PvUnit {
    info: PvInformation,
}

impl PvUnit {
    pub fn new(info: PvInformation) -> Self {
        Self { info }
    }

    /// Generator with a one-day cosine irradiance curve peaking at 1000 W/m²
    pub fn with_daily_profile(unit_id: impl Into<String>, a_m2: f64, eta_percent: f64) -> Self {
        Self::new(PvInformation {
            unit_id: unit_id.into(),
            a_m2,
            eta_percent,
            irradiance_w_per_m2: daily_irradiance(96),
            last_step: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.info.unit_id
    }

    /// Available power in kW at time index `step`
    pub fn available_power(&self, step: usize) -> f64 {
        let profile = &self.info.irradiance_w_per_m2;
        if profile.is_empty() {
            return 0.0;
        }
        let irradiance = profile[step % profile.len()].max(0.0);
        self.info.a_m2 * self.info.eta_percent / 100.0 * irradiance / 1000.0
    }

    pub fn step(&mut self, _input: &UnitInput, step: usize) -> Result<UnitResult> {
        advance_clock(&self.info.unit_id, &mut self.info.last_step, step)?;
        Ok(UnitResult::new(self.available_power(step), 0.0))
    }

    pub fn information(&self) -> PvInformation {
        self.info.clone()
    }
}

/// `1000 * (1 - cos(2πx/n)) / 2`, zero at midnight and peaking at noon
pub fn daily_irradiance(intervals: usize) -> Vec<f64> {
    (0..intervals)
        .map(|x| 1000.0 * (1.0 - (2.0 * PI * x as f64 / intervals as f64).cos()) / 2.0)
        .collect()
}
