use super::advance_clock;
use crate::error::Result;
use crate::models::unit::{BatteryInformation, UnitInput, UnitResult};

/// Lossless battery. A positive setpoint discharges, a negative one charges.
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryUnit {
    info: BatteryInformation,
}

impl BatteryUnit {
    pub fn new(info: BatteryInformation) -> Self {
        Self { info }
    }

    pub fn id(&self) -> &str {
        &self.info.unit_id
    }

    pub fn soc_percent(&self) -> f64 {
        self.info.soc_percent
    }

    /// Clamp `setpoint_kw` to the power limits and to the energy reachable in `hours`
    pub fn feasible_power(&self, setpoint_kw: f64, hours: f64) -> f64 {
        let info = &self.info;
        if info.cap_kwh <= 0.0 {
            return 0.0;
        }
        if setpoint_kw > 0.0 {
            let mut p = setpoint_kw.min(info.p_discharge_max_kw);
            if hours > 0.0 {
                let stored = (info.soc_percent - info.soc_min_percent).max(0.0) / 100.0 * info.cap_kwh;
                p = p.min(stored / hours);
            }
            p.max(0.0)
        } else if setpoint_kw < 0.0 {
            let mut p = (-setpoint_kw).min(info.p_charge_max_kw);
            if hours > 0.0 {
                let room = (100.0 - info.soc_percent).max(0.0) / 100.0 * info.cap_kwh;
                p = p.min(room / hours);
            }
            -p.max(0.0)
        } else {
            0.0
        }
    }

    pub fn step(&mut self, input: &UnitInput, step: usize) -> Result<UnitResult> {
        advance_clock(&self.info.unit_id, &mut self.info.last_step, step)?;
        let hours = input.delta_t_s.max(0.0) / 3600.0;
        let p_kw = self.feasible_power(input.p_kw, hours);

        if self.info.cap_kwh > 0.0 {
            let soc = self.info.soc_percent - p_kw * hours / self.info.cap_kwh * 100.0;
            self.info.soc_percent = soc.clamp(0.0, 100.0);
        }
        Ok(UnitResult::new(p_kw, 0.0))
    }

    pub fn information(&self) -> BatteryInformation {
        self.info.clone()
    }
}
