use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Setpoint handed to a resource for one time step.
/// Positive `p_kw` means power delivered to the market.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UnitInput {
    pub delta_t_s: f64,
    pub p_kw: f64,
    pub q_kvar: f64,
}

impl UnitInput {
    pub fn new(delta_t_s: f64, p_kw: f64, q_kvar: f64) -> Self {
        Self {
            delta_t_s,
            p_kw,
            q_kvar,
        }
    }

    /// Same step length with a different setpoint
    pub fn with_setpoint(&self, p_kw: f64, q_kvar: f64) -> Self {
        Self {
            delta_t_s: self.delta_t_s,
            p_kw,
            q_kvar,
        }
    }
}

/// Physically realized power for one time step
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UnitResult {
    pub p_kw: f64,
    pub q_kvar: f64,
}

impl UnitResult {
    pub fn new(p_kw: f64, q_kvar: f64) -> Self {
        Self { p_kw, q_kvar }
    }
}

impl Add for UnitResult {
    type Output = UnitResult;

    fn add(self, rhs: UnitResult) -> UnitResult {
        UnitResult::new(self.p_kw + rhs.p_kw, self.q_kvar + rhs.q_kvar)
    }
}

impl AddAssign for UnitResult {
    fn add_assign(&mut self, rhs: UnitResult) {
        self.p_kw += rhs.p_kw;
        self.q_kvar += rhs.q_kvar;
    }
}

/// Dispatch strategy of a composite resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Step every child with the commanded setpoint and sum the outputs
    SumAll,
    /// Fixed children first, then cascade the residual through batteries
    #[default]
    AdjustViaBatteries,
}

/// Perfect-forecast demand profile of a load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandInformation {
    pub unit_id: String,
    pub perfect_demand_p_kw: Vec<f64>,
    pub perfect_demand_q_kvar: Vec<f64>,
    #[serde(default)]
    pub last_step: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PvInformation {
    pub unit_id: String,
    pub a_m2: f64,
    pub eta_percent: f64,
    pub irradiance_w_per_m2: Vec<f64>,
    #[serde(default)]
    pub last_step: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryInformation {
    pub unit_id: String,
    pub cap_kwh: f64,
    pub p_charge_max_kw: f64,
    pub p_discharge_max_kw: f64,
    pub soc_min_percent: f64,
    pub soc_percent: f64,
    #[serde(default)]
    pub last_step: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VppInformation {
    pub unit_id: String,
    #[serde(default)]
    pub strategy: StrategyKind,
    pub units: Vec<UnitInformation>,
}

/// Parameters and state of a resource node, enough to rebuild it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitInformation {
    Load(DemandInformation),
    Pv(PvInformation),
    Battery(BatteryInformation),
    Vpp(VppInformation),
}

impl UnitInformation {
    pub fn unit_id(&self) -> &str {
        match self {
            UnitInformation::Load(info) => &info.unit_id,
            UnitInformation::Pv(info) => &info.unit_id,
            UnitInformation::Battery(info) => &info.unit_id,
            UnitInformation::Vpp(info) => &info.unit_id,
        }
    }
}
