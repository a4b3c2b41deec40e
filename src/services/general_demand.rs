use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// Quarter-hour intervals per simulated day
pub const TIME_INTERVALS_PER_DAY: usize = 96;

/// Per-household demand in kW: `0.4 - 0.1 * cos(2πx/96)`
pub fn default_load_profile() -> Vec<f64> {
    (0..TIME_INTERVALS_PER_DAY)
        .map(|x| 0.4 - 0.1 * (2.0 * PI * x as f64 / TIME_INTERVALS_PER_DAY as f64).cos())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyRecord {
    pub tender_amount_kw: Decimal,
    pub provided_amount_kw: Decimal,
}

/// Aggregate demand the market has to cover; sets every auction's tender
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralDemand {
    profile_kw: Vec<f64>,
    number_of_actors: usize,
    supply: Vec<SupplyRecord>,
    provided_share: Option<Decimal>,
}

impl Default for GeneralDemand {
    fn default() -> Self {
        Self::new(default_load_profile(), 1)
    }
}

impl GeneralDemand {
    pub fn new(profile_kw: Vec<f64>, number_of_actors: usize) -> Self {
        Self {
            profile_kw,
            number_of_actors,
            supply: Vec::new(),
            provided_share: None,
        }
    }

    pub fn set_number_of_actors(&mut self, number_of_actors: usize) {
        self.number_of_actors = number_of_actors;
    }

    pub fn number_of_actors(&self) -> usize {
        self.number_of_actors
    }

    /// Tender for time index `step`: the profile scaled by the number of actors
    /// (at least one), rounded to 0.1 kW
    pub fn tender_amount_kw(&self, step: usize) -> Decimal {
        if self.profile_kw.is_empty() {
            return Decimal::ZERO;
        }
        let scaled = self.profile_kw[step % self.profile_kw.len()] * self.number_of_actors.max(1) as f64;
        Decimal::from_f64(scaled)
            .unwrap_or_default()
            .round_dp(1)
    }

    pub fn forecast(&self, start: usize, len: usize) -> Vec<Decimal> {
        (start..start + len)
            .map(|step| self.tender_amount_kw(step))
            .collect()
    }

    /// Record how much of a tender was actually supplied
    pub fn notify_supply(&mut self, tender_amount_kw: Decimal, provided_amount_kw: Decimal) {
        self.supply.push(SupplyRecord {
            tender_amount_kw,
            provided_amount_kw,
        });
        let tendered: Decimal = self.supply.iter().map(|s| s.tender_amount_kw).sum();
        if !tendered.is_zero() {
            let provided: Decimal = self.supply.iter().map(|s| s.provided_amount_kw).sum();
            self.provided_share = Some(provided / tendered);
        }
        debug!(
            %tender_amount_kw,
            %provided_amount_kw,
            provided_share = ?self.provided_share,
            "Supply recorded"
        );
    }

    /// Provided amount over tendered amount across all recorded intervals
    pub fn provided_share(&self) -> Option<Decimal> {
        self.provided_share
    }

    pub fn supply_history(&self) -> &[SupplyRecord] {
        &self.supply
    }

    pub fn reset_supply(&mut self) {
        self.supply.clear();
        self.provided_share = None;
    }
}
