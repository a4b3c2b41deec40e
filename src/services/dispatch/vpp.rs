use tracing::trace;

use super::Resource;
use crate::error::{MarketError, Result};
use crate::models::unit::{StrategyKind, UnitInput, UnitResult};

/// How a composite turns its setpoint into setpoints for its children
pub trait DispatchStrategy: std::fmt::Debug + Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn dispatch(&self, input: &UnitInput, units: &mut [Resource], step: usize)
        -> Result<UnitResult>;
}

/// Every child receives the commanded setpoint; outputs are summed
#[derive(Debug, Default)]
pub struct SumAllStrategy;

impl DispatchStrategy for SumAllStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SumAll
    }

    fn dispatch(
        &self,
        input: &UnitInput,
        units: &mut [Resource],
        step: usize,
    ) -> Result<UnitResult> {
        let mut total = UnitResult::default();
        for unit in units.iter_mut() {
            total += unit.step(input, step)?;
        }
        Ok(total)
    }
}

/// Fixed children report first; adjustable children absorb the residual in order
#[derive(Debug, Default)]
pub struct BatteryAdjustStrategy;

impl DispatchStrategy for BatteryAdjustStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AdjustViaBatteries
    }

    fn dispatch(
        &self,
        input: &UnitInput,
        units: &mut [Resource],
        step: usize,
    ) -> Result<UnitResult> {
        let mut total = UnitResult::default();
        for unit in units.iter_mut().filter(|u| !u.is_adjustable()) {
            total += unit.step(input, step)?;
        }
        for unit in units.iter_mut().filter(|u| u.is_adjustable()) {
            let residual = input.with_setpoint(input.p_kw - total.p_kw, input.q_kvar - total.q_kvar);
            trace!(unit_id = unit.id(), residual_kw = residual.p_kw, "Residual dispatched");
            total += unit.step(&residual, step)?;
        }
        Ok(total)
    }
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn DispatchStrategy> {
        match self {
            StrategyKind::SumAll => Box::new(SumAllStrategy),
            StrategyKind::AdjustViaBatteries => Box::new(BatteryAdjustStrategy),
        }
    }
}

/// Virtual power plant: an ordered set of uniquely named child resources
#[derive(Debug)]
pub struct Vpp {
    id: String,
    strategy: Box<dyn DispatchStrategy>,
    units: Vec<Resource>,
}

impl Vpp {
    pub fn new(id: impl Into<String>, strategy: StrategyKind) -> Self {
        Self {
            id: id.into(),
            strategy: strategy.build(),
            units: Vec::new(),
        }
    }

    pub fn with_units(
        id: impl Into<String>,
        strategy: StrategyKind,
        units: impl IntoIterator<Item = Resource>,
    ) -> Result<Self> {
        let mut vpp = Self::new(id, strategy);
        for unit in units {
            vpp.add_unit(unit)?;
        }
        Ok(vpp)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn add_unit(&mut self, unit: Resource) -> Result<()> {
        if self.unit(unit.id()).is_some() {
            return Err(MarketError::invalid_input(format!(
                "unit '{}' already exists in '{}'",
                unit.id(),
                self.id
            )));
        }
        self.units.push(unit);
        Ok(())
    }

    pub fn unit(&self, id: &str) -> Option<&Resource> {
        self.units.iter().find(|u| u.id() == id)
    }

    pub fn units(&self) -> &[Resource] {
        &self.units
    }

    pub fn is_adjustable(&self) -> bool {
        self.units.iter().any(Resource::is_adjustable)
    }

    pub fn step(&mut self, input: &UnitInput, step: usize) -> Result<UnitResult> {
        self.strategy.dispatch(input, &mut self.units, step)
    }
}
