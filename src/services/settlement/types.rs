use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The agents jointly backing an order, sorted and de-duplicated.
/// A solo order's party has exactly one member.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartyKey(Vec<String>);

impl PartyKey {
    pub fn from_agents(agents: &[String]) -> Self {
        let mut members = agents.to_vec();
        members.sort();
        members.dedup();
        Self(members)
    }

    pub fn members(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, agent: &str) -> bool {
        self.0.iter().any(|m| m == agent)
    }
}

impl std::fmt::Display for PartyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("+"))
    }
}

/// One agent's nominal share of an awarded order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub amount_kw: Decimal,
    pub price_ct: Decimal,
    pub co_agents: Vec<String>,
    pub party: PartyKey,
}

/// Awarded quantity at one price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tranche {
    pub amount_kw: Decimal,
    pub price_ct: Decimal,
}

/// Settlement of one party as seen by one member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyShare {
    pub party: PartyKey,
    pub provided_kw: Decimal,
    pub payoff: Decimal,
}

/// Everything booked for one agent in one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementEntry {
    pub agent: String,
    pub awarded_amount_kw: Decimal,
    pub provided_power_kw: Decimal,
    pub payoff: Decimal,
    pub parties: Vec<PartyShare>,
}
