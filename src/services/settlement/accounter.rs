use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::types::{Contribution, PartyKey, Tranche};
use crate::error::{MarketError, Result};
use crate::models::auction::{AuctionResult, AwardedOrder};

/// Per-agent view of one auction result, used to price what was delivered
#[derive(Debug, Clone, Default)]
pub struct Accounter {
    result: Option<AuctionResult>,
    awarded_orders: BTreeMap<String, Vec<Contribution>>,
    party_tranches: BTreeMap<PartyKey, Vec<Tranche>>,
}

impl Accounter {
    pub fn new(result: Option<AuctionResult>) -> Self {
        let mut awarded_orders: BTreeMap<String, Vec<Contribution>> = BTreeMap::new();
        let mut party_tranches: BTreeMap<PartyKey, Vec<Tranche>> = BTreeMap::new();

        for awarded in result.iter().flat_map(|r| r.awarded_orders.iter()) {
            let order = &awarded.order;
            if order.agents.is_empty() {
                continue;
            }
            let party = PartyKey::from_agents(&order.agents);
            let share = awarded.awarded_amount_kw / Decimal::from(order.agents.len());

            for agent in &order.agents {
                awarded_orders
                    .entry(agent.clone())
                    .or_default()
                    .push(Contribution {
                        amount_kw: share,
                        price_ct: order.price_ct,
                        co_agents: order.agents.clone(),
                        party: party.clone(),
                    });
            }
            party_tranches.entry(party).or_default().push(Tranche {
                amount_kw: awarded.awarded_amount_kw,
                price_ct: order.price_ct,
            });
        }

        for contributions in awarded_orders.values_mut() {
            contributions.sort_by(|a, b| a.price_ct.cmp(&b.price_ct));
        }
        for tranches in party_tranches.values_mut() {
            tranches.sort_by(|a, b| a.price_ct.cmp(&b.price_ct));
        }

        Self {
            result,
            awarded_orders,
            party_tranches,
        }
    }

    pub fn result(&self) -> Option<&AuctionResult> {
        self.result.as_ref()
    }

    /// Agents with at least one contribution, sorted
    pub fn agents(&self) -> impl Iterator<Item = &str> {
        self.awarded_orders.keys().map(String::as_str)
    }

    /// Price-sorted contributions of `agent`
    pub fn contributions(&self, agent: &str) -> &[Contribution] {
        self.awarded_orders
            .get(agent)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn return_awarded_sum(&self, agent: &str) -> Decimal {
        self.contributions(agent).iter().map(|c| c.amount_kw).sum()
    }

    /// Payoff of `agent` for delivering `total_provided_amount_kw`
    pub fn calculate_payoff(
        &self,
        agent: &str,
        total_provided_amount_kw: Decimal,
    ) -> Result<Decimal> {
        price_ordered_payoff(
            self.contributions(agent).iter().map(|c| Tranche {
                amount_kw: c.amount_kw,
                price_ct: c.price_ct,
            }),
            total_provided_amount_kw,
        )
    }

    pub fn parties(&self) -> impl Iterator<Item = &PartyKey> {
        self.party_tranches.keys()
    }

    pub fn party_awarded_sum(&self, party: &PartyKey) -> Decimal {
        self.party_tranches
            .get(party)
            .map(|tranches| tranches.iter().map(|t| t.amount_kw).sum())
            .unwrap_or(Decimal::ZERO)
    }

    /// Payoff of a party as a whole, walking its orders at full awarded amounts
    pub fn calculate_party_payoff(&self, party: &PartyKey, provided_kw: Decimal) -> Result<Decimal> {
        price_ordered_payoff(
            self.party_tranches.get(party).into_iter().flatten().copied(),
            provided_kw,
        )
    }

    /// Nominal contribution of `agent` to each party it belongs to
    pub fn party_contributions(&self, agent: &str) -> BTreeMap<PartyKey, Decimal> {
        let mut by_party: BTreeMap<PartyKey, Decimal> = BTreeMap::new();
        for c in self.contributions(agent) {
            *by_party.entry(c.party.clone()).or_default() += c.amount_kw;
        }
        by_party
    }

    /// Split a party payoff to its members by nominal contribution
    pub fn split_party_payoff(
        &self,
        party: &PartyKey,
        payoff: Decimal,
    ) -> Result<Vec<(String, Decimal)>> {
        let weights: Vec<(String, Decimal)> = party
            .members()
            .iter()
            .map(|member| {
                let contribution = self
                    .contributions(member)
                    .iter()
                    .filter(|c| &c.party == party)
                    .map(|c| c.amount_kw)
                    .sum();
                (member.clone(), contribution)
            })
            .collect();
        pro_rata(payoff, &weights)
    }

    /// Split the payoff of a single order across its co-agents
    pub fn split_payoff(order: &AwardedOrder, payoff: Decimal) -> Result<Vec<(String, Decimal)>> {
        let agents = &order.order.agents;
        if agents.is_empty() {
            return Ok(Vec::new());
        }
        let share = order.awarded_amount_kw / Decimal::from(agents.len());
        let weights: Vec<(String, Decimal)> = agents.iter().map(|a| (a.clone(), share)).collect();
        pro_rata(payoff, &weights)
    }
}

/// Pay each tranche in full, cheapest first, while the delivered amount covers it,
/// then the fractional remainder at the next price.
pub fn price_ordered_payoff(
    tranches: impl IntoIterator<Item = Tranche>,
    provided_kw: Decimal,
) -> Result<Decimal> {
    let tranches: Vec<Tranche> = tranches.into_iter().collect();
    let total: Decimal = tranches.iter().map(|t| t.amount_kw).sum();

    if provided_kw <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let mut added = Decimal::ZERO;
    let mut payoff = Decimal::ZERO;
    for tranche in &tranches {
        if provided_kw >= total || added + tranche.amount_kw <= provided_kw {
            payoff = checked_add(payoff, checked_mul(tranche.price_ct, tranche.amount_kw)?)?;
            added += tranche.amount_kw;
        } else {
            let partial = checked_mul(tranche.price_ct, provided_kw - added)?;
            payoff = checked_add(payoff, partial)?;
            break;
        }
    }
    Ok(payoff)
}

pub(crate) fn checked_add(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| MarketError::invariant(format!("payoff overflow: {} + {}", a, b)))
}

pub(crate) fn checked_mul(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b)
        .ok_or_else(|| MarketError::invariant(format!("payoff overflow: {} * {}", a, b)))
}

/// Split `amount` by weight. The last member takes the rounding remainder so the
/// shares always add up to `amount`.
fn pro_rata(amount: Decimal, weights: &[(String, Decimal)]) -> Result<Vec<(String, Decimal)>> {
    let total: Decimal = weights.iter().map(|(_, w)| *w).sum();
    if total.is_zero() {
        return Ok(weights
            .iter()
            .map(|(agent, _)| (agent.clone(), Decimal::ZERO))
            .collect());
    }

    let mut shares = Vec::with_capacity(weights.len());
    let mut distributed = Decimal::ZERO;
    for (i, (agent, weight)) in weights.iter().enumerate() {
        let share = if i + 1 == weights.len() {
            amount - distributed
        } else {
            checked_mul(amount, *weight)? / total
        };
        distributed = checked_add(distributed, share)?;
        shares.push((agent.clone(), share));
    }
    Ok(shares)
}
