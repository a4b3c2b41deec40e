pub mod accounter;
pub mod types;

pub use accounter::{price_ordered_payoff, Accounter};
pub use types::*;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::error::Result;
use crate::services::ledger::AccountStore;
use accounter::{checked_add, checked_mul};

/// Turns realized deliveries into payoffs and books them into the ledgers
#[derive(Debug, Clone, Default)]
pub struct SettlementService;

impl SettlementService {
    pub fn new() -> Self {
        Self
    }

    /// Settle one tick.
    ///
    /// `deliveries` maps every agent to settle onto the power it actually
    /// delivered. Each agent's delivery is apportioned over the parties it
    /// belongs to by its nominal contribution, every party is paid as a whole
    /// and the party payoff is split back to the members pro rata.
    ///
    /// A party whose members all delivered at least their award is paid for
    /// its full awarded amount, so uneven contributions never round it short.
    pub fn settle(
        &self,
        accounter: &Accounter,
        deliveries: &BTreeMap<String, Decimal>,
    ) -> Result<Vec<SettlementEntry>> {
        let mut party_provided: BTreeMap<PartyKey, Decimal> = BTreeMap::new();
        let mut fully_delivered: BTreeSet<&str> = BTreeSet::new();
        for (agent, provided) in deliveries {
            let awarded = accounter.return_awarded_sum(agent);
            if awarded <= Decimal::ZERO {
                continue;
            }
            let delivered = (*provided).max(Decimal::ZERO);
            if delivered >= awarded {
                fully_delivered.insert(agent.as_str());
            }
            for (party, contribution) in accounter.party_contributions(agent) {
                let share = checked_mul(delivered, contribution)? / awarded;
                let entry = party_provided.entry(party).or_default();
                *entry = checked_add(*entry, share)?;
            }
        }

        let mut shares: BTreeMap<String, Vec<PartyShare>> = BTreeMap::new();
        for party in accounter.parties() {
            let awarded_kw = accounter.party_awarded_sum(party);
            let provided_kw = if party
                .members()
                .iter()
                .all(|m| fully_delivered.contains(m.as_str()))
            {
                awarded_kw
            } else {
                party_provided.get(party).copied().unwrap_or_default()
            };
            let party_payoff = accounter.calculate_party_payoff(party, provided_kw)?;
            debug!(
                %party,
                %provided_kw,
                %awarded_kw,
                %party_payoff,
                "Party settled"
            );
            for (member, payoff) in accounter.split_party_payoff(party, party_payoff)? {
                shares.entry(member).or_default().push(PartyShare {
                    party: party.clone(),
                    provided_kw,
                    payoff,
                });
            }
        }

        deliveries
            .iter()
            .map(|(agent, provided)| {
                let parties = shares.remove(agent).unwrap_or_default();
                let payoff = parties
                    .iter()
                    .try_fold(Decimal::ZERO, |acc, s| checked_add(acc, s.payoff))?;
                Ok(SettlementEntry {
                    agent: agent.clone(),
                    awarded_amount_kw: accounter.return_awarded_sum(agent),
                    provided_power_kw: *provided,
                    payoff,
                    parties,
                })
            })
            .collect()
    }

    /// Append one transaction per entry; returns the total payoff booked.
    ///
    /// Every resulting balance is checked first, so an overflow leaves the
    /// ledger untouched.
    pub fn book(&self, entries: &[SettlementEntry], ledger: &mut AccountStore) -> Result<Decimal> {
        let mut total = Decimal::ZERO;
        for entry in entries {
            let balance = ledger.balance(&entry.agent).unwrap_or_default();
            checked_add(balance, entry.payoff)?;
            total = checked_add(total, entry.payoff)?;
        }
        for entry in entries {
            ledger.add_transaction(
                &entry.agent,
                entry.awarded_amount_kw,
                entry.provided_power_kw,
                entry.payoff,
            )?;
        }
        info!(agents = entries.len(), total_payoff = %total, "Settlement booked");
        crate::metrics::track_settlement(entries.len(), total.to_f64().unwrap_or_default());
        Ok(total)
    }
}
