use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{MarketError, Result};
use crate::models::account::Transaction;

/// Append-only transaction log of one agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    owner: String,
    transactions: Vec<Transaction>,
}

impl Account {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            transactions: Vec::new(),
        }
    }

    /// Rebuild an account by re-applying the payoffs of an existing log
    pub fn replay(owner: impl Into<String>, transactions: &[Transaction]) -> Result<Self> {
        let mut account = Self::new(owner);
        for tx in transactions {
            account.add_transaction(tx.awarded_amount_kw, tx.provided_power_kw, tx.payoff)?;
        }
        Ok(account)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn add_transaction(
        &mut self,
        awarded_amount_kw: Decimal,
        provided_power_kw: Decimal,
        payoff: Decimal,
    ) -> Result<&Transaction> {
        let balance_after = self.balance().checked_add(payoff).ok_or_else(|| {
            MarketError::invariant(format!(
                "account {}: balance {} + payoff {} overflows",
                self.owner,
                self.balance(),
                payoff
            ))
        })?;
        debug!(
            owner = %self.owner,
            %awarded_amount_kw,
            %provided_power_kw,
            %payoff,
            %balance_after,
            "Transaction booked"
        );
        self.transactions.push(Transaction {
            awarded_amount_kw,
            provided_power_kw,
            payoff,
            balance_after,
        });
        Ok(&self.transactions[self.transactions.len() - 1])
    }

    /// Balance after the last transaction, zero for an empty log
    pub fn balance(&self) -> Decimal {
        self.transactions
            .last()
            .map(|tx| tx.balance_after)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Check `balance_after[i] == balance_after[i-1] + payoff[i]` over the whole log
    pub fn verify(&self) -> Result<()> {
        let mut running = Decimal::ZERO;
        for (i, tx) in self.transactions.iter().enumerate() {
            running = running.checked_add(tx.payoff).ok_or_else(|| {
                MarketError::invariant(format!(
                    "account {} transaction {}: running balance overflows",
                    self.owner, i
                ))
            })?;
            if tx.balance_after != running {
                return Err(MarketError::invariant(format!(
                    "account {} transaction {}: balance {} != expected {}",
                    self.owner, i, tx.balance_after, running
                )));
            }
        }
        Ok(())
    }
}

/// Accounts of every registered agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountStore {
    accounts: BTreeMap<String, Account>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the account of `owner`
    pub fn open_account(&mut self, owner: &str) -> &mut Account {
        self.accounts
            .entry(owner.to_string())
            .or_insert_with(|| Account::new(owner))
    }

    /// Book a transaction and return the new balance
    pub fn add_transaction(
        &mut self,
        owner: &str,
        awarded_amount_kw: Decimal,
        provided_power_kw: Decimal,
        payoff: Decimal,
    ) -> Result<Decimal> {
        self.open_account(owner)
            .add_transaction(awarded_amount_kw, provided_power_kw, payoff)
            .map(|tx| tx.balance_after)
    }

    pub fn account(&self, owner: &str) -> Option<&Account> {
        self.accounts.get(owner)
    }

    pub fn balance(&self, owner: &str) -> Option<Decimal> {
        self.accounts.get(owner).map(Account::balance)
    }

    pub fn transactions(&self, owner: &str) -> Option<&[Transaction]> {
        self.accounts.get(owner).map(Account::transactions)
    }

    pub fn balances(&self) -> BTreeMap<String, Decimal> {
        self.accounts
            .iter()
            .map(|(owner, account)| (owner.clone(), account.balance()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn verify(&self) -> Result<()> {
        self.accounts.values().try_for_each(Account::verify)
    }

    pub fn reset(&mut self) {
        self.accounts.clear();
    }
}
