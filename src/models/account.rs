use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One settled interval in an agent's ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub awarded_amount_kw: Decimal,
    pub provided_power_kw: Decimal,
    pub payoff: Decimal,
    /// Running balance including this transaction
    pub balance_after: Decimal,
}
