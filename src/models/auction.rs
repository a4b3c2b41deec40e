use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AuctionId = Uuid;

/// Auction lifecycle status, ordered so that transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    Pending,
    Open,
    Closed,
    Expired,
}

impl std::fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Immutable description of one auction. Times are simulated seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionParameters {
    pub product_type: String,
    pub gate_opening_time: i64,
    pub gate_closure_time: i64,
    pub supply_start_time: i64,
    pub supply_duration_s: i64,
    pub tender_amount_kw: Decimal,
    pub minimum_order_amount_kw: Decimal,
}

impl AuctionParameters {
    pub fn supply_end_time(&self) -> i64 {
        self.supply_start_time + self.supply_duration_s
    }

    /// Key under which results are published, e.g. `4500_electricity`
    pub fn result_key(&self) -> String {
        format!("{}_{}", self.supply_start_time, self.product_type)
    }

    /// Whether `current_time` falls inside the supply window
    pub fn covers(&self, current_time: i64) -> bool {
        self.supply_start_time <= current_time && current_time < self.supply_end_time()
    }
}

/// An ask backed by one agent, or jointly by several (a group order)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub agents: Vec<String>,
    pub amount_kw: Decimal,
    pub price_ct: Decimal,
    pub auction_id: AuctionId,
}

impl Order {
    pub fn is_group(&self) -> bool {
        self.agents.len() > 1
    }

    pub fn involves(&self, agent: &str) -> bool {
        self.agents.iter().any(|a| a == agent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwardedOrder {
    #[serde(flatten)]
    pub order: Order,
    pub awarded_amount_kw: Decimal,
}

impl AwardedOrder {
    pub fn new(order: Order, awarded_amount_kw: Decimal) -> Self {
        Self {
            order,
            awarded_amount_kw,
        }
    }
}

/// Outcome of clearing an auction, created once at gate closure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionResult {
    pub auction_id: AuctionId,
    pub params: AuctionParameters,
    pub clearing_price: Option<Decimal>,
    pub awarded_orders: Vec<AwardedOrder>,
}

impl AuctionResult {
    pub fn total_awarded_kw(&self) -> Decimal {
        self.awarded_orders.iter().map(|o| o.awarded_amount_kw).sum()
    }
}

/// Read projection of a live auction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionSummary {
    pub id: AuctionId,
    pub status: AuctionStatus,
    pub params: AuctionParameters,
    pub order_count: usize,
}
