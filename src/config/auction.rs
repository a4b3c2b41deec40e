use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::auction::AuctionParameters;

/// Timing and size template for the auction created every tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_auction_windows"))]
pub struct AuctionConfig {
    /// Product tag used to route orders (default: "electricity")
    #[validate(length(min = 1, max = 64))]
    pub product_type: String,

    /// Gate opening relative to the creation time (default: 0)
    pub gate_opening_offset_s: i64,

    /// Gate closure relative to the creation time (default: 3600)
    pub gate_closure_offset_s: i64,

    /// Supply start relative to the creation time (default: 4500)
    pub supply_start_offset_s: i64,

    /// Length of the supply window (default: 900)
    #[validate(range(min = 1))]
    pub supply_duration_s: i64,

    /// Smallest accepted order (default: 1 kW)
    pub minimum_order_amount_kw: Decimal,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            product_type: "electricity".to_string(),
            gate_opening_offset_s: 0,
            gate_closure_offset_s: 3600,
            supply_start_offset_s: 4500,
            supply_duration_s: 900,
            minimum_order_amount_kw: Decimal::ONE,
        }
    }
}

impl AuctionConfig {
    /// Parameters of the auction created at `current_time`
    pub fn parameters_at(&self, current_time: i64, tender_amount_kw: Decimal) -> AuctionParameters {
        AuctionParameters {
            product_type: self.product_type.clone(),
            gate_opening_time: current_time + self.gate_opening_offset_s,
            gate_closure_time: current_time + self.gate_closure_offset_s,
            supply_start_time: current_time + self.supply_start_offset_s,
            supply_duration_s: self.supply_duration_s,
            tender_amount_kw,
            minimum_order_amount_kw: self.minimum_order_amount_kw,
        }
    }
}

fn validate_auction_windows(config: &AuctionConfig) -> Result<(), ValidationError> {
    if config.gate_closure_offset_s <= config.gate_opening_offset_s {
        return Err(ValidationError::new("gate_closure_before_opening"));
    }
    if config.supply_start_offset_s < config.gate_closure_offset_s {
        return Err(ValidationError::new("supply_starts_before_gate_closure"));
    }
    if config.minimum_order_amount_kw.is_sign_negative() {
        return Err(ValidationError::new("negative_minimum_order_amount"));
    }
    Ok(())
}
