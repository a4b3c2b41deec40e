use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::auction::{AuctionId, AwardedOrder};
use super::unit::UnitInformation;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegistrationRequest {
    #[validate(length(min = 1, max = 64, message = "participant id must be 1-64 characters"))]
    pub participant_id: String,
}

/// Ask placed by a single registered actor
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderRequest {
    #[validate(length(min = 1, message = "actor id is required"))]
    pub actor_id: String,
    #[validate(custom(function = "validate_positive_amount"))]
    pub amount_kw: Decimal,
    #[validate(custom(function = "validate_price"))]
    pub price_ct: Decimal,
    pub supply_time: i64,
}

/// Ask jointly backed by several registered actors
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GroupOrderRequest {
    #[validate(length(min = 1, max = 32, message = "a group order needs 1-32 actors"))]
    pub actor_ids: Vec<String>,
    #[validate(custom(function = "validate_positive_amount"))]
    pub amount_kw: Decimal,
    #[validate(custom(function = "validate_price"))]
    pub price_ct: Decimal,
    pub supply_time: i64,
}

/// Largest accepted order amount in kW and absolute price in ct/kWh
const ORDER_VALUE_LIMIT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        let mut err = ValidationError::new("non_positive_amount");
        err.message = Some("amount must be greater than zero".into());
        return Err(err);
    }
    if *amount > ORDER_VALUE_LIMIT {
        let mut err = ValidationError::new("amount_out_of_range");
        err.message = Some(format!("amount must not exceed {} kW", ORDER_VALUE_LIMIT).into());
        return Err(err);
    }
    Ok(())
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.abs() > ORDER_VALUE_LIMIT {
        let mut err = ValidationError::new("price_out_of_range");
        err.message = Some(format!("price must be within +/-{} ct", ORDER_VALUE_LIMIT).into());
        return Err(err);
    }
    Ok(())
}

/// Answer to a successful registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub actor_id: String,
    pub participant_id: String,
    pub units: Vec<UnitInformation>,
}

/// Orders of one actor in one cleared auction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwardedOrdersView {
    pub auction_id: AuctionId,
    pub supply_start_time: i64,
    pub product_type: String,
    pub clearing_price: Option<Decimal>,
    pub orders: Vec<AwardedOrder>,
}
