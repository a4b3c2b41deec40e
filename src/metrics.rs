use ::metrics::{counter, gauge, histogram};

use crate::error::ErrorCode;

/// Track an accepted order
pub fn track_order_accepted(product_type: &str, group: bool) {
    counter!(
        "orders_accepted_total",
        "product" => product_type.to_string(),
        "group" => group.to_string()
    )
    .increment(1);
}

/// Track a rejected order by reason code
pub fn track_order_rejected(code: ErrorCode) {
    counter!("orders_rejected_total", "reason" => format!("{:?}", code)).increment(1);
}

/// Track an auction clearing
pub fn track_auction_cleared(product_type: &str, awarded_kw: f64, clearing_price: Option<f64>) {
    counter!("auctions_cleared_total", "product" => product_type.to_string()).increment(1);
    histogram!("auction_awarded_kw", "product" => product_type.to_string()).record(awarded_kw);
    if let Some(price) = clearing_price {
        gauge!("auction_clearing_price_ct", "product" => product_type.to_string()).set(price);
    }
}

/// Track the duration and outcome of a tick phase
pub fn track_phase(phase: &str, duration_secs: f64, success: bool) {
    histogram!("tick_phase_duration_seconds", "phase" => phase.to_string()).record(duration_secs);
    counter!(
        "tick_phases_total",
        "phase" => phase.to_string(),
        "success" => success.to_string()
    )
    .increment(1);
}

/// Track money booked into the ledgers
pub fn track_settlement(agents: usize, total_payoff: f64) {
    counter!("settlement_transactions_total").increment(agents as u64);
    histogram!("settlement_payoff_total_ct").record(total_payoff);
}

/// Track a registration attempt
pub fn track_registration(success: bool) {
    counter!("registrations_total", "success" => success.to_string()).increment(1);
}
