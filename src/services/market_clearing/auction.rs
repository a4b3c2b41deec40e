use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{MarketError, Result};
use crate::models::auction::{
    AuctionId, AuctionParameters, AuctionResult, AuctionStatus, AuctionSummary, AwardedOrder,
    Order,
};

/// Append-only container of the orders placed in one auction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderContainer {
    orders: Vec<Order>,
}

impl OrderContainer {
    pub fn add_order(&mut self, order: Order) {
        self.orders.push(order);
    }

    /// Orders in arrival order
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// Single auction: lifecycle state machine plus merit-order clearing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    id: AuctionId,
    params: AuctionParameters,
    status: AuctionStatus,
    order_container: OrderContainer,
    result: Option<AuctionResult>,
}

impl Auction {
    /// Create an auction and evaluate its status at `current_time`
    pub fn new(params: AuctionParameters, current_time: Option<i64>) -> Self {
        Self::with_id(Uuid::new_v4(), params, current_time)
    }

    pub fn with_id(id: AuctionId, params: AuctionParameters, current_time: Option<i64>) -> Self {
        let mut auction = Self {
            id,
            params,
            status: AuctionStatus::Pending,
            order_container: OrderContainer::default(),
            result: None,
        };
        auction.update_status(current_time);
        auction
    }

    pub fn id(&self) -> AuctionId {
        self.id
    }

    pub fn params(&self) -> &AuctionParameters {
        &self.params
    }

    pub fn status(&self) -> AuctionStatus {
        self.status
    }

    pub fn orders(&self) -> &[Order] {
        self.order_container.orders()
    }

    pub fn result(&self) -> Option<&AuctionResult> {
        self.result.as_ref()
    }

    pub fn summary(&self) -> AuctionSummary {
        AuctionSummary {
            id: self.id,
            status: self.status,
            params: self.params.clone(),
            order_count: self.order_container.len(),
        }
    }

    /// Status the parameters imply at `current_time`
    pub fn status_at(params: &AuctionParameters, current_time: Option<i64>) -> AuctionStatus {
        let Some(t) = current_time else {
            return AuctionStatus::Pending;
        };
        if params.gate_opening_time <= t && t < params.gate_closure_time {
            AuctionStatus::Open
        } else if params.gate_closure_time <= t && t < params.supply_end_time() {
            AuctionStatus::Closed
        } else if t >= params.supply_end_time() {
            AuctionStatus::Expired
        } else {
            AuctionStatus::Pending
        }
    }

    /// Move the status forward; a computed status behind the current one is ignored
    pub fn update_status(&mut self, current_time: Option<i64>) {
        let computed = Self::status_at(&self.params, current_time);
        if computed > self.status {
            debug!(
                auction_id = %self.id,
                from = %self.status,
                to = %computed,
                "Auction status transition"
            );
            self.status = computed;
        }
    }

    /// Advance to `current_time`, clearing once when the gate closes
    pub fn step(&mut self, current_time: i64) {
        if self.result.is_none()
            && self.status <= AuctionStatus::Open
            && current_time >= self.params.gate_closure_time
        {
            self.clear();
        }
        self.update_status(Some(current_time));
    }

    /// Append an order; only open auctions accept orders at or above the minimum amount
    pub fn place_order(
        &mut self,
        amount_kw: Decimal,
        price_ct: Decimal,
        agents: Vec<String>,
    ) -> Result<()> {
        if agents.is_empty() {
            return Err(MarketError::invalid_input("an order needs at least one agent"));
        }
        if self.status != AuctionStatus::Open {
            return Err(MarketError::AuctionNotOpen {
                auction_id: self.id,
                status: self.status,
            });
        }
        if amount_kw < self.params.minimum_order_amount_kw {
            return Err(MarketError::OrderBelowMinimum {
                amount_kw,
                minimum_kw: self.params.minimum_order_amount_kw,
            });
        }

        debug!(
            auction_id = %self.id,
            agents = ?agents,
            %amount_kw,
            %price_ct,
            "Order placed"
        );
        self.order_container.add_order(Order {
            agents,
            amount_kw,
            price_ct,
            auction_id: self.id,
        });
        Ok(())
    }

    /// Merit-order clearing: cheapest asks first until the tender is covered
    pub fn clear(&mut self) -> &AuctionResult {
        let mut sorted: Vec<&Order> = self.order_container.orders().iter().collect();
        // stable: equal prices keep arrival order
        sorted.sort_by(|a, b| a.price_ct.cmp(&b.price_ct));

        let tender = self.params.tender_amount_kw;
        let mut total_awarded = Decimal::ZERO;
        let mut awarded_orders = Vec::new();

        for order in sorted {
            let below_tender = total_awarded
                .checked_add(order.amount_kw)
                .is_some_and(|sum| sum < tender);
            if below_tender {
                total_awarded += order.amount_kw;
                awarded_orders.push(AwardedOrder::new(order.clone(), order.amount_kw));
            } else {
                let residual = (tender - total_awarded).max(Decimal::ZERO);
                if residual > Decimal::ZERO {
                    total_awarded += residual;
                    awarded_orders.push(AwardedOrder::new(order.clone(), residual));
                }
                break;
            }
        }
        debug_assert!(total_awarded <= tender.max(Decimal::ZERO));
        debug_assert!(awarded_orders
            .iter()
            .all(|o| o.awarded_amount_kw > Decimal::ZERO
                && o.awarded_amount_kw <= o.order.amount_kw));

        let clearing_price = awarded_orders.last().map(|o| o.order.price_ct);

        info!(
            auction_id = %self.id,
            supply_start_time = self.params.supply_start_time,
            orders = self.order_container.len(),
            awarded = awarded_orders.len(),
            %total_awarded,
            %tender,
            clearing_price = ?clearing_price,
            "Auction cleared"
        );
        crate::metrics::track_auction_cleared(
            &self.params.product_type,
            total_awarded.to_f64().unwrap_or_default(),
            clearing_price.and_then(|p| p.to_f64()),
        );

        let result = AuctionResult {
            auction_id: self.id,
            params: self.params.clone(),
            clearing_price,
            awarded_orders,
        };
        &*self.result.insert(result)
    }
}
