use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::auction::Auction;
use crate::error::{MarketError, Result};
use crate::models::auction::{AuctionId, AuctionResult, AuctionStatus, AuctionSummary};

/// Externally supplied clock for one market step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketInputs {
    pub now: DateTime<Utc>,
    pub step_size_s: i64,
}

impl MarketInputs {
    /// Inputs for simulated second `current_time`
    pub fn at(current_time: i64, step_size_s: i64) -> Self {
        Self {
            now: DateTime::from_timestamp(current_time, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            step_size_s,
        }
    }

    pub fn current_time(&self) -> i64 {
        self.now.timestamp()
    }
}

impl Default for MarketInputs {
    fn default() -> Self {
        Self::at(0, 900)
    }
}

/// What changed during one market step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketStepSummary {
    pub current_time: i64,
    pub open: usize,
    pub closed: Vec<AuctionId>,
    pub expired: Vec<AuctionId>,
}

/// Owns every live auction and routes orders to them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Market {
    inputs: MarketInputs,
    /// Live auctions in insertion order
    auctions: Vec<Auction>,
    open_auctions: Vec<AuctionId>,
    current_auction_results: Vec<AuctionResult>,
    expired_auctions: Vec<Auction>,
}

impl Market {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_inputs(&mut self, inputs: MarketInputs) {
        self.inputs = inputs;
    }

    pub fn inputs(&self) -> &MarketInputs {
        &self.inputs
    }

    /// Insert an auction. Returns `false` when the id is already known.
    pub fn receive_auction(&mut self, auction: Auction) -> Result<bool> {
        if self.auction(auction.id()).is_some() {
            debug!(auction_id = %auction.id(), "Auction already known, ignoring");
            return Ok(false);
        }
        let params = auction.params();
        if self
            .find_auction_id(params.supply_start_time, &params.product_type)
            .is_some()
        {
            return Err(MarketError::AuctionConflict {
                supply_time: params.supply_start_time,
                product_type: params.product_type.clone(),
            });
        }

        info!(
            auction_id = %auction.id(),
            product_type = %params.product_type,
            supply_start_time = params.supply_start_time,
            tender_amount_kw = %params.tender_amount_kw,
            status = %auction.status(),
            "Auction received"
        );
        if auction.status() == AuctionStatus::Open {
            self.open_auctions.push(auction.id());
        }
        self.auctions.push(auction);
        Ok(true)
    }

    /// Advance every live auction to the current input time and re-bucket them
    pub fn step(&mut self) -> MarketStepSummary {
        let current_time = self.inputs.current_time();
        let mut summary = MarketStepSummary {
            current_time,
            ..MarketStepSummary::default()
        };

        let mut live = Vec::with_capacity(self.auctions.len());
        self.open_auctions.clear();
        self.current_auction_results.clear();

        for mut auction in std::mem::take(&mut self.auctions) {
            let before = auction.status();
            auction.step(current_time);

            match auction.status() {
                AuctionStatus::Pending => live.push(auction),
                AuctionStatus::Open => {
                    self.open_auctions.push(auction.id());
                    live.push(auction);
                }
                AuctionStatus::Closed => {
                    if before < AuctionStatus::Closed {
                        summary.closed.push(auction.id());
                    }
                    if let Some(result) = auction.result() {
                        self.current_auction_results.push(result.clone());
                    }
                    live.push(auction);
                }
                AuctionStatus::Expired => {
                    debug!(auction_id = %auction.id(), "Auction expired, archiving");
                    summary.expired.push(auction.id());
                    self.expired_auctions.push(auction);
                }
            }
        }

        self.auctions = live;
        summary.open = self.open_auctions.len();
        summary
    }

    /// Place an order, resolving the auction by supply time when no id is given
    pub fn receive_order(
        &mut self,
        amount_kw: Decimal,
        price_ct: Decimal,
        agents: Vec<String>,
        supply_time: i64,
        product_type: &str,
        auction_id: Option<AuctionId>,
    ) -> Result<AuctionId> {
        let id = match auction_id {
            Some(id) => id,
            None => self
                .find_auction_id(supply_time, product_type)
                .ok_or_else(|| MarketError::AuctionNotFound {
                    supply_time,
                    product_type: product_type.to_string(),
                })?,
        };

        let auction = self
            .auctions
            .iter_mut()
            .find(|a| a.id() == id)
            .ok_or(MarketError::UnknownAuction(id))?;
        auction.place_order(amount_kw, price_ct, agents)?;
        Ok(id)
    }

    /// Live auction with the given supply start and product
    pub fn find_auction_id(&self, supply_time: i64, product_type: &str) -> Option<AuctionId> {
        self.auctions
            .iter()
            .find(|a| {
                a.params().supply_start_time == supply_time
                    && a.params().product_type == product_type
            })
            .map(Auction::id)
    }

    pub fn auction(&self, id: AuctionId) -> Option<&Auction> {
        self.auctions.iter().find(|a| a.id() == id)
    }

    pub fn auctions(&self) -> &[Auction] {
        &self.auctions
    }

    pub fn open_auctions(&self) -> Vec<AuctionSummary> {
        self.open_auctions
            .iter()
            .filter_map(|id| self.auction(*id))
            .map(Auction::summary)
            .collect()
    }

    /// Results of the auctions that are closed as of the last step
    pub fn current_results(&self) -> &[AuctionResult] {
        &self.current_auction_results
    }

    /// Results keyed by `{supply_start_time}_{product_type}`
    pub fn current_auction_results(&self) -> BTreeMap<String, AuctionResult> {
        self.current_auction_results
            .iter()
            .map(|r| (r.params.result_key(), r.clone()))
            .collect()
    }

    /// Cleared result whose supply window contains `current_time`
    pub fn result_covering(&self, current_time: i64) -> Option<&AuctionResult> {
        self.current_auction_results
            .iter()
            .find(|r| r.params.covers(current_time))
    }

    pub fn expired_auctions(&self) -> &[Auction] {
        &self.expired_auctions
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
