use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::SimulationConfig;
use crate::error::{MarketError, Result};
use crate::metrics;
use crate::models::{
    AuctionId, AuctionResult, AuctionSummary, AwardedOrdersView, GroupOrderRequest, OrderRequest,
    Registration, Transaction, UnitInformation, UnitInput,
};
use crate::services::dispatch::pool::allocate_default_actor_units;
use crate::services::dispatch::UnitPool;
use crate::services::general_demand::GeneralDemand;
use crate::services::ledger::AccountStore;
use crate::services::market_clearing::{Auction, Market, MarketInputs, MarketStepSummary};
use crate::services::persistence::SimulationSnapshot;
use crate::services::settlement::{Accounter, SettlementEntry, SettlementService};

/// Outcome of the unit phase of one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitPhaseReport {
    pub entries: Vec<SettlementEntry>,
    /// Actors whose dispatch failed; they are settled with zero delivery
    pub failed_actors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub step: u64,
    pub current_time: i64,
    pub market: MarketStepSummary,
    pub units: UnitPhaseReport,
    /// Phases that aborted with an error this tick
    pub failed_phases: Vec<&'static str>,
}

/// Owns the whole simulation state and the simulated clock
#[derive(Debug)]
pub struct SimulationController {
    config: SimulationConfig,
    market: Market,
    accounts: AccountStore,
    unit_pool: UnitPool,
    general_demand: GeneralDemand,
    settlement: SettlementService,
    /// actor id -> participant id
    registered: BTreeMap<String, String>,
    step: u64,
    registration_open: bool,
}

impl SimulationController {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            market: Market::new(),
            accounts: AccountStore::new(),
            unit_pool: UnitPool::new(),
            general_demand: GeneralDemand::default(),
            settlement: SettlementService::new(),
            registered: BTreeMap::new(),
            step: 0,
            registration_open: true,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn general_demand(&self) -> &GeneralDemand {
        &self.general_demand
    }

    pub fn registered(&self) -> &BTreeMap<String, String> {
        &self.registered
    }

    pub fn step_index(&self) -> u64 {
        self.step
    }

    /// Simulated seconds since the start of the run
    pub fn current_time(&self) -> i64 {
        self.step as i64 * self.config.step_size_s
    }

    pub fn is_registration_open(&self) -> bool {
        self.config.test_mode || self.registration_open
    }

    pub fn close_registration(&mut self) {
        if self.registration_open {
            info!(actors = self.registered.len(), "Registration closed");
        }
        self.registration_open = false;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.config.pause = paused;
    }

    pub fn register_actor(&mut self, participant_id: &str) -> Result<Registration> {
        if !self.is_registration_open() {
            metrics::track_registration(false);
            return Err(MarketError::RegistrationClosed);
        }
        if self.registered.values().any(|p| p == participant_id) {
            metrics::track_registration(false);
            return Err(MarketError::AlreadyRegistered(participant_id.to_string()));
        }

        let actor_id = Uuid::new_v4().to_string();
        let root = allocate_default_actor_units(&actor_id)?;
        let units = root.read_information();
        self.unit_pool.insert_actor_root(&actor_id, root);
        self.accounts.open_account(&actor_id);
        self.registered
            .insert(actor_id.clone(), participant_id.to_string());
        self.general_demand
            .set_number_of_actors(self.registered.len());

        info!(%participant_id, %actor_id, "Participant registered");
        metrics::track_registration(true);
        Ok(Registration {
            actor_id,
            participant_id: participant_id.to_string(),
            units,
        })
    }

    /// Market phase: publish this tick's auction and advance every auction.
    ///
    /// The market is stepped even when publishing fails; the publish error is
    /// returned afterwards.
    #[instrument(skip(self), fields(step = self.step))]
    pub fn step_market(&mut self) -> Result<MarketStepSummary> {
        let now = self.current_time();
        let auction_config = &self.config.auction;
        let supply_step = (now + auction_config.supply_start_offset_s) / self.config.step_size_s;
        let tender = self
            .general_demand
            .tender_amount_kw(supply_step.max(0) as usize);

        let auction = Auction::new(auction_config.parameters_at(now, tender), Some(now));
        let published = self.market.receive_auction(auction);

        self.market
            .set_inputs(MarketInputs::at(now, self.config.step_size_s));
        let summary = self.market.step();
        published.map(|_| summary)
    }

    /// Unit phase: dispatch every actor to its award and settle what it delivered
    #[instrument(skip(self), fields(step = self.step))]
    pub fn step_units(&mut self) -> Result<UnitPhaseReport> {
        let now = self.current_time();
        let accounter = Accounter::new(self.market.result_covering(now).cloned());
        let step_index = self.step as usize;
        let delta_t_s = self.config.step_size_s as f64;

        let mut deliveries = BTreeMap::new();
        let mut failed_actors = Vec::new();
        for actor_id in self.registered.keys() {
            let setpoint = accounter.return_awarded_sum(actor_id);
            let input = UnitInput::new(delta_t_s, setpoint.to_f64().unwrap_or_default(), 0.0);

            let provided = self
                .unit_pool
                .step_actor(actor_id, &input, step_index)
                .and_then(|realized| to_kw(realized.p_kw));
            let provided = match provided {
                Ok(provided) => provided,
                Err(err) => {
                    error!(%actor_id, error = %err, "Dispatch failed, settling zero delivery");
                    failed_actors.push(actor_id.clone());
                    Decimal::ZERO
                }
            };
            deliveries.insert(actor_id.clone(), provided);
        }

        let entries = self.settlement.settle(&accounter, &deliveries)?;
        self.settlement.book(&entries, &mut self.accounts)?;

        if let Some(result) = accounter.result() {
            let supplied: Decimal = entries
                .iter()
                .map(|e| e.provided_power_kw.max(Decimal::ZERO).min(e.awarded_amount_kw))
                .sum();
            self.general_demand
                .notify_supply(result.params.tender_amount_kw, supplied);
        }

        Ok(UnitPhaseReport {
            entries,
            failed_actors,
        })
    }

    /// Run the market phase then the unit phase and advance the clock
    #[instrument(skip(self), fields(step = self.step, current_time = self.current_time()))]
    pub fn tick(&mut self) -> TickReport {
        let step = self.step;
        let current_time = self.current_time();

        let mut failed_phases = Vec::new();

        let started = Instant::now();
        let market = match self.step_market() {
            Ok(summary) => summary,
            Err(err) => {
                error!(error = %err, code = err.code().code(), "Market phase failed");
                failed_phases.push("market");
                MarketStepSummary {
                    current_time,
                    open: self.market.open_auctions().len(),
                    ..MarketStepSummary::default()
                }
            }
        };
        metrics::track_phase(
            "market",
            started.elapsed().as_secs_f64(),
            !failed_phases.contains(&"market"),
        );

        let started = Instant::now();
        let units = match self.step_units() {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, code = err.code().code(), "Unit phase failed, nothing booked");
                failed_phases.push("units");
                UnitPhaseReport::default()
            }
        };
        metrics::track_phase(
            "units",
            started.elapsed().as_secs_f64(),
            units.failed_actors.is_empty() && !failed_phases.contains(&"units"),
        );
        if !units.failed_actors.is_empty() {
            warn!(failed = units.failed_actors.len(), "Unit phase completed with failures");
        }

        self.step += 1;
        info!(
            open_auctions = market.open,
            closed = market.closed.len(),
            settled = units.entries.len(),
            "Tick complete"
        );
        TickReport {
            step,
            current_time,
            market,
            units,
            failed_phases,
        }
    }

    fn ensure_registered(&self, actor_id: &str) -> Result<()> {
        if self.registered.contains_key(actor_id) {
            Ok(())
        } else {
            Err(MarketError::UnknownParticipant(actor_id.to_string()))
        }
    }

    pub fn open_auctions(&self) -> Vec<AuctionSummary> {
        self.market.open_auctions()
    }

    pub fn receive_order(&mut self, request: &OrderRequest) -> Result<AuctionId> {
        let placed = request
            .validate()
            .map_err(MarketError::from)
            .and_then(|_| self.ensure_registered(&request.actor_id))
            .and_then(|_| {
                self.market.receive_order(
                    request.amount_kw,
                    request.price_ct,
                    vec![request.actor_id.clone()],
                    request.supply_time,
                    &self.config.auction.product_type,
                    None,
                )
            });
        self.track_order(placed, false)
    }

    pub fn receive_group_order(&mut self, request: &GroupOrderRequest) -> Result<AuctionId> {
        let placed = request
            .validate()
            .map_err(MarketError::from)
            .and_then(|_| {
                request
                    .actor_ids
                    .iter()
                    .try_for_each(|actor| self.ensure_registered(actor))
            })
            .and_then(|_| {
                self.market.receive_order(
                    request.amount_kw,
                    request.price_ct,
                    request.actor_ids.clone(),
                    request.supply_time,
                    &self.config.auction.product_type,
                    None,
                )
            });
        self.track_order(placed, true)
    }

    fn track_order(&self, placed: Result<AuctionId>, group: bool) -> Result<AuctionId> {
        match &placed {
            Ok(_) => metrics::track_order_accepted(&self.config.auction.product_type, group),
            Err(err) => {
                err.log();
                metrics::track_order_rejected(err.code());
            }
        }
        placed
    }

    /// Orders of `actor_id` in the currently published results
    pub fn awarded_orders(&self, actor_id: &str) -> Result<Vec<AwardedOrdersView>> {
        self.ensure_registered(actor_id)?;
        Ok(self
            .market
            .current_results()
            .iter()
            .filter_map(|result| {
                let orders: Vec<_> = result
                    .awarded_orders
                    .iter()
                    .filter(|o| o.order.involves(actor_id))
                    .cloned()
                    .collect();
                (!orders.is_empty()).then(|| AwardedOrdersView {
                    auction_id: result.auction_id,
                    supply_start_time: result.params.supply_start_time,
                    product_type: result.params.product_type.clone(),
                    clearing_price: result.clearing_price,
                    orders,
                })
            })
            .collect())
    }

    pub fn current_auction_results(&self) -> BTreeMap<String, AuctionResult> {
        self.market.current_auction_results()
    }

    pub fn balance(&self, actor_id: &str) -> Result<Decimal> {
        self.accounts
            .balance(actor_id)
            .ok_or_else(|| MarketError::UnknownParticipant(actor_id.to_string()))
    }

    pub fn transactions(&self, actor_id: &str) -> Result<Vec<Transaction>> {
        self.accounts
            .transactions(actor_id)
            .map(<[Transaction]>::to_vec)
            .ok_or_else(|| MarketError::UnknownParticipant(actor_id.to_string()))
    }

    /// Scoreboard: balance of every registered participant
    pub fn balances(&self) -> BTreeMap<String, Decimal> {
        self.registered
            .iter()
            .map(|(actor, participant)| {
                (
                    participant.clone(),
                    self.accounts.balance(actor).unwrap_or_default(),
                )
            })
            .collect()
    }

    pub fn unit_information(&self, actor_id: &str) -> Result<Vec<UnitInformation>> {
        self.unit_pool
            .read_information(actor_id)
            .ok_or_else(|| MarketError::UnknownParticipant(actor_id.to_string()))
    }

    /// Demand of the actor's loads for the next `len` steps
    pub fn load_forecast(&self, actor_id: &str, len: usize) -> Result<Vec<f64>> {
        self.unit_pool
            .root(actor_id)
            .map(|root| root.load_forecast(self.step as usize, len))
            .ok_or_else(|| MarketError::UnknownParticipant(actor_id.to_string()))
    }

    pub fn reset(&mut self) {
        info!("Simulation reset");
        self.market.reset();
        self.accounts.reset();
        self.unit_pool.reset();
        self.general_demand = GeneralDemand::default();
        self.registered.clear();
        self.step = 0;
        self.registration_open = true;
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            config: self.config.clone(),
            registered: self.registered.clone(),
            step: self.step,
            registration_open: self.registration_open,
            market: self.market.clone(),
            accounts: self.accounts.clone(),
            unit_pool: self.unit_pool.snapshot(),
            general_demand: self.general_demand.clone(),
        }
    }

    pub fn from_snapshot(snapshot: SimulationSnapshot) -> Result<Self> {
        snapshot.accounts.verify()?;
        Ok(Self {
            unit_pool: UnitPool::from_snapshot(snapshot.unit_pool)?,
            config: snapshot.config,
            market: snapshot.market,
            accounts: snapshot.accounts,
            general_demand: snapshot.general_demand,
            settlement: SettlementService::new(),
            registered: snapshot.registered,
            step: snapshot.step,
            registration_open: snapshot.registration_open,
        })
    }
}

fn to_kw(p_kw: f64) -> Result<Decimal> {
    Decimal::from_f64(p_kw)
        .map(|d| d.round_dp(6))
        .ok_or_else(|| MarketError::InvalidAmount(format!("realized power {} is not finite", p_kw)))
}
