use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::actor::SimulationHandle;
use crate::error::{MarketError, Result};
use crate::models::OrderRequest;

/// Participant placing random asks, used to exercise unattended runs
#[derive(Debug)]
pub struct VirtualBiddingAgent {
    participant_id: String,
    actor_id: Option<String>,
    /// Supply start of the newest auction already bid on
    last_supply_time: Option<i64>,
    rng: StdRng,
}

impl VirtualBiddingAgent {
    pub fn new(participant_id: impl Into<String>, seed: u64) -> Self {
        Self {
            participant_id: participant_id.into(),
            actor_id: None,
            last_supply_time: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    pub async fn register(&mut self, handle: &SimulationHandle) -> Result<()> {
        let registration = handle.register_actor(&self.participant_id).await?;
        info!(
            participant_id = %self.participant_id,
            actor_id = %registration.actor_id,
            "Virtual bidder registered"
        );
        self.actor_id = Some(registration.actor_id);
        Ok(())
    }

    /// Place one ask into every open auction the agent has not bid on yet.
    /// Returns the number of orders placed.
    pub async fn bid(&mut self, handle: &SimulationHandle) -> Result<usize> {
        let Some(actor_id) = self.actor_id.clone() else {
            return Err(MarketError::UnknownParticipant(self.participant_id.clone()));
        };

        let mut placed = 0;
        for auction in handle.open_auctions().await? {
            let supply_time = auction.params.supply_start_time;
            if self.last_supply_time.is_some_and(|last| supply_time <= last) {
                continue;
            }
            let amount = self.rng.gen_range(1.0..3.0);
            let price = self.rng.gen_range(5.0..40.0);
            let request = OrderRequest {
                actor_id: actor_id.clone(),
                amount_kw: Decimal::from_f64(amount).unwrap_or(Decimal::ONE).round_dp(1),
                price_ct: Decimal::from_f64(price).unwrap_or(Decimal::TEN).round_dp(2),
                supply_time,
            };
            match handle.receive_order(request).await {
                Ok(auction_id) => {
                    debug!(%actor_id, %auction_id, supply_time, "Virtual bid placed");
                    placed += 1;
                    self.last_supply_time = Some(supply_time);
                }
                Err(err) if err.is_rejection() => {
                    warn!(%actor_id, error = %err, "Virtual bid rejected");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(placed)
    }
}

/// Register `count` bidders and let each bid every `period` until the simulation stops
pub fn spawn_virtual_bidders(
    handle: &SimulationHandle,
    count: u32,
    period: Duration,
    seed: u64,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|i| {
            let handle = handle.clone();
            let mut agent = VirtualBiddingAgent::new(format!("virtual-{}", i), seed + i as u64);
            tokio::spawn(async move {
                if let Err(err) = agent.register(&handle).await {
                    err.log();
                    return;
                }
                let mut ticker = tokio::time::interval(period);
                loop {
                    ticker.tick().await;
                    match agent.bid(&handle).await {
                        Ok(_) => {}
                        Err(MarketError::SimulationStopped) => break,
                        Err(err) => err.log(),
                    }
                }
                debug!(participant_id = %agent.participant_id, "Virtual bidder stopped");
            })
        })
        .collect()
}
