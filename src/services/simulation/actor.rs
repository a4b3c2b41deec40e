use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};
use validator::Validate;

use super::controller::{SimulationController, TickReport};
use crate::error::{MarketError, Result};
use crate::models::{
    AuctionId, AuctionResult, AuctionSummary, AwardedOrdersView, GroupOrderRequest, OrderRequest,
    Registration, RegistrationRequest, Transaction, UnitInformation,
};
use crate::services::persistence::SimulationSnapshot;

type Job = Box<dyn FnOnce(&mut SimulationController) + Send + 'static>;

const REQUEST_QUEUE_DEPTH: usize = 256;

/// Single writer that owns the controller.
///
/// Ticks and requests are processed one at a time from the same task, so a
/// request issued during a tick is answered after the tick has completed.
pub struct SimulationDriver {
    controller: SimulationController,
    jobs: mpsc::Receiver<Job>,
    shutdown: broadcast::Receiver<()>,
    progress: watch::Sender<u64>,
}

impl SimulationDriver {
    /// Start the driver task; it hands the controller back when it stops
    pub fn spawn(
        controller: SimulationController,
    ) -> (SimulationHandle, JoinHandle<SimulationController>) {
        let (jobs_tx, jobs_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (progress_tx, progress_rx) = watch::channel(controller.step_index());
        let max_steps = controller.config().max_steps;

        let driver = Self {
            controller,
            jobs: jobs_rx,
            shutdown: shutdown_rx,
            progress: progress_tx,
        };
        let handle = SimulationHandle {
            jobs: jobs_tx,
            shutdown: shutdown_tx,
            progress: progress_rx,
            max_steps,
        };
        (handle, tokio::spawn(driver.run()))
    }

    async fn run(mut self) -> SimulationController {
        let config = self.controller.config().clone();
        info!(
            step_size_s = config.step_size_s,
            rt_step_duration_s = config.rt_step_duration_s,
            max_steps = config.max_steps,
            "Simulation driver started, registration open for {}s",
            config.rt_step_init_delay_s
        );

        let warm_up =
            tokio::time::sleep(Duration::from_secs_f64(config.rt_step_init_delay_s.max(0.0)));
        tokio::pin!(warm_up);
        loop {
            tokio::select! {
                _ = &mut warm_up => break,
                _ = self.shutdown.recv() => {
                    info!("Shutdown during warm-up");
                    return self.controller;
                }
                job = self.jobs.recv() => match job {
                    Some(job) => self.run_job(job),
                    None => return self.controller,
                },
            }
        }

        if !config.test_mode {
            self.controller.close_registration();
        }

        let period = Duration::from_secs_f64(config.rt_step_duration_s.max(0.001));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticking = self.controller.step_index() < config.max_steps;

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!("Simulation driver received shutdown signal");
                    break;
                }
                _ = ticker.tick(), if ticking => {
                    if self.controller.config().pause {
                        debug!("Simulation paused, skipping tick");
                        continue;
                    }
                    self.controller.tick();
                    self.progress.send_replace(self.controller.step_index());
                    if self.controller.step_index() >= config.max_steps {
                        info!(steps = config.max_steps, "Maximum number of steps reached");
                        ticking = false;
                    }
                }
                job = self.jobs.recv() => match job {
                    Some(job) => self.run_job(job),
                    None => break,
                },
            }
        }

        info!(step = self.controller.step_index(), "Simulation driver stopped");
        self.controller
    }

    /// Requests may tick the controller too (`step_now`), so publish progress after each
    fn run_job(&mut self, job: Job) {
        job(&mut self.controller);
        let current = self.controller.step_index();
        self.progress
            .send_if_modified(|step| std::mem::replace(step, current) != current);
    }
}

/// Cloneable request-side handle to a running simulation
#[derive(Clone)]
pub struct SimulationHandle {
    jobs: mpsc::Sender<Job>,
    shutdown: broadcast::Sender<()>,
    progress: watch::Receiver<u64>,
    max_steps: u64,
}

impl SimulationHandle {
    /// Run `f` on the controller between ticks and return its output
    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SimulationController) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |controller| {
            let _ = reply_tx.send(f(controller));
        });
        self.jobs
            .send(job)
            .await
            .map_err(|_| MarketError::SimulationStopped)?;
        reply_rx.await.map_err(|_| MarketError::SimulationStopped)
    }

    pub async fn register_actor(&self, participant_id: &str) -> Result<Registration> {
        let request = RegistrationRequest {
            participant_id: participant_id.to_string(),
        };
        request.validate()?;
        self.call(move |c| c.register_actor(&request.participant_id))
            .await?
    }

    pub async fn open_auctions(&self) -> Result<Vec<AuctionSummary>> {
        self.call(|c| c.open_auctions()).await
    }

    pub async fn receive_order(&self, request: OrderRequest) -> Result<AuctionId> {
        self.call(move |c| c.receive_order(&request)).await?
    }

    pub async fn receive_group_order(&self, request: GroupOrderRequest) -> Result<AuctionId> {
        self.call(move |c| c.receive_group_order(&request)).await?
    }

    pub async fn awarded_orders(&self, actor_id: &str) -> Result<Vec<AwardedOrdersView>> {
        let actor_id = actor_id.to_string();
        self.call(move |c| c.awarded_orders(&actor_id)).await?
    }

    pub async fn current_auction_results(&self) -> Result<BTreeMap<String, AuctionResult>> {
        self.call(|c| c.current_auction_results()).await
    }

    pub async fn balance(&self, actor_id: &str) -> Result<Decimal> {
        let actor_id = actor_id.to_string();
        self.call(move |c| c.balance(&actor_id)).await?
    }

    pub async fn transactions(&self, actor_id: &str) -> Result<Vec<Transaction>> {
        let actor_id = actor_id.to_string();
        self.call(move |c| c.transactions(&actor_id)).await?
    }

    /// Balances keyed by participant id
    pub async fn balances(&self) -> Result<BTreeMap<String, Decimal>> {
        self.call(|c| c.balances()).await
    }

    pub async fn current_time(&self) -> Result<i64> {
        self.call(|c| c.current_time()).await
    }

    pub async fn unit_information(&self, actor_id: &str) -> Result<Vec<UnitInformation>> {
        let actor_id = actor_id.to_string();
        self.call(move |c| c.unit_information(&actor_id)).await?
    }

    pub async fn load_forecast(&self, actor_id: &str, len: usize) -> Result<Vec<f64>> {
        let actor_id = actor_id.to_string();
        self.call(move |c| c.load_forecast(&actor_id, len)).await?
    }

    pub async fn snapshot(&self) -> Result<SimulationSnapshot> {
        self.call(|c| c.snapshot()).await
    }

    /// Run one tick immediately, outside the wall-clock schedule
    pub async fn step_now(&self) -> Result<TickReport> {
        self.call(|c| c.tick()).await
    }

    pub async fn set_paused(&self, paused: bool) -> Result<()> {
        self.call(move |c| c.set_paused(paused)).await
    }

    /// Number of completed ticks, updated after every tick
    pub fn progress(&self) -> watch::Receiver<u64> {
        self.progress.clone()
    }

    /// Step count the driven controller stops ticking at
    pub fn max_steps(&self) -> u64 {
        self.max_steps
    }

    /// Resolves once the driven controller has run `max_steps` ticks
    pub async fn finished(&self) -> Result<u64> {
        let max_steps = self.max_steps;
        let mut progress = self.progress.clone();
        let step = progress
            .wait_for(|step| *step >= max_steps)
            .await
            .map_err(|_| MarketError::SimulationStopped)?;
        Ok(*step)
    }

    /// Stop the driver after the tick in progress, if any
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }
}
