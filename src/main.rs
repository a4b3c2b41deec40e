use anyhow::{Context, Result};
use std::env;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use market_sim::services::persistence::{JsonPersistenceHandler, PersistenceHandler};
use market_sim::services::simulation::spawn_virtual_bidders;
use market_sim::{SimulationConfig, SimulationController, SimulationDriver};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first
    dotenvy::dotenv().ok();

    init_tracing();

    // Load configuration: a file when MARKET_CONFIG_FILE is set, plain env otherwise
    let config = match env::var("MARKET_CONFIG_FILE") {
        Ok(path) => SimulationConfig::load(&path)?,
        Err(_) => SimulationConfig::from_env()?,
    };
    info!(
        participants = config.participants.len(),
        step_size_s = config.step_size_s,
        max_steps = config.max_steps,
        test_mode = config.test_mode,
        "Configuration loaded"
    );

    if config.metrics_enabled {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Prometheus metrics exporter initialized");
    }

    let persistence = config
        .snapshot_path
        .as_ref()
        .map(JsonPersistenceHandler::new);

    let controller = match &persistence {
        Some(handler) if handler.exists() => {
            let snapshot = handler.load().context("Failed to load snapshot")?;
            info!(step = snapshot.step, "Resuming simulation from snapshot");
            SimulationController::from_snapshot(snapshot)?
        }
        _ => SimulationController::new(config.clone()),
    };

    // a restored run keeps the schedule it was started with
    let step_duration = Duration::from_secs_f64(controller.config().rt_step_duration_s);
    let (handle, driver) = SimulationDriver::spawn(controller);

    for participant in &config.participants {
        match handle.register_actor(participant).await {
            Ok(registration) => info!(
                participant_id = %participant,
                actor_id = %registration.actor_id,
                "Participant registered from configuration"
            ),
            Err(err) => err.log(),
        }
    }

    let bidders = spawn_virtual_bidders(
        &handle,
        config.virtual_bidders,
        step_duration,
        42,
    );

    tokio::select! {
        _ = shutdown_signal() => {}
        finished = handle.finished() => match finished {
            Ok(steps) => info!(steps, "Simulation run complete"),
            Err(err) => err.log(),
        },
    }
    handle.shutdown();

    let controller = driver.await.context("Simulation driver panicked")?;
    // bidders stop on their next request once the driver is gone
    for joined in futures::future::join_all(bidders).await {
        if let Err(err) = joined {
            warn!("Virtual bidder task failed: {}", err);
        }
    }

    for (participant, balance) in controller.balances() {
        info!(participant_id = %participant, %balance, "Final balance");
    }
    if let Err(err) = controller.accounts().verify() {
        warn!("Ledger verification failed: {}", err);
    }

    if let Some(handler) = persistence {
        handler
            .write(&controller.snapshot())
            .context("Failed to write snapshot")?;
    }

    info!("Simulation finished at step {}", controller.step_index());
    Ok(())
}

/// Initialize tracing; `LOG_FORMAT=json` switches to structured JSON output
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "market_sim=info".into());
    let json = env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Wait for SIGTERM or SIGINT signal for graceful shutdown
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully");
        },
    }
}
