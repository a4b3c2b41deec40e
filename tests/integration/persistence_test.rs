// Persistence integration test
// Writes a snapshot of a running simulation to disk, restores it and checks
// that the restored controller continues exactly where the original stopped.

use market_sim::error::MarketError;
use market_sim::models::OrderRequest;
use market_sim::services::persistence::{JsonPersistenceHandler, PersistenceHandler};
use market_sim::{SimulationConfig, SimulationController, SimulationDriver};
use rust_decimal::Decimal;
use tempfile::TempDir;
use tokio_test::assert_ok;

fn dec(s: &str) -> Decimal {
    Decimal::from_str_exact(s).unwrap()
}

fn running_controller() -> (SimulationController, String) {
    let mut controller = SimulationController::new(SimulationConfig {
        test_mode: true,
        ..SimulationConfig::default()
    });
    let actor = controller.register_actor("alice").unwrap().actor_id;
    controller.register_actor("bob").unwrap();

    controller.tick();
    controller
        .receive_order(&OrderRequest {
            actor_id: actor.clone(),
            amount_kw: dec("1.5"),
            price_ct: dec("12.25"),
            supply_time: 4500,
        })
        .unwrap();
    for _ in 0..5 {
        controller.tick();
    }
    (controller, actor)
}

#[test]
fn test_snapshot_round_trip_through_disk() {
    let dir = TempDir::new().unwrap();
    let handler = JsonPersistenceHandler::new(dir.path().join("state").join("snapshot.json"));
    assert!(!handler.exists());

    let (controller, actor) = running_controller();
    let snapshot = controller.snapshot();
    handler.write(&snapshot).unwrap();
    assert!(handler.exists());

    let loaded = handler.load().unwrap();
    assert_eq!(loaded, snapshot);

    let restored = SimulationController::from_snapshot(loaded).unwrap();
    assert_eq!(restored.step_index(), controller.step_index());
    assert_eq!(restored.balances(), controller.balances());
    assert_eq!(
        restored.transactions(&actor).unwrap(),
        controller.transactions(&actor).unwrap()
    );
    assert_eq!(
        restored.unit_information(&actor).unwrap(),
        controller.unit_information(&actor).unwrap()
    );
}

#[test]
fn test_restored_controller_continues_identically() {
    let dir = TempDir::new().unwrap();
    let handler = JsonPersistenceHandler::new(dir.path().join("snapshot.json"));

    let (mut original, _) = running_controller();
    handler.write(&original.snapshot()).unwrap();
    let mut restored = SimulationController::from_snapshot(handler.load().unwrap()).unwrap();

    // auction ids are random, so compare the clearing outcome rather than ids
    for _ in 0..4 {
        let a = original.tick();
        let b = restored.tick();
        assert_eq!(a.current_time, b.current_time);
        assert_eq!(a.units.entries, b.units.entries);
    }
    assert_eq!(original.balances(), restored.balances());
    assert_eq!(original.accounts(), restored.accounts());
}

#[test]
fn test_money_is_stored_as_exact_decimals() {
    let dir = TempDir::new().unwrap();
    let handler = JsonPersistenceHandler::new(dir.path().join("snapshot.json"));
    let (controller, _) = running_controller();
    handler.write(&controller.snapshot()).unwrap();

    let raw = std::fs::read_to_string(handler.path()).unwrap();
    assert!(raw.contains("\"12.25\""));
    assert!(!dir.path().join("snapshot.json.tmp").exists());
}

#[test]
fn test_tampered_ledger_is_refused() {
    let (controller, actor) = running_controller();
    let mut value = serde_json::to_value(controller.snapshot()).unwrap();

    let balance = &mut value["accounts"]["accounts"][&actor]["transactions"][0]["balance_after"];
    *balance = serde_json::Value::String("1000".to_string());
    let tampered = serde_json::from_value(value).unwrap();

    let err = SimulationController::from_snapshot(tampered).unwrap_err();
    assert!(matches!(err, MarketError::InvariantViolation(_)));
}

#[test]
fn test_missing_or_corrupt_snapshot() {
    let dir = TempDir::new().unwrap();
    let handler = JsonPersistenceHandler::new(dir.path().join("missing.json"));
    assert!(matches!(handler.load(), Err(MarketError::Persistence(_))));

    let corrupt = dir.path().join("corrupt.json");
    std::fs::write(&corrupt, b"{ not json").unwrap();
    let handler = JsonPersistenceHandler::new(corrupt);
    assert!(matches!(handler.load(), Err(MarketError::Serialization(_))));
}

#[tokio::test(start_paused = true)]
async fn test_restored_run_finishes_at_its_own_max_steps() {
    let dir = TempDir::new().unwrap();
    let handler = JsonPersistenceHandler::new(dir.path().join("snapshot.json"));

    let config = SimulationConfig {
        rt_step_init_delay_s: 0.0,
        rt_step_duration_s: 1.0,
        max_steps: 3,
        ..SimulationConfig::default()
    };
    let mut controller = SimulationController::new(config);
    controller.register_actor("alice").unwrap();
    controller.tick();
    handler.write(&controller.snapshot()).unwrap();

    // the process-level config would ask for far more steps
    assert!(SimulationConfig::default().max_steps > 3);
    let restored = SimulationController::from_snapshot(handler.load().unwrap()).unwrap();
    let (handle, driver) = SimulationDriver::spawn(restored);
    assert_eq!(handle.max_steps(), 3);

    assert_eq!(assert_ok!(handle.finished().await), 3);
    handle.shutdown();
    let controller = driver.await.unwrap();
    assert_eq!(controller.step_index(), 3);
}
