// Simulation loop integration test
// Runs the driver task on a paused clock and talks to it only through the
// request handle, the way participants and the binary do.

use std::time::Duration;

use market_sim::error::MarketError;
use market_sim::models::{GroupOrderRequest, OrderRequest};
use market_sim::services::simulation::VirtualBiddingAgent;
use market_sim::{SimulationConfig, SimulationController, SimulationDriver};
use rust_decimal::Decimal;
use tokio_test::{assert_err, assert_ok};

fn dec(s: &str) -> Decimal {
    Decimal::from_str_exact(s).unwrap()
}

/// Ticks only on `step_now`; the wall-clock schedule is paused
fn manual_config() -> SimulationConfig {
    SimulationConfig {
        test_mode: true,
        pause: true,
        rt_step_init_delay_s: 0.0,
        rt_step_duration_s: 60.0,
        ..SimulationConfig::default()
    }
}

fn order(actor_id: &str, amount: &str, price: &str, supply_time: i64) -> OrderRequest {
    OrderRequest {
        actor_id: actor_id.to_string(),
        amount_kw: dec(amount),
        price_ct: dec(price),
        supply_time,
    }
}

#[tokio::test(start_paused = true)]
async fn test_order_is_awarded_dispatched_and_paid() {
    let (handle, driver) = SimulationDriver::spawn(SimulationController::new(manual_config()));
    let registration = assert_ok!(handle.register_actor("alice").await);
    let actor = registration.actor_id;
    assert_eq!(registration.units.len(), 3);

    let report = assert_ok!(handle.step_now().await);
    assert_eq!(report.step, 0);
    let open = assert_ok!(handle.open_auctions().await);
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].params.supply_start_time, 4500);

    assert_ok!(handle.receive_order(order(&actor, "1", "10", 4500)).await);

    // ticks at 900..3600; the gate closes at 3600
    for _ in 0..4 {
        assert_ok!(handle.step_now().await);
    }
    let awarded = assert_ok!(handle.awarded_orders(&actor).await);
    assert_eq!(awarded.len(), 1);
    assert_eq!(awarded[0].clearing_price, Some(dec("10")));

    let results = assert_ok!(handle.current_auction_results().await);
    let tender = results["4500_electricity"].params.tender_amount_kw;

    let report = assert_ok!(handle.step_now().await);
    assert_eq!(report.current_time, 4500);
    assert!(report.units.failed_actors.is_empty());

    let expected = tender.min(Decimal::ONE) * dec("10");
    assert_eq!(assert_ok!(handle.balance(&actor).await), expected);
    assert_eq!(assert_ok!(handle.transactions(&actor).await).len(), 6);
    assert_eq!(assert_ok!(handle.balances().await)["alice"], expected);
    assert_eq!(assert_ok!(handle.current_time().await), 5400);
    assert_eq!(*handle.progress().borrow(), 6);

    handle.shutdown();
    let controller = driver.await.unwrap();
    assert_eq!(controller.step_index(), 6);
    assert!(controller.accounts().verify().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_rejections_are_reported_to_the_caller() {
    let (handle, _driver) = SimulationDriver::spawn(SimulationController::new(manual_config()));
    let a = assert_ok!(handle.register_actor("a").await).actor_id;
    let b = assert_ok!(handle.register_actor("b").await).actor_id;
    assert_ok!(handle.step_now().await);

    let err = assert_err!(handle.register_actor("a").await);
    assert!(matches!(err, MarketError::AlreadyRegistered(_)));
    let err = assert_err!(handle.register_actor("").await);
    assert!(matches!(err, MarketError::Validation(_)));

    let err = assert_err!(handle.receive_order(order(&a, "0.2", "5", 4500)).await);
    assert!(matches!(err, MarketError::OrderBelowMinimum { .. }));
    assert!(err.is_rejection());

    let err = assert_err!(handle.receive_order(order("ghost", "1", "5", 4500)).await);
    assert!(matches!(err, MarketError::UnknownParticipant(_)));

    let group = GroupOrderRequest {
        actor_ids: vec![a.clone(), b.clone()],
        amount_kw: dec("2"),
        price_ct: dec("8"),
        supply_time: 4500,
    };
    assert_ok!(handle.receive_group_order(group.clone()).await);

    let err = assert_err!(
        handle
            .receive_group_order(GroupOrderRequest {
                actor_ids: vec![a.clone(), "ghost".to_string()],
                ..group
            })
            .await
    );
    assert!(matches!(err, MarketError::UnknownParticipant(_)));

    let open = assert_ok!(handle.open_auctions().await);
    assert_eq!(open[0].order_count, 1);

    let err = assert_err!(handle.balance("ghost").await);
    assert!(matches!(err, MarketError::UnknownParticipant(_)));
    assert_eq!(assert_ok!(handle.load_forecast(&b, 8).await).len(), 8);
    assert_eq!(assert_ok!(handle.unit_information(&b).await).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_driver_ticks_on_schedule_and_stops_at_max_steps() {
    let config = SimulationConfig {
        rt_step_init_delay_s: 5.0,
        rt_step_duration_s: 1.0,
        max_steps: 3,
        ..SimulationConfig::default()
    };
    let (handle, driver) = SimulationDriver::spawn(SimulationController::new(config));

    // registration is open during the warm-up only
    let actor = assert_ok!(handle.register_actor("early").await).actor_id;
    let mut progress = handle.progress();
    assert_ok!(progress.wait_for(|step| *step >= 3).await);

    let err = assert_err!(handle.register_actor("late").await);
    assert!(matches!(err, MarketError::RegistrationClosed));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(assert_ok!(handle.current_time().await), 3 * 900);
    assert_eq!(assert_ok!(handle.transactions(&actor).await).len(), 3);

    handle.shutdown();
    let controller = driver.await.unwrap();
    assert_eq!(controller.step_index(), 3);
    assert!(!controller.is_registration_open());
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_price_is_rejected_and_driver_keeps_ticking() {
    let (handle, driver) = SimulationDriver::spawn(SimulationController::new(manual_config()));
    let a = assert_ok!(handle.register_actor("a").await).actor_id;
    let b = assert_ok!(handle.register_actor("b").await).actor_id;
    assert_ok!(handle.step_now().await);

    let mut huge = order(&a, "1", "1", 4500);
    huge.price_ct = Decimal::MAX;
    let err = assert_err!(handle.receive_order(huge).await);
    assert!(matches!(err, MarketError::Validation(_)));
    assert!(err.is_rejection());

    let err = assert_err!(
        handle
            .receive_group_order(GroupOrderRequest {
                actor_ids: vec![a.clone(), b.clone()],
                amount_kw: Decimal::MAX,
                price_ct: dec("5"),
                supply_time: 4500,
            })
            .await
    );
    assert!(matches!(err, MarketError::Validation(_)));

    // the highest accepted price still settles without overflow
    assert_ok!(handle.receive_order(order(&a, "1", "1000000000", 4500)).await);
    for _ in 0..5 {
        let report = assert_ok!(handle.step_now().await);
        assert!(report.failed_phases.is_empty());
    }
    assert!(assert_ok!(handle.balance(&a).await) > Decimal::ZERO);
    assert_eq!(*handle.progress().borrow(), 6);

    handle.shutdown();
    let controller = driver.await.unwrap();
    assert!(controller.accounts().verify().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_paused_driver_does_not_tick() {
    let (handle, driver) = SimulationDriver::spawn(SimulationController::new(manual_config()));
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(assert_ok!(handle.current_time().await), 0);

    assert_ok!(handle.set_paused(false).await);
    let mut progress = handle.progress();
    assert_ok!(progress.wait_for(|step| *step >= 2).await);

    assert_ok!(handle.set_paused(true).await);
    let paused_at = assert_ok!(handle.current_time().await);
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(assert_ok!(handle.current_time().await), paused_at);

    handle.shutdown();
    assert!(driver.await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_requests_fail_after_shutdown() {
    let (handle, driver) = SimulationDriver::spawn(SimulationController::new(manual_config()));
    assert_ok!(handle.register_actor("a").await);

    handle.shutdown();
    let controller = driver.await.unwrap();
    assert_eq!(controller.registered().len(), 1);

    let err = assert_err!(handle.open_auctions().await);
    assert!(matches!(err, MarketError::SimulationStopped));
    let err = assert_err!(handle.snapshot().await);
    assert!(matches!(err, MarketError::SimulationStopped));
}

#[tokio::test(start_paused = true)]
async fn test_virtual_bidder_bids_once_per_auction() {
    let (handle, _driver) = SimulationDriver::spawn(SimulationController::new(manual_config()));
    let mut bidder = VirtualBiddingAgent::new("bot", 7);

    let err = assert_err!(bidder.bid(&handle).await);
    assert!(matches!(err, MarketError::UnknownParticipant(_)));

    assert_ok!(bidder.register(&handle).await);
    let actor = bidder.actor_id().unwrap().to_string();

    assert_ok!(handle.step_now().await);
    assert_eq!(assert_ok!(bidder.bid(&handle).await), 1);
    assert_eq!(assert_ok!(bidder.bid(&handle).await), 0);

    assert_ok!(handle.step_now().await);
    assert_eq!(assert_ok!(bidder.bid(&handle).await), 1);

    let open = assert_ok!(handle.open_auctions().await);
    assert_eq!(open.iter().map(|a| a.order_count).sum::<usize>(), 2);
    assert!(assert_ok!(handle.awarded_orders(&actor).await).is_empty());
}
