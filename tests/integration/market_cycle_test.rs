// Market cycle integration test
// Drives auctions through the market from publication to expiry and checks
// the merit-order outcome that settlement later relies on.

use market_sim::config::AuctionConfig;
use market_sim::error::MarketError;
use market_sim::models::{AuctionParameters, AuctionStatus};
use market_sim::services::market_clearing::{Auction, Market, MarketInputs};
use rust_decimal::Decimal;

const STEP: i64 = 900;

fn dec(s: &str) -> Decimal {
    Decimal::from_str_exact(s).unwrap()
}

fn agents(name: &str) -> Vec<String> {
    vec![name.to_string()]
}

/// Advance the market clock to `t` and step it
fn step_to(market: &mut Market, t: i64) {
    market.set_inputs(MarketInputs::at(t, STEP));
    market.step();
}

fn params(supply_start: i64, tender: &str) -> AuctionParameters {
    AuctionParameters {
        product_type: "electricity".to_string(),
        gate_opening_time: supply_start - 4500,
        gate_closure_time: supply_start - 900,
        supply_start_time: supply_start,
        supply_duration_s: STEP,
        tender_amount_kw: dec(tender),
        minimum_order_amount_kw: Decimal::ONE,
    }
}

#[test]
fn test_merit_order_cap_through_market() {
    let mut market = Market::new();
    let auction = Auction::new(params(4500, "2"), Some(0));
    let id = auction.id();
    assert!(market.receive_auction(auction).unwrap());
    step_to(&mut market, 0);
    assert_eq!(market.open_auctions().len(), 1);

    for (price, amount, agent) in [("10", "1", "a"), ("20", "2", "b"), ("30", "1", "c")] {
        let placed = market
            .receive_order(dec(amount), dec(price), agents(agent), 4500, "electricity", None)
            .unwrap();
        assert_eq!(placed, id);
    }

    step_to(&mut market, 3600);
    let auction = market.auction(id).unwrap();
    assert_eq!(auction.status(), AuctionStatus::Closed);

    let result = auction.result().unwrap();
    assert_eq!(result.clearing_price, Some(dec("20")));
    assert_eq!(result.awarded_orders.len(), 2);
    assert_eq!(result.awarded_orders[0].awarded_amount_kw, dec("1"));
    assert_eq!(result.awarded_orders[1].awarded_amount_kw, dec("1"));
    assert_eq!(result.awarded_orders[1].order.amount_kw, dec("2"));
    assert!(result.awarded_orders.iter().all(|o| !o.order.involves("c")));
    assert_eq!(result.total_awarded_kw(), dec("2"));

    let published = market.current_auction_results();
    assert!(published.contains_key("4500_electricity"));
    assert_eq!(market.result_covering(4500).map(|r| r.auction_id), Some(id));
    assert!(market.result_covering(5400).is_none());
}

#[test]
fn test_rolling_auctions_follow_the_clock() {
    let config = AuctionConfig::default();
    let mut market = Market::new();

    // one auction per tick, as the controller publishes them
    for step in 0..8 {
        let now = step * STEP;
        let auction = Auction::new(config.parameters_at(now, dec("5")), Some(now));
        market.receive_auction(auction).unwrap();
        step_to(&mut market, now);

        let statuses: Vec<AuctionStatus> = market.auctions().iter().map(|a| a.status()).collect();
        assert!(statuses.windows(2).all(|w| w[0] >= w[1]));
    }

    // gate closure at t+3600: auctions from steps 2 and 3 are closed
    assert_eq!(market.current_results().len(), 2);
    // supply end at t+5400: auctions published at steps 0 and 1 expired
    let expired: Vec<i64> = market
        .expired_auctions()
        .iter()
        .map(|a| a.params().supply_start_time)
        .collect();
    assert_eq!(expired, vec![4500, 5400]);
    assert_eq!(market.open_auctions().len(), 4);
}

#[test]
fn test_orders_are_rejected_outside_the_gate() {
    let mut market = Market::new();
    let auction = Auction::new(params(9000, "3"), Some(0));
    let id = auction.id();
    market.receive_auction(auction).unwrap();
    step_to(&mut market, 0);

    // gate opens at 4500
    let err = market
        .receive_order(dec("1"), dec("5"), agents("a"), 9000, "electricity", None)
        .unwrap_err();
    assert!(matches!(
        err,
        MarketError::AuctionNotOpen {
            status: AuctionStatus::Pending,
            ..
        }
    ));

    step_to(&mut market, 4500);
    let err = market
        .receive_order(dec("0.5"), dec("5"), agents("a"), 9000, "electricity", Some(id))
        .unwrap_err();
    assert!(matches!(err, MarketError::OrderBelowMinimum { .. }));
    assert!(market
        .receive_order(dec("1"), dec("5"), agents("a"), 9000, "electricity", Some(id))
        .is_ok());

    step_to(&mut market, 8100);
    let err = market
        .receive_order(dec("1"), dec("5"), agents("a"), 9000, "electricity", None)
        .unwrap_err();
    assert!(matches!(
        err,
        MarketError::AuctionNotOpen {
            status: AuctionStatus::Closed,
            ..
        }
    ));
    assert_eq!(market.auction(id).unwrap().orders().len(), 1);
}

#[test]
fn test_unknown_slots_and_products() {
    let mut market = Market::new();
    market
        .receive_auction(Auction::new(params(4500, "1"), Some(0)))
        .unwrap();
    step_to(&mut market, 0);

    let err = market
        .receive_order(dec("1"), dec("5"), agents("a"), 4500, "heat", None)
        .unwrap_err();
    assert!(matches!(err, MarketError::AuctionNotFound { .. }));
    assert_eq!(err.code().code(), 4001);

    let err = market
        .receive_order(
            dec("1"),
            dec("5"),
            agents("a"),
            4500,
            "electricity",
            Some(uuid::Uuid::new_v4()),
        )
        .unwrap_err();
    assert!(matches!(err, MarketError::UnknownAuction(_)));
}

#[test]
fn test_duplicate_and_conflicting_auctions() {
    let mut market = Market::new();
    let auction = Auction::new(params(4500, "1"), Some(0));
    assert!(market.receive_auction(auction.clone()).unwrap());
    assert!(!market.receive_auction(auction).unwrap());

    let err = market
        .receive_auction(Auction::new(params(4500, "7"), Some(0)))
        .unwrap_err();
    assert!(matches!(err, MarketError::AuctionConflict { supply_time: 4500, .. }));
    assert_eq!(market.auctions().len(), 1);
}

#[test]
fn test_auction_skipping_open_is_still_cleared() {
    let mut market = Market::new();
    let auction = Auction::new(params(4500, "2"), None);
    let id = auction.id();
    market.receive_auction(auction).unwrap();
    assert_eq!(market.auction(id).unwrap().status(), AuctionStatus::Pending);

    // first observed after gate closure: cleared without orders
    step_to(&mut market, 3600);
    let auction = market.auction(id).unwrap();
    assert_eq!(auction.status(), AuctionStatus::Closed);
    let result = auction.result().unwrap();
    assert!(result.awarded_orders.is_empty());
    assert_eq!(result.clearing_price, None);

    step_to(&mut market, 5400);
    assert!(market.auction(id).is_none());
    assert_eq!(market.expired_auctions().len(), 1);
    assert!(market.current_results().is_empty());
}
