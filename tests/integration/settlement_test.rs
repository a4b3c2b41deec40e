// Settlement integration test
// Clears a real auction, settles partial deliveries against the result and
// books the payoffs into the participant ledgers.

use std::collections::BTreeMap;

use market_sim::models::AuctionParameters;
use market_sim::services::ledger::AccountStore;
use market_sim::services::market_clearing::Auction;
use market_sim::services::settlement::{Accounter, PartyKey, SettlementService};
use rust_decimal::Decimal;

fn dec(s: &str) -> Decimal {
    Decimal::from_str_exact(s).unwrap()
}

fn open_auction(tender: &str) -> Auction {
    Auction::new(
        AuctionParameters {
            product_type: "electricity".to_string(),
            gate_opening_time: 0,
            gate_closure_time: 3600,
            supply_start_time: 4500,
            supply_duration_s: 900,
            tender_amount_kw: dec(tender),
            minimum_order_amount_kw: dec("0.1"),
        },
        Some(0),
    )
}

fn place(auction: &mut Auction, agents: &[&str], amount: &str, price: &str) {
    auction
        .place_order(
            dec(amount),
            dec(price),
            agents.iter().map(|a| a.to_string()).collect(),
        )
        .unwrap();
}

fn cleared(mut auction: Auction) -> Accounter {
    auction.step(3600);
    Accounter::new(auction.result().cloned())
}

fn deliveries(values: &[(&str, &str)]) -> BTreeMap<String, Decimal> {
    values
        .iter()
        .map(|(agent, provided)| (agent.to_string(), dec(provided)))
        .collect()
}

/// A, B, C ask at 1, 2, 3 and again at 4, 5, 6 against a 4.5 kW tender
fn two_rounds() -> Accounter {
    let mut auction = open_auction("4.5");
    for (agent, price) in [("A", "1"), ("B", "2"), ("C", "3"), ("A", "4"), ("B", "5"), ("C", "6")] {
        place(&mut auction, &[agent], "1", price);
    }
    cleared(auction)
}

#[test]
fn test_two_round_awards_and_payoffs() {
    let accounter = two_rounds();
    let result = accounter.result().unwrap();
    assert_eq!(result.clearing_price, Some(dec("5")));
    assert_eq!(result.total_awarded_kw(), dec("4.5"));

    assert_eq!(accounter.return_awarded_sum("A"), dec("2"));
    assert_eq!(accounter.return_awarded_sum("B"), dec("1.5"));
    assert_eq!(accounter.return_awarded_sum("C"), dec("1"));

    assert_eq!(accounter.calculate_payoff("A", dec("2")).unwrap(), dec("5"));
    assert_eq!(accounter.calculate_payoff("A", dec("1")).unwrap(), dec("1"));
    assert_eq!(accounter.calculate_payoff("B", dec("1")).unwrap(), dec("2"));
    assert_eq!(accounter.calculate_payoff("C", dec("0.5")).unwrap(), dec("1.5"));
}

#[test]
fn test_settle_and_book_partial_deliveries() {
    let accounter = two_rounds();
    let service = SettlementService::new();
    let mut ledger = AccountStore::new();

    // D was not awarded; C over-delivers, which pays no more than the award
    let entries = service.settle(
        &accounter,
        &deliveries(&[("A", "1.5"), ("B", "1.5"), ("C", "4"), ("D", "2")]),
    )
    .unwrap();
    assert_eq!(entries.len(), 4);

    let payoffs: BTreeMap<&str, Decimal> =
        entries.iter().map(|e| (e.agent.as_str(), e.payoff)).collect();
    assert_eq!(payoffs["A"], dec("3"));
    assert_eq!(payoffs["B"], dec("4.5"));
    assert_eq!(payoffs["C"], dec("3"));
    assert_eq!(payoffs["D"], Decimal::ZERO);

    let total = service.book(&entries, &mut ledger).unwrap();
    assert_eq!(total, dec("10.5"));
    assert_eq!(ledger.balance("A"), Some(dec("3")));
    assert_eq!(ledger.balance("D"), Some(Decimal::ZERO));

    let d = &ledger.transactions("D").unwrap()[0];
    assert_eq!(d.awarded_amount_kw, Decimal::ZERO);
    assert_eq!(d.provided_power_kw, dec("2"));
    assert!(ledger.verify().is_ok());
}

#[test]
fn test_balances_accumulate_over_ticks() {
    let accounter = two_rounds();
    let service = SettlementService::new();
    let mut ledger = AccountStore::new();

    for provided in ["2", "1", "0"] {
        let entries = service
            .settle(&accounter, &deliveries(&[("A", provided)]))
            .unwrap();
        service.book(&entries, &mut ledger).unwrap();
    }
    assert_eq!(ledger.balance("A"), Some(dec("6")));
    assert_eq!(ledger.transactions("A").map(<[_]>::len), Some(3));
    assert_eq!(ledger.balances().len(), 1);
}

#[test]
fn test_group_order_is_paid_as_a_party() {
    let mut auction = open_auction("3");
    place(&mut auction, &["solo"], "1", "2");
    place(&mut auction, &["A", "B"], "4", "6");
    let accounter = cleared(auction);

    // the group is awarded the residual 2 kW, one per member
    assert_eq!(accounter.return_awarded_sum("A"), dec("1"));
    assert_eq!(accounter.return_awarded_sum("B"), dec("1"));
    let party = PartyKey::from_agents(&["B".to_string(), "A".to_string()]);
    assert_eq!(accounter.party_awarded_sum(&party), dec("2"));

    // A delivers fully, B half: the party delivered 1.5 of 2 kW at 6 ct
    let entries = SettlementService::new().settle(
        &accounter,
        &deliveries(&[("solo", "1"), ("A", "1"), ("B", "0.5")]),
    )
    .unwrap();
    let by_agent: BTreeMap<&str, Decimal> =
        entries.iter().map(|e| (e.agent.as_str(), e.payoff)).collect();
    assert_eq!(by_agent["solo"], dec("2"));
    assert_eq!(by_agent["A"], dec("4.5"));
    assert_eq!(by_agent["B"], dec("4.5"));

    let a = entries.iter().find(|e| e.agent == "A").unwrap();
    assert_eq!(a.parties.len(), 1);
    assert_eq!(a.parties[0].party, party);
    assert_eq!(a.parties[0].provided_kw, dec("1.5"));
}

#[test]
fn test_no_result_settles_zero_for_everyone() {
    let accounter = cleared(open_auction("5"));
    assert!(accounter.result().unwrap().awarded_orders.is_empty());

    let entries = SettlementService::new()
        .settle(&accounter, &deliveries(&[("A", "1"), ("B", "-2")]))
        .unwrap();
    assert!(entries.iter().all(|e| e.payoff.is_zero()));
    assert!(entries.iter().all(|e| e.awarded_amount_kw.is_zero()));
    assert_eq!(entries[1].provided_power_kw, dec("-2"));
}

#[test]
fn test_three_way_group_delivering_in_full_is_paid_in_full() {
    let mut auction = open_auction("10");
    place(&mut auction, &["A", "B", "C"], "1", "3");
    let accounter = cleared(auction);

    // 1 kW does not divide evenly by three
    let share = accounter.return_awarded_sum("A");
    assert_eq!(accounter.return_awarded_sum("B"), share);
    let share = share.to_string();
    let share = share.as_str();

    let service = SettlementService::new();
    let entries = service
        .settle(&accounter, &deliveries(&[("A", share), ("B", share), ("C", share)]))
        .unwrap();
    let mut ledger = AccountStore::new();
    assert_eq!(service.book(&entries, &mut ledger).unwrap(), dec("3"));

    let balances: Decimal = ledger.balances().values().sum();
    assert_eq!(balances, dec("3"));
    assert!(ledger.verify().is_ok());
}
