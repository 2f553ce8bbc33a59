mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use shadow_empire::game::GameError;

use common::game;

fn list_cap(g: &common::TestGame, seller: i64, price: f64) -> u64 {
    g.engine.shop_buy(seller, "hat_cap").unwrap();
    let out = g.engine.market_sell(seller, "hat_cap", price).unwrap();
    assert!(!out.inventory.iter().any(|e| e.item_id == "hat_cap"));
    out.my_listings[0].id
}

#[test]
fn sell_then_cancel_returns_the_item() {
    let g = game();
    g.player(1);
    let listing = list_cap(&g, 1, 250.0);
    let cash_listed = g.record(1).cash;

    let out = g.engine.market_cancel(1, listing).unwrap();
    assert!(out.inventory.iter().any(|e| e.item_id == "hat_cap"));
    assert!(out.my_listings.is_empty());
    assert_eq!(g.record(1).cash, cash_listed);
    assert!(g.engine.store().find_listing(listing).unwrap().is_none());
}

#[test]
fn price_below_minimum_is_rejected() {
    let g = game();
    g.player(1);
    g.engine.shop_buy(1, "hat_cap").unwrap();
    let min = g.engine.tuning().market_min_price;
    assert!(matches!(
        g.engine.market_sell(1, "hat_cap", min - 1.0),
        Err(GameError::PriceTooLow { .. })
    ));
    assert!(g.record(1).owns_item("hat_cap"));
}

#[test]
fn equipped_items_cannot_be_listed() {
    let g = game();
    g.player(1);
    g.engine.shop_buy(1, "hat_cap").unwrap();
    g.engine.equip(1, "hat_cap").unwrap();
    assert!(matches!(
        g.engine.market_sell(1, "hat_cap", 300.0),
        Err(GameError::ItemEquipped)
    ));
}

#[test]
fn sale_pays_seller_minus_commission() {
    let g = game();
    g.player(1);
    g.player(2);
    let listing = list_cap(&g, 1, 400.0);
    let seller_before = g.record(1).cash;
    let buyer_before = g.record(2).cash;

    let out = g.engine.market_buy(2, listing).unwrap();
    let commission = g.engine.tuning().market_commission;
    assert_eq!(out.seller_received, (400.0 * (1.0 - commission) * 100.0).round() / 100.0);
    assert_eq!(g.record(2).cash, buyer_before - 400.0);
    assert_eq!(g.record(1).cash, seller_before + out.seller_received);
    assert!(g.record(2).owns_item("hat_cap"));
    assert!(matches!(g.engine.market_buy(2, listing), Err(GameError::ListingGone)));
}

#[test]
fn sellers_cannot_buy_their_own_listing() {
    let g = game();
    g.player(1);
    let listing = list_cap(&g, 1, 300.0);
    assert!(matches!(
        g.engine.market_buy(1, listing),
        Err(GameError::InvalidRequest(_))
    ));
}

#[test]
fn exactly_one_of_two_racing_buyers_wins() {
    for round in 0..8 {
        let g = game();
        let seller = 100 + round;
        g.player(seller);
        g.player(1);
        g.player(2);
        let listing = list_cap(&g, seller, 300.0);

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [1_i64, 2]
            .into_iter()
            .map(|buyer| {
                let engine = g.engine.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    engine.market_buy(buyer, listing)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "round {round}");
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(GameError::ListingGone))));
        let owners = [1, 2].iter().filter(|id| g.record(**id).owns_item("hat_cap")).count();
        assert_eq!(owners, 1);
    }
}
