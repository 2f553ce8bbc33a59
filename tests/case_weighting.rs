mod common;

use rand::rngs::StdRng;
use rand::SeedableRng;

use shadow_empire::game::cases::draw;
use shadow_empire::game::{GameError, RandomSource};

use common::game;

#[test]
fn equal_weights_split_evenly() {
    let mut rng = StdRng::seed_from_u64(2024);
    let weights = [1.0, 1.0];
    let mut hits = [0usize; 2];
    for _ in 0..10_000 {
        hits[draw(&weights, &mut rng).unwrap()] += 1;
    }
    for h in hits {
        let share = h as f64 / 10_000.0;
        assert!((0.45..=0.55).contains(&share), "share {share}");
    }
}

#[test]
fn skewed_weights_follow_ratio() {
    let mut rng = StdRng::seed_from_u64(7);
    let weights = [3.0, 0.0, 1.0];
    let mut hits = [0usize; 3];
    for _ in 0..20_000 {
        hits[rng.weighted_index(&weights).unwrap()] += 1;
    }
    assert_eq!(hits[1], 0);
    let share = hits[0] as f64 / 20_000.0;
    assert!((0.72..=0.78).contains(&share), "share {share}");
}

#[test]
fn empty_loot_is_a_content_error() {
    let mut rng = StdRng::seed_from_u64(1);
    assert!(matches!(draw(&[0.0, 0.0], &mut rng), Err(GameError::Content(_))));
}

#[test]
fn opened_case_is_consumed_and_pays_out() {
    let g = game();
    g.player(1);
    g.give_cash(1, 100_000.0);
    let bought = g.engine.buy_case(1, "case_basic").unwrap();
    let owned = bought.player_cases[0].id;

    let out = g.engine.open_case(1, owned).unwrap();
    let record = g.record(1);
    assert!(record.cases.iter().all(|c| c.id != owned));
    match &out.won_item_id {
        Some(item) => assert!(record.owns_item(item)),
        None => assert!(out.cash_compensation > 0.0),
    }
    assert!(matches!(g.engine.open_case(1, owned), Err(GameError::NotFound(_))));
}
