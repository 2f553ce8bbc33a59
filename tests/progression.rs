mod common;

use std::thread;

use shadow_empire::game::types::OwnedBusiness;
use shadow_empire::game::GameError;

use common::game;

fn set_level(g: &common::TestGame, telegram_id: i64, level: u32) {
    g.edit_player(telegram_id, |p| {
        p.businesses = vec![OwnedBusiness {
            business_id: "car_wash".into(),
            level,
            has_manager: false,
        }];
    });
}

#[test]
fn mission_claim_checks_progress_then_claimed() {
    let g = game();
    let player = g.player(1);
    let mission_id = player.missions.entries.first().expect("daily missions").mission_id.clone();
    let target = g.engine.catalog().mission(&mission_id).unwrap().target;
    let reward = g.engine.catalog().mission(&mission_id).unwrap().reward;

    assert!(matches!(
        g.engine.claim_mission(1, "no_such_mission"),
        Err(GameError::NotFound(_))
    ));
    assert!(matches!(
        g.engine.claim_mission(1, &mission_id),
        Err(GameError::NotCompleted)
    ));

    g.edit_player(1, |p| {
        let entry = p.missions.entries.iter_mut().find(|e| e.mission_id == mission_id).unwrap();
        entry.progress = target;
    });
    let cash = g.record(1).cash;
    let out = g.engine.claim_mission(1, &mission_id).unwrap();
    assert_eq!(out.reward, reward);
    assert_eq!(out.player.cash, cash + reward);

    assert!(matches!(
        g.engine.claim_mission(1, &mission_id),
        Err(GameError::AlreadyClaimed)
    ));
    assert_eq!(g.record(1).cash, cash + reward);
}

#[test]
fn prestige_succeeds_exactly_once() {
    let g = game();
    g.player(1);
    let required = g.engine.catalog().progression.prestige.required_level(0);
    set_level(&g, 1, required);
    g.give_cash(1, 123_456.0);
    g.engine.shop_buy(1, "hat_cap").unwrap();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let engine = g.engine.clone();
            thread::spawn(move || engine.prestige(1))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(GameError::LevelRequired { .. }))));

    let out = results.iter().find_map(|r| r.as_ref().ok()).unwrap();
    assert!(out.businesses.is_empty());
    assert_eq!(out.player_level, 0);
    assert_eq!(out.income_per_sec, 0.0);
    // Nothing left to generate heat.
    assert!(out.suspicion_per_sec <= 0.0);
    assert_eq!(out.prestige_level, 1);
    assert_eq!(out.talent_points, 1);
    let body = serde_json::to_value(out).unwrap();
    for key in [
        "player",
        "businesses",
        "income_per_sec",
        "suspicion_per_sec",
        "player_level",
        "prestige_level",
        "prestige_multiplier",
        "talent_points",
    ] {
        assert!(body.get(key).is_some(), "missing {}", key);
    }

    let p = g.record(1);
    assert_eq!(p.prestige_level, 1);
    assert_eq!(p.talent_points, 1);
    assert!(p.businesses.is_empty());
    assert_eq!(p.cash, g.engine.tuning().prestige_starting_cash);
    assert!(p.prestige_multiplier > 1.0);
    // Inventory survives the reset.
    assert!(p.owns_item("hat_cap"));
}

#[test]
fn prestige_below_required_level_fails() {
    let g = game();
    g.player(1);
    set_level(&g, 1, 3);
    assert!(matches!(g.engine.prestige(1), Err(GameError::LevelRequired { .. })));
    assert_eq!(g.record(1).prestige_level, 0);
}

#[test]
fn talents_spend_points() {
    let g = game();
    g.player(1);
    assert!(matches!(
        g.engine.assign_talent(1, "passive_income"),
        Err(GameError::NoPoints)
    ));
    g.edit_player(1, |p| p.talent_points = 1);
    let out = g.engine.assign_talent(1, "passive_income").unwrap();
    assert_eq!(out.level, 1);
    assert_eq!(out.talent_points, 0);
}

#[test]
fn login_reward_once_per_calendar_day() {
    let g = game();
    g.player(1);
    let first = g.engine.claim_login(1).unwrap();
    assert_eq!(first.streak, 1);
    assert!(matches!(g.engine.claim_login(1), Err(GameError::AlreadyClaimed)));

    g.clock.advance(24 * 3600);
    let second = g.engine.claim_login(1).unwrap();
    assert_eq!(second.streak, 2);

    // Skipping a day restarts the streak.
    g.clock.advance(2 * 24 * 3600);
    assert_eq!(g.engine.claim_login(1).unwrap().streak, 1);
}

#[test]
fn referral_pays_both_sides() {
    let g = game();
    g.player(1);
    let before = g.record(1).cash;
    let bonus = g.engine.tuning().referral_bonus;

    let boot = g.engine.init(2, "newbie", Some("ref_1")).unwrap();
    assert!(boot.created);
    assert_eq!(boot.player.cash, g.engine.tuning().starting_cash + bonus);

    // The referrer is credited on their next touch.
    let referrer = g.engine.collect(1).unwrap().player;
    assert_eq!(referrer.cash, before + bonus);
    assert_eq!(referrer.referral_count, 1);
}

#[test]
fn bad_referral_codes_are_rejected() {
    let g = game();
    g.player(1);
    for code in ["ref_999", "ref_3", "garbage"] {
        assert!(matches!(
            g.engine.init(3, "x", Some(code)),
            Err(GameError::InvalidReferral)
        ));
    }
    assert!(g.engine.store().find_player(3).unwrap().is_none());
}

#[test]
fn leaderboard_orders_by_total_earned() {
    let g = game();
    g.player(1);
    g.player(2);
    g.edit_player(1, |p| p.total_earned = 10.0);
    g.edit_player(2, |p| p.total_earned = 500.0);
    let board = g.engine.leaderboard().unwrap();
    assert_eq!(board[0].telegram_id, 2);
    assert_eq!(board[1].telegram_id, 1);
}
