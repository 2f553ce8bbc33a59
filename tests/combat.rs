mod common;

use rand::rngs::StdRng;
use rand::SeedableRng;

use shadow_empire::game::storage::WriteBatch;
use shadow_empire::game::{EconomyTuning, GameError, RandomSource};

use common::scripted;

#[test]
fn equal_power_is_a_coin_flip_and_stronger_sides_win_more() {
    let tuning = EconomyTuning::default();
    assert_eq!(tuning.win_chance(0.0, 0.0), 0.5);
    assert_eq!(tuning.win_chance(12.0, 12.0), 0.5);
    // Lopsided fights stay inside the band.
    assert_eq!(tuning.win_chance(10_000.0, 1.0), tuning.combat_max_chance);
    assert_eq!(tuning.win_chance(1.0, 10_000.0), tuning.combat_min_chance);

    let chance = tuning.win_chance(30.0, 10.0);
    assert_eq!(chance, 0.75);
    let mut rng = StdRng::seed_from_u64(7);
    let wins = (0..10_000).filter(|_| rng.chance(chance)).count();
    assert!((7_200..=7_800).contains(&wins), "wins = {}", wins);
}

#[test]
fn pvp_between_equals_turns_on_the_half() {
    for (sample, attacker_wins) in [(0.49, true), (0.5, false)] {
        let g = scripted(sample);
        g.player(1);
        g.player(2);
        g.give_cash(1, 10_000.0);
        g.give_cash(2, 10_000.0);

        let out = g.engine.pvp_attack(1, 2).unwrap();
        assert_eq!(out.your_power, out.their_power);
        assert_eq!(out.win, attacker_wins);
        assert!(out.cash_stolen > 0.0);
        let (winner, loser) = if attacker_wins { (1, 2) } else { (2, 1) };
        assert_eq!(g.record(winner).cash, 10_000.0 + out.cash_stolen);
        assert_eq!(g.record(loser).cash, 10_000.0 - out.cash_stolen);

        assert!(matches!(g.engine.pvp_attack(1, 2), Err(GameError::OnCooldown { .. })));
    }
}

#[test]
fn pvp_needs_pocket_money() {
    let g = scripted(0.0);
    g.player(1);
    g.player(2);
    g.give_cash(1, g.engine.tuning().pvp_min_cash - 1.0);
    assert!(matches!(g.engine.pvp_attack(1, 2), Err(GameError::InsufficientFunds)));
    assert!(matches!(g.engine.pvp_attack(1, 1), Err(GameError::InvalidRequest(_))));
}

#[test]
fn territory_captures_and_pvp_wins_score_the_war() {
    let g = scripted(0.0);
    let red = g.gang(1, "Red Hand", "RED", &[]);
    let blue = g.gang(2, "Blue Line", "BLU", &[]);
    let rules = g.engine.catalog().gangs.war.clone();
    g.engine.gang_deposit(1, rules.declare_cost).unwrap();
    let war_id = g.engine.declare_war(1, blue).unwrap().war.id;

    let out = g.engine.attack_territory(1, 1).unwrap();
    assert!(out.win);
    assert_eq!(out.defender_power, g.engine.tuning().unclaimed_territory_defense);
    let port = out.territories.iter().find(|t| t.id == 1).unwrap();
    assert_eq!(port.owner_gang_id, Some(red));
    assert!(matches!(
        g.engine.attack_territory(1, 2),
        Err(GameError::OnCooldown { .. })
    ));

    // Blue takes it back from a defended position.
    let back = g.engine.attack_territory(2, 1).unwrap();
    assert!(back.win);
    assert!(back.defender_power >= g.engine.tuning().territory_defender_bonus);
    assert_eq!(g.engine.store().get_territory(1).unwrap().owner_gang_id, Some(blue));

    let pvp = g.engine.pvp_attack(1, 2).unwrap();
    assert!(pvp.win);

    let war = g.engine.store().find_war(war_id).unwrap().unwrap();
    assert_eq!(war.attacker_score, rules.score_per_territory + rules.score_per_pvp_win);
    assert_eq!(war.defender_score, rules.score_per_territory);
}

#[test]
fn territory_attack_can_fail_and_still_costs_the_cooldown() {
    let g = scripted(0.99);
    let red = g.gang(1, "Red Hand", "RED", &[]);
    let out = g.engine.attack_territory(1, 1).unwrap();
    assert!(!out.win);
    assert_eq!(g.engine.store().get_territory(1).unwrap().owner_gang_id, None);
    assert!(g.engine.store().get_gang(red).unwrap().last_territory_attack_ts > 0);
    assert!(matches!(
        g.engine.attack_territory(1, 1),
        Err(GameError::OnCooldown { .. })
    ));

    // Members without rank cannot send the gang.
    g.player(3);
    g.engine.join_gang(3, red).unwrap();
    assert!(matches!(
        g.engine.attack_territory(3, 2),
        Err(GameError::NotLeader(_))
    ));
}

#[test]
fn boss_kill_splits_the_pool_and_pays_absent_members_later() {
    let g = scripted(0.0);
    let gang_id = g.gang(1, "Red Hand", "RED", &[2]);

    let first = g.engine.attack_boss(2, gang_id).unwrap();
    assert!(first.damage > 0);
    assert!(first.rewards.is_none());
    assert_eq!(first.boss_data.boss_id, "corrupt_cop");
    assert_eq!(first.boss_data.max_health, 5_000 + 1_000 * 2);
    assert!(matches!(
        g.engine.attack_boss(2, gang_id),
        Err(GameError::OnCooldown { .. })
    ));

    // Leave the boss one hit from death.
    let mut boss = g.engine.store().find_boss(gang_id).unwrap().unwrap();
    boss.current_hp = 1;
    let mut batch = WriteBatch::new();
    batch.put_boss(&boss).unwrap();
    g.engine.store().commit(batch).unwrap();

    let leader_cash = g.record(1).cash;
    let member_cash = g.record(2).cash;
    let kill = g.engine.attack_boss(1, gang_id).unwrap();
    let rewards = kill.rewards.expect("killing blow pays out");
    assert_eq!(rewards.boss_id, "corrupt_cop");
    let leader_share = rewards.payouts[&1];
    let member_share = rewards.payouts[&2];
    assert!(member_share > 0.0);
    assert!((leader_share + member_share - 50_000.0).abs() <= 1.0);
    assert_eq!(g.record(1).cash, leader_cash + leader_share);
    assert_eq!(g.record(1).stats.bosses_killed, 1);

    // The member's share waits in the inbox until their next request.
    assert_eq!(g.engine.store().get_player(2).unwrap().cash, member_cash);
    assert_eq!(g.engine.collect(2).unwrap().player.cash, member_cash + member_share);

    assert_eq!(kill.boss_data.boss_id, "cartel_boss");
    assert_eq!(kill.boss_data.max_health, 15_000 + 2_500 * 2);

    g.player(3);
    assert!(matches!(
        g.engine.attack_boss(3, gang_id),
        Err(GameError::InvalidRequest(_))
    ));
}
