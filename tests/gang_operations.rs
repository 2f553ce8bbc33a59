mod common;

use shadow_empire::game::types::{HeistStatus, WarStatus};
use shadow_empire::game::GameError;

use common::TestGame;

fn gang_of(g: &TestGame, leader: i64, name: &str, tag: &str, members: &[i64]) -> u64 {
    g.player(leader);
    g.give_cash(leader, 1_000_000.0);
    let gang_id = g.engine.create_gang(leader, name, tag).unwrap().gang.unwrap().id;
    for id in members {
        g.player(*id);
        g.engine.join_gang(*id, gang_id).unwrap();
    }
    gang_id
}

#[test]
fn heist_splits_the_take_between_the_crew() {
    let g = common::game();
    let gang_id = gang_of(&g, 1, "Crew One", "C1", &[2]);
    let heist = g.engine.start_heist(1, "jewelry").unwrap().heist;

    assert!(matches!(
        g.engine.execute_heist(1, heist.id),
        Err(GameError::NotEnoughParticipants { required: 2 })
    ));
    g.engine.join_heist(2, heist.id).unwrap();
    assert!(matches!(
        g.engine.join_heist(2, heist.id),
        Err(GameError::InvalidRequest(_))
    ));

    let crew_cash = g.record(2).cash;
    let out = g.engine.execute_heist(1, heist.id).unwrap();
    assert_eq!(out.participants, 2);
    assert!(out.total_reward >= 20_000.0 + 2.0 * 5_000.0);
    assert_eq!(out.share, (out.total_reward / 2.0 * 100.0).round() / 100.0);

    // The second member is paid when their record is next touched.
    let member = g.engine.collect(2).unwrap().player;
    assert_eq!(member.cash, crew_cash + out.share);
    assert_eq!(member.stats.heists_completed, 1);

    assert!(g.engine.heists(gang_id).unwrap().is_empty());
    assert!(matches!(
        g.engine.start_heist(1, "jewelry"),
        Err(GameError::OnCooldown { .. })
    ));
}

#[test]
fn understaffed_heists_expire_in_maintenance() {
    let g = common::game();
    gang_of(&g, 1, "Crew One", "C1", &[]);
    let heist = g.engine.start_heist(1, "jewelry").unwrap().heist;

    g.clock.advance(heist.expires_at - common::START + 1);
    let report = g.engine.run_maintenance().unwrap();
    assert_eq!(report.heists_expired, 1);
    let stored = g.engine.store().find_heist(heist.id).unwrap().unwrap();
    assert_eq!(stored.status, HeistStatus::Expired);

    // The gang can start again; the cooldown only follows an executed heist.
    g.engine.start_heist(1, "jewelry").unwrap();
}

#[test]
fn war_costs_the_bank_and_a_draw_pays_both_sides() {
    let g = common::game();
    let red = gang_of(&g, 1, "Red Hand", "RED", &[]);
    let blue = gang_of(&g, 2, "Blue Line", "BLU", &[]);
    let rules = g.engine.catalog().gangs.war.clone();

    assert!(matches!(
        g.engine.declare_war(1, blue),
        Err(GameError::InsufficientBankFunds)
    ));
    g.engine.gang_deposit(1, rules.declare_cost).unwrap();
    let view = g.engine.declare_war(1, blue).unwrap();
    assert_eq!(view.war.status, WarStatus::Active);
    assert_eq!(g.engine.store().get_gang(red).unwrap().cash_bank, 0.0);
    assert!(matches!(
        g.engine.declare_war(2, red),
        Err(GameError::InvalidRequest(_))
    ));

    g.clock.advance(rules.duration as i64);
    assert_eq!(g.engine.run_maintenance().unwrap().wars_finalized, 1);
    let war = g.engine.store().find_war(view.war.id).unwrap().unwrap();
    assert_eq!(war.status, WarStatus::Finished);
    assert_eq!(war.winner_gang_id, None);
    for id in [red, blue] {
        let gang = g.engine.store().get_gang(id).unwrap();
        assert_eq!(gang.cash_bank, rules.loser_reward);
        assert_eq!(gang.active_war, None);
    }
    // Finalizing twice settles nothing further.
    assert!(!g.engine.finalize_war(view.war.id).unwrap());
}

#[test]
fn leaving_then_rejoining() {
    let g = common::game();
    let gang_id = gang_of(&g, 1, "Crew One", "C1", &[2]);
    assert!(matches!(
        g.engine.join_gang(2, gang_id),
        Err(GameError::AlreadyInGang)
    ));
    g.engine.leave_gang(2).unwrap();
    assert_eq!(g.record(2).gang_id, None);
    g.engine.join_gang(2, gang_id).unwrap();
}

#[test]
fn admin_reset_hands_the_gang_on_and_drops_listings() {
    let g = common::game();
    let gang_id = gang_of(&g, 1, "Crew One", "C1", &[2]);
    g.engine.shop_buy(1, "hat_cap").unwrap();
    let listing = g.engine.market_sell(1, "hat_cap", 300.0).unwrap().my_listings[0].id;

    assert!(g.engine.admin_reset_player(1).unwrap());
    assert!(g.engine.store().find_player(1).unwrap().is_none());
    assert!(g.engine.store().find_listing(listing).unwrap().is_none());
    let gang = g.engine.store().get_gang(gang_id).unwrap();
    assert_eq!(gang.leader_id, 2);
    assert_eq!(gang.members.len(), 1);

    // Nothing left to delete; a fresh init starts over.
    assert!(!g.engine.admin_reset_player(1).unwrap());
    assert_eq!(g.player(1).gang_id, None);
}
