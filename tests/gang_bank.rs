mod common;

use shadow_empire::game::seed::load_builtin;
use shadow_empire::game::types::GangRole;
use shadow_empire::game::{EconomyTuning, GameError};

use common::{game, game_with, TestGame};

fn founded(g: &TestGame, leader: i64) -> u64 {
    g.player(leader);
    g.give_cash(leader, 500_000.0);
    let out = g.engine.create_gang(leader, "Night Owls", "OWL").unwrap();
    out.gang.expect("gang summary").id
}

#[test]
fn bank_short_of_upgrade_cost_changes_nothing() {
    let mut catalog = load_builtin().unwrap();
    let hq = catalog
        .gangs
        .upgrades
        .iter_mut()
        .find(|u| u.id == "gang_hq")
        .unwrap();
    hq.costs[0] = 50_000.0;
    let g = game_with(catalog, EconomyTuning::default());
    let gang_id = founded(&g, 1);
    g.engine.gang_deposit(1, 40_000.0).unwrap();

    assert!(matches!(
        g.engine.gang_upgrade(1, "gang_hq"),
        Err(GameError::InsufficientBankFunds)
    ));
    assert!(matches!(
        g.engine.gang_withdraw(1, 50_000.0),
        Err(GameError::InsufficientBankFunds)
    ));
    let gang = g.engine.store().get_gang(gang_id).unwrap();
    assert_eq!(gang.cash_bank, 40_000.0);
    assert_eq!(gang.upgrade_level("gang_hq"), 0);

    g.engine.gang_deposit(1, 10_000.0).unwrap();
    let out = g.engine.gang_upgrade(1, "gang_hq").unwrap();
    assert_eq!(out.level, 1);
    assert_eq!(out.gang.cash_bank, 0.0);
}

#[test]
fn creating_a_gang_costs_cash_and_names_are_unique() {
    let g = game();
    founded(&g, 1);
    let cost = g.engine.tuning().gang_create_cost;
    assert_eq!(g.record(1).cash, 500_000.0 - cost);

    g.player(2);
    g.give_cash(2, 500_000.0);
    assert!(matches!(
        g.engine.create_gang(2, "Night Owls", "NO"),
        Err(GameError::InvalidRequest(_))
    ));
    assert!(matches!(
        g.engine.create_gang(1, "Second", "SEC"),
        Err(GameError::AlreadyInGang)
    ));
}

#[test]
fn only_the_leader_withdraws() {
    let g = game();
    let gang_id = founded(&g, 1);
    g.player(2);
    g.give_cash(2, 20_000.0);
    g.engine.join_gang(2, gang_id).unwrap();
    g.engine.gang_deposit(2, 15_000.0).unwrap();
    assert_eq!(g.record(2).cash, 5_000.0);

    assert!(matches!(
        g.engine.gang_withdraw(2, 1_000.0),
        Err(GameError::NotLeader(_))
    ));
    let before = g.record(1).cash;
    g.engine.gang_withdraw(1, 15_000.0).unwrap();
    assert_eq!(g.record(1).cash, before + 15_000.0);
    assert_eq!(g.engine.store().get_gang(gang_id).unwrap().cash_bank, 0.0);
}

#[test]
fn deposits_cannot_exceed_cash() {
    let g = game();
    let gang_id = founded(&g, 1);
    let cash = g.record(1).cash;
    assert!(matches!(
        g.engine.gang_deposit(1, cash + 1.0),
        Err(GameError::InsufficientFunds)
    ));
    assert!(matches!(
        g.engine.gang_deposit(1, -10.0),
        Err(GameError::InvalidRequest(_))
    ));
    assert_eq!(g.engine.store().get_gang(gang_id).unwrap().cash_bank, 0.0);
}

#[test]
fn officers_cannot_kick_or_withdraw() {
    let g = game();
    let gang_id = founded(&g, 1);
    for id in [2, 3] {
        g.player(id);
        g.engine.join_gang(id, gang_id).unwrap();
    }
    g.engine.set_member_role(1, 2, GangRole::Officer).unwrap();
    assert!(matches!(g.engine.kick_member(2, 3), Err(GameError::NotLeader(_))));
    g.engine.kick_member(1, 3).unwrap();
    assert_eq!(g.record(3).gang_id, None);
    assert!(matches!(
        g.engine.gang_withdraw(2, 1.0),
        Err(GameError::NotLeader(_))
    ));
}
