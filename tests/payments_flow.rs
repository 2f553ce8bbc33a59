mod common;

use shadow_empire::game::payments::{Settlement, TonTransfer};
use shadow_empire::game::types::{PaymentMethod, PaymentStatus};
use shadow_empire::game::GameError;

use common::game;

#[test]
fn stars_charge_grants_exactly_once() {
    let g = game();
    g.player(1);
    let cash = g.record(1).cash;
    let payment = g.engine.create_payment(1, "cash_small", PaymentMethod::Stars).unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);

    let first = g.engine.confirm_stars(&payment.id, "charge-1", 10).unwrap();
    assert!(matches!(first, Settlement::Ok { .. }));
    assert_eq!(g.record(1).cash, cash + 50_000.0);
    // Purchased cash is not income.
    assert_eq!(g.record(1).total_earned, 0.0);

    let again = g.engine.confirm_stars(&payment.id, "charge-1", 10).unwrap();
    assert!(matches!(again, Settlement::AlreadyProcessed { .. }));
    assert_eq!(g.record(1).cash, cash + 50_000.0);
    assert_eq!(g.engine.payment(&payment.id).unwrap().status, PaymentStatus::Completed);
}

#[test]
fn stars_underpayment_is_rejected() {
    let g = game();
    g.player(1);
    let payment = g.engine.create_payment(1, "vip_week", PaymentMethod::Stars).unwrap();
    assert!(matches!(
        g.engine.confirm_stars(&payment.id, "charge-2", 50),
        Err(GameError::PaymentUnverified(_))
    ));
    assert!(!g.record(1).is_vip(common::START));
}

#[test]
fn vip_purchase_extends_from_now() {
    let g = game();
    g.player(1);
    let payment = g.engine.create_payment(1, "vip_week", PaymentMethod::Stars).unwrap();
    g.engine.confirm_stars(&payment.id, "charge-3", 100).unwrap();
    assert_eq!(g.record(1).vip_until, common::START + 7 * 86_400);

    let second = g.engine.create_payment(1, "vip_week", PaymentMethod::Stars).unwrap();
    g.engine.confirm_stars(&second.id, "charge-4", 100).unwrap();
    assert_eq!(g.record(1).vip_until, common::START + 14 * 86_400);
}

#[test]
fn ton_transfer_matched_by_comment_and_amount() {
    let g = game();
    g.player(1);
    let payment = g.engine.create_payment(1, "cash_small", PaymentMethod::Ton).unwrap();
    assert!(payment.amount_nano > 0);
    let cash = g.record(1).cash;

    let short = TonTransfer {
        hash: "tx-short".into(),
        value_nano: payment.amount_nano / 2,
        comment: payment.comment.clone(),
    };
    let pending = g.engine.confirm_ton(1, &payment.id, &[short.clone()], 0.95).unwrap();
    assert!(matches!(pending, Settlement::Pending));
    assert_eq!(g.record(1).cash, cash);

    let paid = TonTransfer {
        hash: "tx-paid".into(),
        value_nano: payment.amount_nano,
        comment: payment.comment.clone(),
    };
    let settled = g.engine.confirm_ton(1, &payment.id, &[short, paid.clone()], 0.95).unwrap();
    assert!(matches!(settled, Settlement::Ok { .. }));
    assert_eq!(g.record(1).cash, cash + 50_000.0);

    // Re-polling after settlement grants nothing further.
    let again = g.engine.confirm_ton(1, &payment.id, &[paid], 0.95).unwrap();
    assert!(matches!(again, Settlement::AlreadyProcessed { .. }));
    assert_eq!(g.record(1).cash, cash + 50_000.0);
}

#[test]
fn ton_invoice_belongs_to_its_player() {
    let g = game();
    g.player(1);
    g.player(2);
    let payment = g.engine.create_payment(1, "cash_small", PaymentMethod::Ton).unwrap();
    assert!(matches!(
        g.engine.confirm_ton(2, &payment.id, &[], 0.95),
        Err(GameError::PaymentUnverified(_))
    ));
}

#[test]
fn unknown_package_is_not_found() {
    let g = game();
    g.player(1);
    assert!(matches!(
        g.engine.create_payment(1, "free_money", PaymentMethod::Stars),
        Err(GameError::NotFound(_))
    ));
}
