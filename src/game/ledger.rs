//! Business purchases, managers and personal upgrades.

use serde::Serialize;

use crate::game::catalog::{BusinessDef, BusinessKind, GameAction, TalentEffect, UpgradeEffect};
use crate::game::engine::{Engine, Rates};
use crate::game::errors::{GameError, GameResult};
use crate::game::prestige::TalentBonuses;
use crate::game::types::{OwnedBusiness, PlayerRecord};
use crate::game::views::{round2, PlayerView};

#[derive(Debug, Clone, Serialize)]
pub struct BusinessOutcome {
    pub player: PlayerView,
    pub businesses: Vec<OwnedBusiness>,
    pub income_per_sec: f64,
    pub suspicion_per_sec: f64,
    pub player_level: u32,
    pub cash_before: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpgradeOutcome {
    pub player: PlayerView,
    pub upgrade_id: String,
    pub level: u32,
    pub cost: f64,
}

impl Engine {
    /// Price of the next level of `def` for this player after discounts.
    pub fn business_price(&self, player: &PlayerRecord, def: &BusinessDef) -> f64 {
        let t = &self.tuning;
        let base = def.cost_at(player.business_level(&def.id));
        let reputation = match def.kind {
            BusinessKind::Shadow => player.fear,
            BusinessKind::Legal => player.respect,
        };
        let talents = TalentBonuses::for_player(&self.catalog, player);
        let discount = ((reputation as f64 * t.reputation_discount).min(t.reputation_discount_cap)
            + talents.get(TalentEffect::TradeGrip) / 100.0)
            .min(t.total_discount_cap);
        round2(base * (1.0 - discount))
    }

    /// Buy the first level of a business or add a level to an owned one.
    pub fn buy_business(&self, telegram_id: i64, business_id: &str) -> GameResult<BusinessOutcome> {
        let def = self.catalog.business(business_id)?.clone();
        let ((cash_before, cost), player) = self.with_player(telegram_id, |txn, _| {
            if txn.player.level() < def.unlock_level {
                return Err(GameError::LevelRequired {
                    required: def.unlock_level,
                });
            }
            let cash_before = txn.player.cash;
            let cost = self.business_price(&txn.player, &def);
            self.try_spend(&mut txn.player, cost)?;
            match txn.player.business_mut(&def.id) {
                Some(owned) => owned.level += 1,
                None => txn.player.businesses.push(OwnedBusiness {
                    business_id: def.id.clone(),
                    level: 1,
                    has_manager: false,
                }),
            }
            match def.kind {
                BusinessKind::Shadow => txn.player.fear += 1,
                BusinessKind::Legal => txn.player.respect += 1,
            }
            self.track(txn, GameAction::BuyBusiness, 1.0)?;
            Ok((cash_before, cost))
        })?;
        self.business_outcome(player, cash_before, cost)
    }

    /// One-time manager hire for an owned business.
    pub fn buy_manager(&self, telegram_id: i64, business_id: &str) -> GameResult<BusinessOutcome> {
        let def = self.catalog.business(business_id)?.clone();
        let (cash_before, player) = self.with_player(telegram_id, |txn, _| {
            let cash_before = txn.player.cash;
            let owned = txn
                .player
                .businesses
                .iter()
                .find(|b| b.business_id == def.id && b.level > 0)
                .ok_or(GameError::NotOwned)?;
            if owned.has_manager {
                return Err(GameError::AlreadyOwned);
            }
            self.try_spend(&mut txn.player, def.manager_cost)?;
            if let Some(owned) = txn.player.business_mut(&def.id) {
                owned.has_manager = true;
            }
            Ok(cash_before)
        })?;
        self.business_outcome(player, cash_before, def.manager_cost)
    }

    fn business_outcome(&self, player: PlayerRecord, cash_before: f64, cost: f64) -> GameResult<BusinessOutcome> {
        let Rates {
            income_per_sec,
            suspicion_per_sec,
        } = self.current_rates(&player)?;
        Ok(BusinessOutcome {
            player: self.view(&player),
            player_level: player.level(),
            businesses: player.businesses,
            income_per_sec,
            suspicion_per_sec,
            cash_before,
            cost,
        })
    }

    /// Buy the next level of a personal upgrade and apply its effect.
    pub fn buy_upgrade(&self, telegram_id: i64, upgrade_id: &str) -> GameResult<UpgradeOutcome> {
        let def = self.catalog.upgrade(upgrade_id)?.clone();
        let ((level, cost), player) = self.with_player(telegram_id, |txn, _| {
            let current = txn.player.upgrade_level(&def.id);
            let cost = def.cost_at(current);
            self.try_spend(&mut txn.player, cost)?;
            let p = &mut txn.player;
            p.upgrades.insert(def.id.clone(), current + 1);
            match def.effect {
                UpgradeEffect::SuspicionReset => p.suspicion = 0.0,
                UpgradeEffect::RaidProtection => p.raid_shields += 1,
                UpgradeEffect::IncomeBoost => {}
                UpgradeEffect::Territory => {
                    p.fear += 3;
                    p.respect += 3;
                }
                UpgradeEffect::PvpDefense => p.respect += 5,
            }
            Ok((current + 1, cost))
        })?;
        Ok(UpgradeOutcome {
            player: self.view(&player),
            upgrade_id: def.id,
            level,
            cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::seed::load_builtin;
    use crate::game::storage::GameStoreBuilder;
    use tempfile::TempDir;

    fn engine() -> (TempDir, Engine) {
        let tmp = TempDir::new().unwrap();
        let store = GameStoreBuilder::new(tmp.path().join("db")).open().unwrap();
        let engine = Engine::builder(store).catalog(load_builtin().unwrap()).build().unwrap();
        (tmp, engine)
    }

    #[test]
    fn reputation_discount_is_capped() {
        let (_tmp, engine) = engine();
        let def = engine.catalog().business("car_wash").unwrap().clone();
        let mut p = PlayerRecord::new(1, "neo", 0.0, 0);
        assert_eq!(engine.business_price(&p, &def), 800.0);
        p.respect = 10;
        assert_eq!(engine.business_price(&p, &def), 720.0);
        p.respect = 500;
        assert_eq!(engine.business_price(&p, &def), 560.0);
        p.talents.insert("trade_grip".into(), 5);
        assert_eq!(engine.business_price(&p, &def), 440.0);
    }

    #[test]
    fn shadow_price_uses_fear() {
        let (_tmp, engine) = engine();
        let def = engine.catalog().business("street_dealer").unwrap().clone();
        let mut p = PlayerRecord::new(1, "neo", 0.0, 0);
        p.respect = 20;
        assert_eq!(engine.business_price(&p, &def), 1200.0);
        p.fear = 20;
        assert_eq!(engine.business_price(&p, &def), 960.0);
    }
}
