//! Player versus player attacks.
//!
//! Attack power is level + fear + street_fighter; defense power is level +
//! fear + respect + bodyguards. A winner steals a share of the defender's
//! cash, scaled by the attacker's weapon and the defender's gear. A losing
//! attacker pays a smaller share to the defender.

use log::info;
use serde::Serialize;

use crate::game::catalog::{Catalog, GameAction, Slot, TalentEffect, UpgradeEffect};
use crate::game::engine::{Engine, Modifiers};
use crate::game::errors::{GameError, GameResult};
use crate::game::inventory::equipped_in;
use crate::game::locks::EntityKey;
use crate::game::storage::WriteBatch;
use crate::game::types::PlayerRecord;
use crate::game::views::{round2, PlayerView};

#[derive(Debug, Clone, Serialize)]
pub struct PvpOutcome {
    pub win: bool,
    pub cash_stolen: f64,
    pub your_power: f64,
    pub their_power: f64,
    pub player: PlayerView,
}

#[derive(Debug, Clone, Serialize)]
pub struct PvpTarget {
    pub telegram_id: i64,
    pub username: String,
    pub level: u32,
    pub reputation_fear: u64,
    pub gang_id: Option<u64>,
}

/// Steal bonus from the attacker's equipped weapon.
pub fn weapon_bonus(catalog: &Catalog, attacker: &PlayerRecord) -> f64 {
    equipped_in(catalog, attacker, Slot::Weapon)
        .and_then(|id| catalog.item(&id).ok())
        .and_then(|item| catalog.gangs.pvp.weapon.get(&item.rarity).copied())
        .unwrap_or(0.0)
}

/// Steal reduction from everything the defender wears, capped at `cap`.
pub fn defense_bonus(catalog: &Catalog, defender: &PlayerRecord, cap: f64) -> f64 {
    Slot::ALL
        .iter()
        .filter_map(|slot| equipped_in(catalog, defender, *slot))
        .filter_map(|id| catalog.item(&id).ok())
        .filter_map(|item| catalog.gangs.pvp.defense.get(&item.rarity).copied())
        .sum::<f64>()
        .min(cap)
}

impl Engine {
    fn attack_power(&self, player: &PlayerRecord, mods: &Modifiers) -> f64 {
        player.level() as f64 + mods.fear + mods.talents.get(TalentEffect::StreetFighter)
    }

    fn defense_power(&self, player: &PlayerRecord, mods: &Modifiers) -> f64 {
        let bodyguards = self
            .catalog
            .upgrade_by_effect(UpgradeEffect::PvpDefense)
            .map(|u| player.upgrade_level(&u.id))
            .unwrap_or(0);
        player.level() as f64
            + mods.fear
            + mods.respect
            + bodyguards as f64 * self.tuning.pvp_defense_per_bodyguard
    }

    pub fn pvp_attack(&self, telegram_id: i64, target_id: i64) -> GameResult<PvpOutcome> {
        if telegram_id == target_id {
            return Err(GameError::InvalidRequest("Can't attack yourself".into()));
        }
        let mut locks = self
            .locks
            .acquire_all(vec![EntityKey::Player(telegram_id), EntityKey::Player(target_id)])?;
        let mut attacker = self.touch(&locks, telegram_id)?;
        let mut defender = self.touch(&locks, target_id)?;
        let t = &self.tuning;
        if attacker.player.cash < t.pvp_min_cash {
            return Err(GameError::InsufficientFunds);
        }
        let now = self.now();
        if attacker.player.pvp_cooldown_ts > now {
            return Err(GameError::OnCooldown {
                remaining_secs: (attacker.player.pvp_cooldown_ts - now) as u64,
            });
        }

        let a_mods = self.modifiers(&attacker.player)?;
        let d_mods = self.modifiers(&defender.player)?;
        let your_power = self.attack_power(&attacker.player, &a_mods);
        let their_power = self.defense_power(&defender.player, &d_mods);
        let chance = t.win_chance(your_power, their_power);
        let win = self.roll(|rng| rng.chance(chance));

        let stolen = if win {
            let pct = t.pvp_steal_percent + weapon_bonus(&self.catalog, &attacker.player);
            let reduce = defense_bonus(&self.catalog, &defender.player, t.pvp_steal_percent_cap);
            let amount = round2((defender.player.cash * pct * (1.0 - reduce)).min(t.pvp_steal_cap))
                .min(defender.player.cash);
            defender.player.cash -= amount;
            attacker.player.cash += amount;
            attacker.player.stats.pvp_wins += 1;
            defender.player.stats.pvp_losses += 1;
            amount
        } else {
            let amount = round2((attacker.player.cash * t.pvp_loss_percent).min(t.pvp_loss_cap))
                .min(attacker.player.cash);
            attacker.player.cash -= amount;
            defender.player.cash += amount;
            attacker.player.stats.pvp_losses += 1;
            amount
        };
        attacker.player.pvp_cooldown_ts = now + t.pvp_cooldown_secs;
        self.track(&mut attacker, GameAction::PvpAttack, 1.0)?;

        let mut batch = WriteBatch::new();
        if win {
            self.track(&mut attacker, GameAction::PvpWin, 1.0)?;
            let war = match attacker.player.gang_id {
                Some(gang_id) => self
                    .store
                    .find_gang(gang_id)?
                    .and_then(|g| g.active_war)
                    .map(|war_id| (gang_id, war_id)),
                None => None,
            };
            if let (Some((gang_id, war_id)), Some(enemy)) = (war, defender.player.gang_id) {
                let points = self.catalog.gangs.war.score_per_pvp_win;
                self.score_war(&mut locks, &mut batch, war_id, gang_id, Some(enemy), points)?;
            }
        }
        let player = self.stage(&mut batch, attacker)?;
        self.stage(&mut batch, defender)?;
        self.store.commit(batch)?;
        info!(
            "pvp: {} attacked {}: win={} moved {:.2}",
            telegram_id, target_id, win, stolen
        );
        Ok(PvpOutcome {
            win,
            cash_stolen: stolen,
            your_power,
            their_power,
            player: self.view(&player),
        })
    }

    /// Five random players other than the caller.
    pub fn pvp_targets(&self, telegram_id: i64) -> GameResult<Vec<PvpTarget>> {
        let mut pool: Vec<PlayerRecord> = self
            .store
            .list_players()?
            .into_iter()
            .filter(|p| p.telegram_id != telegram_id)
            .collect();
        let mut picked = Vec::new();
        while picked.len() < 5 && !pool.is_empty() {
            let idx = self.roll(|rng| rng.below(pool.len()));
            let p = pool.swap_remove(idx);
            picked.push(PvpTarget {
                telegram_id: p.telegram_id,
                level: p.level(),
                reputation_fear: p.fear,
                gang_id: p.gang_id,
                username: p.username,
            });
        }
        Ok(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::seed::load_builtin;
    use crate::game::types::InventoryEntry;

    fn wear(player: &mut PlayerRecord, item_id: &str) {
        player.inventory.push(InventoryEntry {
            item_id: item_id.into(),
            equipped: true,
            acquired_at: 0,
        });
    }

    #[test]
    fn unarmed_players_have_no_bonuses() {
        let catalog = load_builtin().unwrap();
        let p = PlayerRecord::new(1, "a", 0.0, 0);
        assert_eq!(weapon_bonus(&catalog, &p), 0.0);
        assert_eq!(defense_bonus(&catalog, &p, 0.15), 0.0);
    }

    #[test]
    fn defense_bonus_respects_cap() {
        let catalog = load_builtin().unwrap();
        let mut p = PlayerRecord::new(1, "a", 0.0, 0);
        for slot in Slot::ALL {
            if let Some(item) = catalog.items.items.iter().find(|i| i.slot == slot) {
                wear(&mut p, &item.id);
            }
        }
        assert!(defense_bonus(&catalog, &p, 0.01) <= 0.01);
    }
}
