//! Solo robberies.

use log::debug;
use serde::Serialize;

use crate::game::catalog::{GameAction, RobberyDef, TalentEffect};
use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::prestige::TalentBonuses;
use crate::game::views::{round2, PlayerView};

#[derive(Debug, Clone, Serialize)]
pub struct RobberyOutcome {
    pub success: bool,
    pub reward: f64,
    pub suspicion_gain: f64,
    pub cooldown_secs: i64,
    pub cash_before: f64,
    pub player: PlayerView,
}

/// Fear adds to the base success chance up to a cap.
pub fn robbery_chance(def: &RobberyDef, fear: f64, bonus_per_fear: f64, bonus_cap: f64, max_chance: f64) -> f64 {
    (def.success_chance + (fear * bonus_per_fear).min(bonus_cap)).min(max_chance)
}

impl Engine {
    pub fn robbery(&self, telegram_id: i64, robbery_id: &str) -> GameResult<RobberyOutcome> {
        let def = self.catalog.robbery(robbery_id)?.clone();
        let t = &self.tuning;
        let now = self.now();
        let (outcome, player) = self.with_player(telegram_id, |txn, _| {
            if txn.player.level() < def.unlock_level {
                return Err(GameError::LevelRequired {
                    required: def.unlock_level,
                });
            }
            if txn.player.robbery_cooldown_ts > now {
                return Err(GameError::OnCooldown {
                    remaining_secs: (txn.player.robbery_cooldown_ts - now) as u64,
                });
            }
            let cash_before = txn.player.cash;
            let talents = TalentBonuses::for_player(&self.catalog, &txn.player);
            let chance = robbery_chance(
                &def,
                txn.player.fear as f64,
                t.robbery_fear_bonus,
                t.robbery_fear_bonus_cap,
                t.robbery_max_chance,
            );
            let event = self.catalog.event_bonuses();
            let (success, reward) = self.roll(|rng| {
                if rng.chance(chance) {
                    let raw = rng.uniform(def.min_reward, def.max_reward);
                    (true, raw)
                } else {
                    (false, 0.0)
                }
            });
            let reward = round2(
                reward * (1.0 + talents.get(TalentEffect::BigLoot) / 100.0) * event.robbery_multiplier,
            );
            let cooldown = (def.cooldown_seconds * (1.0 - talents.get(TalentEffect::RobberyMaster) / 100.0))
                .max(t.robbery_min_cooldown_secs)
                .round() as i64;

            let p = &mut txn.player;
            p.earn(reward);
            p.add_suspicion(def.suspicion_gain);
            p.robbery_cooldown_ts = now + cooldown;
            p.fear += 2;
            p.stats.total_robberies += 1;
            if success {
                p.stats.successful_robberies += 1;
            }
            debug!("robbery {} by {}: success={} reward={}", def.id, telegram_id, success, reward);

            self.track(txn, GameAction::Robbery, 1.0)?;
            if success {
                self.track(txn, GameAction::RobberySuccess, 1.0)?;
            }
            Ok(RobberyOutcome {
                success,
                reward,
                suspicion_gain: def.suspicion_gain,
                cooldown_secs: cooldown,
                cash_before,
                player: self.view(&txn.player),
            })
        })?;
        Ok(RobberyOutcome {
            player: self.view(&player),
            ..outcome
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::seed::load_builtin;

    #[test]
    fn fear_bonus_and_total_are_capped() {
        let catalog = load_builtin().unwrap();
        let def = catalog.robbery("pickpocket").unwrap();
        assert!((robbery_chance(def, 0.0, 0.005, 0.15, 0.95) - 0.75).abs() < 1e-9);
        assert!((robbery_chance(def, 10.0, 0.005, 0.15, 0.95) - 0.80).abs() < 1e-9);
        assert!((robbery_chance(def, 1000.0, 0.005, 0.15, 0.95) - 0.90).abs() < 1e-9);
        assert!((robbery_chance(def, 1000.0, 0.005, 0.5, 0.95) - 0.95).abs() < 1e-9);
    }
}
