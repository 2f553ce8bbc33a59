//! Gang bosses.
//!
//! Every gang faces one boss at a time. Members chip away at its HP; the
//! killing blow splits the reward pool by damage share and the next boss in
//! the rotation spawns with HP scaled by the gang's member count.

use std::collections::BTreeMap;

use log::info;
use serde::Serialize;

use crate::game::catalog::{BossDef, GameAction};
use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::locks::EntityKey;
use crate::game::storage::WriteBatch;
use crate::game::types::{
    BossRecord, CreditKind, GangRecord, PendingCredit, BOSS_SCHEMA_VERSION, CREDIT_SCHEMA_VERSION,
};
use crate::game::views::PlayerView;

#[derive(Debug, Clone, Serialize)]
pub struct AttackerView {
    pub telegram_id: i64,
    pub username: String,
    pub total_dmg: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BossView {
    pub gang_id: u64,
    pub boss_id: String,
    pub name: String,
    pub emoji: String,
    pub current_health: u64,
    pub max_health: u64,
    pub reward_pool: f64,
    pub boss_index: usize,
    /// Top 20 by damage.
    pub attackers: Vec<AttackerView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BossKill {
    pub boss_id: String,
    pub boss_name: String,
    /// telegram_id -> cash share
    pub payouts: BTreeMap<i64, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BossAttackOutcome {
    pub damage: u64,
    pub boss_data: BossView,
    pub rewards: Option<BossKill>,
    pub player: PlayerView,
}

/// Pre-variance damage of one hit.
pub fn base_damage(level: u32, fear: f64, equipment: f64, armory: f64) -> f64 {
    50.0 + level as f64 * 5.0 + fear * 2.0 + equipment + armory
}

/// Split `pool` by each attacker's share of total damage.
pub fn split_rewards(pool: f64, attackers: &BTreeMap<i64, u64>) -> BTreeMap<i64, f64> {
    let total: u64 = attackers.values().sum();
    if total == 0 {
        return BTreeMap::new();
    }
    attackers
        .iter()
        .map(|(id, dmg)| (*id, (pool * *dmg as f64 / total as f64).round()))
        .collect()
}

impl Engine {
    fn spawn_boss(&self, gang: &GangRecord, index: usize) -> GameResult<BossRecord> {
        let bosses = &self.catalog.gangs.bosses;
        if bosses.is_empty() {
            return Err(GameError::Content("no bosses configured".into()));
        }
        let index = index % bosses.len();
        let def = &bosses[index];
        let max_hp = def.base_hp + def.hp_per_member * gang.members.len() as u64;
        Ok(BossRecord {
            gang_id: gang.id,
            boss_id: def.id.clone(),
            boss_index: index,
            current_hp: max_hp,
            max_hp,
            reward_pool: def.reward_pool,
            attackers: BTreeMap::new(),
            spawned_at: self.now(),
            schema_version: BOSS_SCHEMA_VERSION,
        })
    }

    fn boss_def(&self, boss: &BossRecord) -> Option<&BossDef> {
        self.catalog.gangs.bosses.iter().find(|b| b.id == boss.boss_id)
    }

    fn boss_view(&self, boss: &BossRecord) -> GameResult<BossView> {
        let def = self.boss_def(boss);
        let mut attackers = Vec::with_capacity(boss.attackers.len());
        for (id, dmg) in &boss.attackers {
            let username = self.store.find_player(*id)?.map(|p| p.username).unwrap_or_default();
            attackers.push(AttackerView {
                telegram_id: *id,
                username,
                total_dmg: *dmg,
            });
        }
        attackers.sort_by(|a, b| b.total_dmg.cmp(&a.total_dmg));
        attackers.truncate(20);
        Ok(BossView {
            gang_id: boss.gang_id,
            boss_id: boss.boss_id.clone(),
            name: def.map(|d| d.name.clone()).unwrap_or_default(),
            emoji: def.map(|d| d.emoji.clone()).unwrap_or_default(),
            current_health: boss.current_hp,
            max_health: boss.max_hp,
            reward_pool: boss.reward_pool,
            boss_index: boss.boss_index,
            attackers,
        })
    }

    /// The gang's current boss, spawning the first one on demand.
    pub fn boss(&self, gang_id: u64) -> GameResult<BossView> {
        if let Some(boss) = self.store.find_boss(gang_id)? {
            return self.boss_view(&boss);
        }
        let gang = self.store.get_gang(gang_id)?;
        let _locks = self.locks.acquire_all(vec![EntityKey::Boss(gang_id)])?;
        let boss = match self.store.find_boss(gang_id)? {
            Some(boss) => boss,
            None => {
                let boss = self.spawn_boss(&gang, 0)?;
                let mut batch = WriteBatch::new();
                batch.put_boss(&boss)?;
                self.store.commit(batch)?;
                boss
            }
        };
        self.boss_view(&boss)
    }

    pub fn attack_boss(&self, telegram_id: i64, gang_id: u64) -> GameResult<BossAttackOutcome> {
        let locks = self
            .locks
            .acquire_all(vec![EntityKey::Player(telegram_id), EntityKey::Boss(gang_id)])?;
        let mut txn = self.touch(&locks, telegram_id)?;
        if txn.player.gang_id != Some(gang_id) {
            return Err(GameError::InvalidRequest("Not in this gang".into()));
        }
        let now = self.now();
        let ready_at = txn.player.last_boss_attack_ts + self.tuning.boss_attack_cooldown_secs;
        if ready_at > now {
            return Err(GameError::OnCooldown {
                remaining_secs: (ready_at - now) as u64,
            });
        }
        let gang = self.store.get_gang(gang_id)?;
        let mut boss = match self.store.find_boss(gang_id)? {
            Some(boss) => boss,
            None => self.spawn_boss(&gang, 0)?,
        };

        let mods = self.modifiers(&txn.player)?;
        let base = base_damage(
            txn.player.level(),
            mods.fear,
            mods.equipment.income_pct,
            mods.gang_attack_bonus,
        );
        let damage = (base * self.roll(|rng| rng.uniform(0.8, 1.2))).round().max(1.0) as u64;
        boss.current_hp = boss.current_hp.saturating_sub(damage);
        *boss.attackers.entry(telegram_id).or_insert(0) += damage;
        txn.player.last_boss_attack_ts = now;
        self.track(&mut txn, GameAction::BossAttack, 1.0)?;

        let mut batch = WriteBatch::new();
        let mut rewards = None;
        if boss.current_hp == 0 {
            let name = self.boss_def(&boss).map(|d| d.name.clone()).unwrap_or_default();
            let payouts = split_rewards(boss.reward_pool, &boss.attackers);
            for (pid, cash) in &payouts {
                if *pid == telegram_id {
                    txn.player.earn(*cash);
                    txn.player.stats.bosses_killed += 1;
                    continue;
                }
                let credit_id = self.store.next_id()?;
                batch.put_credit(
                    *pid,
                    credit_id,
                    &PendingCredit {
                        cash: *cash,
                        kind: CreditKind::BossKill,
                        reason: format!("boss {} of gang {}", boss.boss_id, gang_id),
                        created_at: now,
                        schema_version: CREDIT_SCHEMA_VERSION,
                    },
                )?;
            }
            info!("gang: {} defeated boss {} ({} attackers)", gang_id, boss.boss_id, payouts.len());
            rewards = Some(BossKill {
                boss_id: boss.boss_id.clone(),
                boss_name: name,
                payouts,
            });
            boss = self.spawn_boss(&gang, boss.boss_index + 1)?;
        }
        batch.put_boss(&boss)?;
        let player = self.stage(&mut batch, txn)?;
        self.store.commit(batch)?;
        Ok(BossAttackOutcome {
            damage,
            boss_data: self.boss_view(&boss)?,
            rewards,
            player: self.view(&player),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewards_follow_damage_share() {
        let mut attackers = BTreeMap::new();
        attackers.insert(1, 300);
        attackers.insert(2, 100);
        let split = split_rewards(50_000.0, &attackers);
        assert_eq!(split[&1], 37_500.0);
        assert_eq!(split[&2], 12_500.0);
        assert!(split_rewards(1000.0, &BTreeMap::new()).is_empty());
    }

    #[test]
    fn damage_grows_with_level_and_fear() {
        assert_eq!(base_damage(0, 0.0, 0.0, 0.0), 50.0);
        assert_eq!(base_damage(10, 5.0, 3.0, 20.0), 50.0 + 50.0 + 10.0 + 3.0 + 20.0);
    }
}
