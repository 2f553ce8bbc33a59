//! Time-boxed gang wars.
//!
//! A war runs for a fixed duration. PvP wins against the enemy gang and
//! territory captures add score. When the war ends the winner's bank gets
//! the winner reward and the loser's bank the consolation; equal scores are
//! a draw and both gangs receive the consolation.

use log::{info, warn};
use serde::Serialize;

use crate::game::catalog::WarRules;
use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::gang::require_role;
use crate::game::locks::{EntityKey, LockSet};
use crate::game::storage::WriteBatch;
use crate::game::types::{WarRecord, WarStatus, WAR_SCHEMA_VERSION};

#[derive(Debug, Clone, Serialize)]
pub struct WarView {
    pub war: WarRecord,
    pub attacker_name: String,
    pub defender_name: String,
    pub remaining_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WarOverview {
    pub active: Option<WarView>,
    /// Finished wars involving the gang, newest first.
    pub history: Vec<WarView>,
    pub config: WarRules,
}

impl Engine {
    fn war_view(&self, war: WarRecord) -> GameResult<WarView> {
        let name_of = |id: u64| -> GameResult<String> {
            Ok(self.store.find_gang(id)?.map(|g| g.name).unwrap_or_default())
        };
        Ok(WarView {
            attacker_name: name_of(war.attacker_gang_id)?,
            defender_name: name_of(war.defender_gang_id)?,
            remaining_secs: if war.status == WarStatus::Active {
                (war.ends_at - self.now()).max(0)
            } else {
                0
            },
            war,
        })
    }

    /// Add score to `gang_id`'s side of an active war. With `against` set, only
    /// counts when that gang is the war opponent.
    pub(crate) fn score_war(
        &self,
        locks: &mut LockSet<'_>,
        batch: &mut WriteBatch,
        war_id: u64,
        gang_id: u64,
        against: Option<u64>,
        points: u64,
    ) -> GameResult<()> {
        if points == 0 {
            return Ok(());
        }
        locks.acquire(EntityKey::War(war_id))?;
        let Some(mut war) = self.store.find_war(war_id)? else {
            return Ok(());
        };
        if war.status != WarStatus::Active || war.ends_at <= self.now() || !war.involves(gang_id) {
            return Ok(());
        }
        if let Some(enemy) = against {
            if war.opponent_of(gang_id) != enemy {
                return Ok(());
            }
        }
        if war.attacker_gang_id == gang_id {
            war.attacker_score += points;
        } else {
            war.defender_score += points;
        }
        batch.put_war(&war)?;
        Ok(())
    }

    pub fn declare_war(&self, telegram_id: i64, target_gang_id: u64) -> GameResult<WarView> {
        let gang_id = self.store.get_player(telegram_id)?.gang_id.ok_or(GameError::NotInGang)?;
        if gang_id == target_gang_id {
            return Err(GameError::InvalidRequest("Can't declare war on yourself".into()));
        }
        // Settle anything that already ran out so the gangs are free again.
        for id in [gang_id, target_gang_id] {
            if let Some(war_id) = self.store.find_gang(id)?.and_then(|g| g.active_war) {
                self.finalize_war(war_id)?;
            }
        }

        let war_id = self.store.next_id()?;
        let locks = self.locks.acquire_all(vec![
            EntityKey::Gang(gang_id),
            EntityKey::Gang(target_gang_id),
            EntityKey::War(war_id),
        ])?;
        let mut gang = self.locked_gang(&locks, gang_id)?;
        require_role(&gang, telegram_id, true, "declare war")?;
        let mut target = self.locked_gang(&locks, target_gang_id)?;
        if gang.active_war.is_some() || target.active_war.is_some() {
            return Err(GameError::InvalidRequest("A gang is already at war".into()));
        }
        let rules = &self.catalog.gangs.war;
        if gang.cash_bank < rules.declare_cost {
            return Err(GameError::InsufficientBankFunds);
        }

        let now = self.now();
        gang.cash_bank -= rules.declare_cost;
        let war = WarRecord {
            id: war_id,
            attacker_gang_id: gang_id,
            defender_gang_id: target_gang_id,
            attacker_score: 0,
            defender_score: 0,
            status: WarStatus::Active,
            winner_gang_id: None,
            started_at: now,
            ends_at: now + rules.duration as i64,
            ended_at: None,
            schema_version: WAR_SCHEMA_VERSION,
        };
        gang.active_war = Some(war_id);
        target.active_war = Some(war_id);
        gang.push_log(now, format!("Declared war on [{}] {}", target.tag, target.name));
        target.push_log(now, format!("[{}] {} declared war on us", gang.tag, gang.name));

        let mut batch = WriteBatch::new();
        batch.put_gang(&gang)?;
        batch.put_gang(&target)?;
        batch.put_war(&war)?;
        self.store.commit(batch)?;
        drop(locks);
        info!("gang: war {} declared, {} vs {}", war_id, gang_id, target_gang_id);
        self.war_view(war)
    }

    /// Settle a war whose time ran out. Returns true when this call finished it.
    pub fn finalize_war(&self, war_id: u64) -> GameResult<bool> {
        let Some(war) = self.store.find_war(war_id)? else {
            return Ok(false);
        };
        if war.status != WarStatus::Active || war.ends_at > self.now() {
            return Ok(false);
        }
        let locks = self.locks.acquire_all(vec![
            EntityKey::Gang(war.attacker_gang_id),
            EntityKey::Gang(war.defender_gang_id),
            EntityKey::War(war_id),
        ])?;
        let Some(mut war) = self.store.find_war(war_id)? else {
            return Ok(false);
        };
        let now = self.now();
        if war.status != WarStatus::Active || war.ends_at > now {
            return Ok(false);
        }
        let rules = &self.catalog.gangs.war;
        let winner = match war.attacker_score.cmp(&war.defender_score) {
            std::cmp::Ordering::Greater => Some(war.attacker_gang_id),
            std::cmp::Ordering::Less => Some(war.defender_gang_id),
            std::cmp::Ordering::Equal => None,
        };

        let mut batch = WriteBatch::new();
        for gang_id in [war.attacker_gang_id, war.defender_gang_id] {
            let Some(mut gang) = self.store.find_gang(gang_id)? else {
                warn!("war {}: gang {} no longer exists", war_id, gang_id);
                continue;
            };
            debug_assert!(locks.holds(&EntityKey::Gang(gang_id)));
            let reward = if winner == Some(gang_id) {
                rules.winner_reward
            } else {
                rules.loser_reward
            };
            gang.cash_bank += reward;
            if gang.active_war == Some(war_id) {
                gang.active_war = None;
            }
            let result = match winner {
                Some(id) if id == gang_id => "won",
                Some(_) => "lost",
                None => "drew",
            };
            gang.push_log(now, format!("War {} {}: +${:.0} to the bank", war_id, result, reward));
            batch.put_gang(&gang)?;
        }
        war.status = WarStatus::Finished;
        war.winner_gang_id = winner;
        war.ended_at = Some(now);
        batch.put_war(&war)?;
        self.store.commit(batch)?;
        info!(
            "gang: war {} finished {}:{} winner {:?}",
            war_id, war.attacker_score, war.defender_score, winner
        );
        Ok(true)
    }

    /// Finish every war past its end time. Returns how many were settled.
    pub fn finalize_due_wars(&self) -> GameResult<usize> {
        let now = self.now();
        let mut settled = 0;
        for war in self.store.list_wars()? {
            if war.status == WarStatus::Active && war.ends_at <= now && self.finalize_war(war.id)? {
                settled += 1;
            }
        }
        Ok(settled)
    }

    pub fn war_status(&self, gang_id: u64) -> GameResult<WarOverview> {
        let mut wars: Vec<WarRecord> = self
            .store
            .list_wars()?
            .into_iter()
            .filter(|w| w.involves(gang_id))
            .collect();
        if wars
            .iter()
            .any(|w| w.status == WarStatus::Active && w.ends_at <= self.now())
        {
            self.finalize_due_wars()?;
            wars = self
                .store
                .list_wars()?
                .into_iter()
                .filter(|w| w.involves(gang_id))
                .collect();
        }
        wars.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));

        let mut active = None;
        let mut history = Vec::new();
        for war in wars {
            if war.status == WarStatus::Active && active.is_none() {
                active = Some(self.war_view(war)?);
            } else if war.status == WarStatus::Finished && history.len() < 10 {
                history.push(self.war_view(war)?);
            }
        }
        Ok(WarOverview {
            active,
            history,
            config: self.catalog.gangs.war.clone(),
        })
    }
}
