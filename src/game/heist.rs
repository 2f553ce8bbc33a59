//! Cooperative gang heists.
//!
//! A leader or officer opens a heist, members join during the join window,
//! and once the roster reaches quorum a leader or officer executes it. The
//! executor is paid directly; every other participant gets their share
//! through the credit inbox.

use log::info;
use serde::Serialize;

use crate::game::catalog::{GameAction, HeistDef};
use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::gang::require_role;
use crate::game::locks::EntityKey;
use crate::game::storage::WriteBatch;
use crate::game::types::{
    CreditKind, HeistRecord, HeistStatus, PendingCredit, CREDIT_SCHEMA_VERSION, HEIST_SCHEMA_VERSION,
};
use crate::game::views::{round2, PlayerView};

#[derive(Debug, Clone, Serialize)]
pub struct HeistOutcome {
    pub heist: HeistRecord,
    pub config: HeistDef,
    pub participant_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeistExecution {
    pub success: bool,
    pub total_reward: f64,
    pub share: f64,
    pub participants: usize,
    pub player: PlayerView,
}

impl Engine {
    /// The gang's open heist. One whose window closed short of quorum does not count.
    fn recruiting_heist(&self, gang_id: u64) -> GameResult<Option<HeistRecord>> {
        let now = self.now();
        Ok(self.store.list_heists()?.into_iter().find(|h| {
            let quorum = self.catalog.heist(&h.heist_type).map(|d| d.min_members).unwrap_or(0);
            h.gang_id == gang_id
                && h.status == HeistStatus::Recruiting
                && (h.expires_at > now || h.participants.len() >= quorum)
        }))
    }

    pub fn start_heist(&self, telegram_id: i64, heist_type: &str) -> GameResult<HeistOutcome> {
        let def = self.catalog.heist(heist_type)?.clone();
        let gang_id = self.store.get_player(telegram_id)?.gang_id.ok_or(GameError::NotInGang)?;
        let heist_id = self.store.next_id()?;
        let locks = self.locks.acquire_all(vec![
            EntityKey::Player(telegram_id),
            EntityKey::Gang(gang_id),
            EntityKey::Heist(heist_id),
        ])?;
        let mut txn = self.touch(&locks, telegram_id)?;
        let gang = self.locked_gang(&locks, gang_id)?;
        require_role(&gang, telegram_id, false, "start heists")?;

        let now = self.now();
        if let Some(last) = gang.heist_cooldowns.get(&def.id) {
            let ready_at = last + def.cooldown as i64;
            if ready_at > now {
                return Err(GameError::OnCooldown {
                    remaining_secs: (ready_at - now) as u64,
                });
            }
        }
        if self.recruiting_heist(gang_id)?.is_some() {
            return Err(GameError::InvalidRequest("Already have an active heist".into()));
        }

        let heist = HeistRecord {
            id: heist_id,
            gang_id,
            heist_type: def.id.clone(),
            started_by: telegram_id,
            participants: vec![telegram_id],
            status: HeistStatus::Recruiting,
            reward: 0.0,
            created_at: now,
            expires_at: now + def.join_window as i64,
            schema_version: HEIST_SCHEMA_VERSION,
        };
        self.track(&mut txn, GameAction::HeistJoin, 1.0)?;
        let mut batch = WriteBatch::new();
        batch.put_heist(&heist)?;
        self.stage(&mut batch, txn)?;
        self.store.commit(batch)?;
        Ok(HeistOutcome {
            participant_count: heist.participants.len(),
            heist,
            config: def,
        })
    }

    pub fn join_heist(&self, telegram_id: i64, heist_id: u64) -> GameResult<HeistOutcome> {
        let gang_id = self.store.get_player(telegram_id)?.gang_id.ok_or(GameError::NotInGang)?;
        let locks = self
            .locks
            .acquire_all(vec![EntityKey::Player(telegram_id), EntityKey::Heist(heist_id)])?;
        let mut txn = self.touch(&locks, telegram_id)?;
        let mut heist = self
            .store
            .find_heist(heist_id)?
            .filter(|h| h.gang_id == gang_id && h.status == HeistStatus::Recruiting)
            .ok_or_else(|| GameError::NotFound("Heist not found or not recruiting".into()))?;
        if txn.player.gang_id != Some(heist.gang_id) {
            return Err(GameError::NotInGang);
        }
        if heist.expires_at <= self.now() {
            return Err(GameError::InvalidRequest("The join window has closed".into()));
        }
        if heist.participants.contains(&telegram_id) {
            return Err(GameError::InvalidRequest("Already joined".into()));
        }
        heist.participants.push(telegram_id);
        self.track(&mut txn, GameAction::HeistJoin, 1.0)?;

        let mut batch = WriteBatch::new();
        batch.put_heist(&heist)?;
        self.stage(&mut batch, txn)?;
        self.store.commit(batch)?;
        let config = self.catalog.heist(&heist.heist_type)?.clone();
        Ok(HeistOutcome {
            participant_count: heist.participants.len(),
            heist,
            config,
        })
    }

    /// Run a heist that reached quorum and split the take evenly.
    pub fn execute_heist(&self, telegram_id: i64, heist_id: u64) -> GameResult<HeistExecution> {
        let gang_id = self.store.get_player(telegram_id)?.gang_id.ok_or(GameError::NotInGang)?;
        let locks = self.locks.acquire_all(vec![
            EntityKey::Player(telegram_id),
            EntityKey::Gang(gang_id),
            EntityKey::Heist(heist_id),
        ])?;
        let mut txn = self.touch(&locks, telegram_id)?;
        let mut gang = self.locked_gang(&locks, gang_id)?;
        require_role(&gang, telegram_id, false, "execute heists")?;
        let mut heist = self
            .store
            .find_heist(heist_id)?
            .filter(|h| h.gang_id == gang_id && h.status == HeistStatus::Recruiting)
            .ok_or_else(|| GameError::NotFound("Heist".into()))?;
        let def = self.catalog.heist(&heist.heist_type)?.clone();
        let count = heist.participants.len();
        if count < def.min_members {
            return Err(GameError::NotEnoughParticipants {
                required: def.min_members,
            });
        }

        let base = self.roll(|rng| rng.uniform(def.min_reward, def.max_reward));
        let total = round2(base + count as f64 * def.reward_per_member);
        let share = round2(total / count as f64);
        let now = self.now();

        let mut batch = WriteBatch::new();
        for pid in &heist.participants {
            if *pid == telegram_id {
                txn.player.earn(share);
                txn.player.stats.heists_completed += 1;
                continue;
            }
            let credit_id = self.store.next_id()?;
            batch.put_credit(
                *pid,
                credit_id,
                &PendingCredit {
                    cash: share,
                    kind: CreditKind::Heist,
                    reason: format!("heist {} ({})", heist.id, def.id),
                    created_at: now,
                    schema_version: CREDIT_SCHEMA_VERSION,
                },
            )?;
        }
        heist.status = HeistStatus::Completed;
        heist.reward = total;
        gang.heist_cooldowns.insert(def.id.clone(), now);
        gang.push_log(now, format!("{} {} brought in ${:.0}", def.emoji, def.name, total));
        batch.put_heist(&heist)?;
        batch.put_gang(&gang)?;
        let player = self.stage(&mut batch, txn)?;
        self.store.commit(batch)?;
        info!("gang: {} executed heist {} for {:.2} ({} crew)", gang_id, heist.id, total, count);
        Ok(HeistExecution {
            success: true,
            total_reward: total,
            share,
            participants: count,
            player: self.view(&player),
        })
    }

    /// Recruiting heists of a gang, newest first.
    pub fn heists(&self, gang_id: u64) -> GameResult<Vec<HeistRecord>> {
        let mut heists: Vec<HeistRecord> = self
            .store
            .list_heists()?
            .into_iter()
            .filter(|h| h.gang_id == gang_id && h.status == HeistStatus::Recruiting)
            .collect();
        heists.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(heists)
    }

    /// Expire heists whose join window closed without reaching quorum.
    pub fn expire_heists(&self) -> GameResult<usize> {
        let now = self.now();
        let mut expired = 0;
        for stale in self.store.list_heists()? {
            if stale.status != HeistStatus::Recruiting || stale.expires_at > now {
                continue;
            }
            let quorum = self
                .catalog
                .heist(&stale.heist_type)
                .map(|d| d.min_members)
                .unwrap_or(usize::MAX);
            if stale.participants.len() >= quorum {
                continue;
            }
            let _locks = self.locks.acquire_all(vec![EntityKey::Heist(stale.id)])?;
            let Some(mut heist) = self.store.find_heist(stale.id)? else {
                continue;
            };
            if heist.status != HeistStatus::Recruiting || heist.participants.len() >= quorum {
                continue;
            }
            heist.status = HeistStatus::Expired;
            let mut batch = WriteBatch::new();
            batch.put_heist(&heist)?;
            self.store.commit(batch)?;
            expired += 1;
        }
        Ok(expired)
    }
}
