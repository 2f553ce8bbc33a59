//! Gang membership, roles, bank and upgrades.
//!
//! Lock order for gang operations is players (ascending id), then
//! `GangNames` when creating, then the gang itself, then anything the gang
//! owns (territories, heists, wars, boss).

use std::collections::BTreeMap;

use log::info;
use serde::Serialize;

use crate::game::catalog::GangUpgradeDef;
use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::locks::{EntityKey, LockSet};
use crate::game::storage::{keys, WriteBatch};
use crate::game::types::{GangLogEntry, GangMember, GangRecord, GangRole, HeistStatus, PlayerRecord};
use crate::game::views::PlayerView;
use crate::logutil::{clean_display_name, escape_log};

/// Power gained per gang upgrade level.
const POWER_PER_UPGRADE: u64 = 2;

#[derive(Debug, Clone, Serialize)]
pub struct GangSummary {
    pub id: u64,
    pub name: String,
    pub tag: String,
    pub leader_id: i64,
    pub cash_bank: f64,
    pub power: u64,
    pub members: usize,
    pub created_at: i64,
}

impl From<&GangRecord> for GangSummary {
    fn from(g: &GangRecord) -> Self {
        Self {
            id: g.id,
            name: g.name.clone(),
            tag: g.tag.clone(),
            leader_id: g.leader_id,
            cash_bank: g.cash_bank,
            power: g.power,
            members: g.members.len(),
            created_at: g.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberView {
    pub telegram_id: i64,
    pub username: String,
    pub role: GangRole,
    pub joined_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GangDetail {
    pub gang: GangSummary,
    pub members: Vec<MemberView>,
    pub gang_upgrades: BTreeMap<String, u32>,
    /// Newest first, at most 20.
    pub gang_log: Vec<GangLogEntry>,
    pub gang_upgrades_config: Vec<GangUpgradeDef>,
    pub territories: Vec<u32>,
    pub active_war: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GangOutcome {
    pub player: PlayerView,
    pub gang: Option<GangSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GangUpgradeOutcome {
    pub gang: GangSummary,
    pub gang_upgrades: BTreeMap<String, u32>,
    pub level: u32,
    pub cost: f64,
}

/// Require at least `min` role. Officers pass leader-or-officer checks.
pub(crate) fn require_role(gang: &GangRecord, telegram_id: i64, leader_only: bool, action: &str) -> GameResult<()> {
    let role = gang.role_of(telegram_id).ok_or(GameError::NotInGang)?;
    let allowed = if leader_only {
        role == GangRole::Leader
    } else {
        role.can_command()
    };
    if allowed {
        Ok(())
    } else if leader_only {
        Err(GameError::NotLeader(format!("Only the leader can {}", action)))
    } else {
        Err(GameError::NotLeader(format!("Only the leader or an officer can {}", action)))
    }
}

impl Engine {
    pub(crate) fn gang_of(&self, player: &PlayerRecord) -> GameResult<u64> {
        player.gang_id.ok_or(GameError::NotInGang)
    }

    /// Load a gang that must be locked by `locks`.
    pub(crate) fn locked_gang(&self, locks: &LockSet<'_>, gang_id: u64) -> GameResult<GangRecord> {
        if !locks.holds(&EntityKey::Gang(gang_id)) {
            return Err(GameError::InvariantViolation(format!("gang {} read without lock", gang_id)));
        }
        self.store.get_gang(gang_id)
    }

    pub fn create_gang(&self, telegram_id: i64, name: &str, tag: &str) -> GameResult<GangOutcome> {
        let name = clean_display_name(name);
        let tag = clean_display_name(tag);
        let name_len = name.chars().count();
        let tag_len = tag.chars().count();
        if name_len < self.tuning.gang_name_min || name_len > self.tuning.gang_name_max || tag_len < 1 || tag_len > 4 {
            return Err(GameError::InvalidRequest("Invalid name/tag".into()));
        }
        let mut locks = self.locks.acquire_all(vec![EntityKey::Player(telegram_id)])?;
        let mut txn = self.touch(&locks, telegram_id)?;
        if txn.player.gang_id.is_some() {
            return Err(GameError::AlreadyInGang);
        }
        locks.acquire(EntityKey::GangNames)?;
        if self.store.gang_name_taken(&name)? || self.store.gang_tag_taken(&tag)? {
            return Err(GameError::InvalidRequest("Gang name or tag is taken".into()));
        }
        self.try_spend(&mut txn.player, self.tuning.gang_create_cost)?;

        let gang_id = self.store.next_id()?;
        let now = self.now();
        let mut gang = GangRecord::new(gang_id, &name, &tag, telegram_id, now);
        gang.push_log(now, format!("{} founded the gang", txn.player.username));
        txn.player.gang_id = Some(gang_id);

        let mut batch = WriteBatch::new();
        batch.put_gang(&gang)?;
        batch.put(keys::gang_name(&name), &gang_id)?;
        batch.put(keys::gang_tag(&tag), &gang_id)?;
        let player = self.stage(&mut batch, txn)?;
        self.store.commit(batch)?;
        info!("gang: {} created [{}] {} (id {})", telegram_id, escape_log(&tag), escape_log(&name), gang_id);
        Ok(GangOutcome {
            player: self.view(&player),
            gang: Some(GangSummary::from(&gang)),
        })
    }

    pub fn join_gang(&self, telegram_id: i64, gang_id: u64) -> GameResult<GangOutcome> {
        let locks = self
            .locks
            .acquire_all(vec![EntityKey::Player(telegram_id), EntityKey::Gang(gang_id)])?;
        let mut txn = self.touch(&locks, telegram_id)?;
        if txn.player.gang_id.is_some() {
            return Err(GameError::AlreadyInGang);
        }
        let mut gang = self.locked_gang(&locks, gang_id)?;
        if gang.members.len() >= self.tuning.gang_max_members {
            return Err(GameError::GangFull);
        }
        let now = self.now();
        gang.members.push(GangMember {
            telegram_id,
            role: GangRole::Member,
            joined_at: now,
        });
        gang.power += 1;
        gang.push_log(now, format!("{} joined", txn.player.username));
        txn.player.gang_id = Some(gang_id);

        let mut batch = WriteBatch::new();
        batch.put_gang(&gang)?;
        let player = self.stage(&mut batch, txn)?;
        self.store.commit(batch)?;
        Ok(GangOutcome {
            player: self.view(&player),
            gang: Some(GangSummary::from(&gang)),
        })
    }

    /// Leave the gang. A departing leader hands over to the earliest-joined
    /// member; the last member out disbands the gang.
    pub fn leave_gang(&self, telegram_id: i64) -> GameResult<GangOutcome> {
        let gang_id = self.store.get_player(telegram_id)?.gang_id.ok_or(GameError::NotInGang)?;
        let mut locks = self
            .locks
            .acquire_all(vec![EntityKey::Player(telegram_id), EntityKey::Gang(gang_id)])?;
        let mut txn = self.touch(&locks, telegram_id)?;
        if txn.player.gang_id != Some(gang_id) {
            return Err(GameError::InvalidRequest("Gang changed, retry".into()));
        }
        let mut gang = self.locked_gang(&locks, gang_id)?;
        let was_leader = gang.leader_id == telegram_id;
        gang.members.retain(|m| m.telegram_id != telegram_id);
        gang.power = gang.power.saturating_sub(1);
        let now = self.now();
        gang.push_log(now, format!("{} left", txn.player.username));
        txn.player.gang_id = None;

        let mut batch = WriteBatch::new();
        let summary = if gang.members.is_empty() {
            self.disband(&mut locks, &mut batch, &gang)?;
            None
        } else {
            if was_leader {
                if let Some(heir) = gang.members.iter_mut().min_by_key(|m| (m.joined_at, m.telegram_id)) {
                    heir.role = GangRole::Leader;
                    let heir_id = heir.telegram_id;
                    gang.leader_id = heir_id;
                    gang.push_log(now, "New leader appointed");
                }
            }
            batch.put_gang(&gang)?;
            Some(GangSummary::from(&gang))
        };
        let player = self.stage(&mut batch, txn)?;
        self.store.commit(batch)?;
        Ok(GangOutcome {
            player: self.view(&player),
            gang: summary,
        })
    }

    /// Delete a gang with everything it owns. Caller holds the gang lock.
    fn disband(&self, locks: &mut LockSet<'_>, batch: &mut WriteBatch, gang: &GangRecord) -> GameResult<()> {
        let mut owned: Vec<u32> = self
            .store
            .list_territories()?
            .into_iter()
            .filter(|t| t.owner_gang_id == Some(gang.id))
            .map(|t| t.id)
            .collect();
        owned.sort_unstable();
        for id in owned {
            locks.acquire(EntityKey::Territory(id))?;
            let mut territory = self.store.get_territory(id)?;
            if territory.owner_gang_id == Some(gang.id) {
                territory.owner_gang_id = None;
                batch.put_territory(&territory)?;
            }
        }
        let mut heists: Vec<_> = self
            .store
            .list_heists()?
            .into_iter()
            .filter(|h| h.gang_id == gang.id && h.status == HeistStatus::Recruiting)
            .collect();
        heists.sort_by_key(|h| h.id);
        for mut heist in heists {
            locks.acquire(EntityKey::Heist(heist.id))?;
            heist.status = HeistStatus::Expired;
            batch.put_heist(&heist)?;
        }
        locks.acquire(EntityKey::Boss(gang.id))?;
        batch.remove(keys::boss(gang.id));
        batch.remove(keys::gang_name(&gang.name));
        batch.remove(keys::gang_tag(&gang.tag));
        batch.remove(keys::gang(gang.id));
        info!("gang: {} disbanded", gang.id);
        Ok(())
    }

    pub fn kick_member(&self, telegram_id: i64, target_id: i64) -> GameResult<GangOutcome> {
        if target_id == telegram_id {
            return Err(GameError::InvalidRequest("Cannot kick yourself".into()));
        }
        let gang_id = self.store.get_player(telegram_id)?.gang_id.ok_or(GameError::NotInGang)?;
        let locks = self.locks.acquire_all(vec![
            EntityKey::Player(telegram_id),
            EntityKey::Player(target_id),
            EntityKey::Gang(gang_id),
        ])?;
        let leader = self.touch(&locks, telegram_id)?;
        let mut gang = self.locked_gang(&locks, gang_id)?;
        require_role(&gang, telegram_id, true, "kick")?;
        if gang.member(target_id).is_none() {
            return Err(GameError::NotFound(format!("member {}", target_id)));
        }
        let mut target = self.touch(&locks, target_id)?;
        gang.members.retain(|m| m.telegram_id != target_id);
        gang.power = gang.power.saturating_sub(1);
        gang.push_log(self.now(), format!("{} was kicked", target.player.username));
        target.player.gang_id = None;

        let mut batch = WriteBatch::new();
        batch.put_gang(&gang)?;
        self.stage(&mut batch, target)?;
        let leader = self.stage(&mut batch, leader)?;
        self.store.commit(batch)?;
        Ok(GangOutcome {
            player: self.view(&leader),
            gang: Some(GangSummary::from(&gang)),
        })
    }

    /// Set a member's role to officer or member. Leadership is not transferable here.
    pub fn set_member_role(&self, telegram_id: i64, target_id: i64, role: GangRole) -> GameResult<GangSummary> {
        if role == GangRole::Leader {
            return Err(GameError::InvalidRequest("Leadership cannot be assigned".into()));
        }
        let gang_id = self.store.get_player(telegram_id)?.gang_id.ok_or(GameError::NotInGang)?;
        let locks = self.locks.acquire_all(vec![EntityKey::Gang(gang_id)])?;
        let mut gang = self.locked_gang(&locks, gang_id)?;
        require_role(&gang, telegram_id, true, "promote")?;
        if target_id == gang.leader_id {
            return Err(GameError::InvalidRequest("The leader's role cannot change".into()));
        }
        let member = gang
            .members
            .iter_mut()
            .find(|m| m.telegram_id == target_id)
            .ok_or_else(|| GameError::NotFound(format!("member {}", target_id)))?;
        member.role = role;
        gang.push_log(self.now(), format!("{} is now {:?}", target_id, role).to_lowercase());
        let mut batch = WriteBatch::new();
        batch.put_gang(&gang)?;
        self.store.commit(batch)?;
        Ok(GangSummary::from(&gang))
    }

    pub fn gang_deposit(&self, telegram_id: i64, amount: f64) -> GameResult<GangOutcome> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(GameError::InvalidRequest("Invalid amount".into()));
        }
        let gang_id = self.store.get_player(telegram_id)?.gang_id.ok_or(GameError::NotInGang)?;
        let locks = self
            .locks
            .acquire_all(vec![EntityKey::Player(telegram_id), EntityKey::Gang(gang_id)])?;
        let mut txn = self.touch(&locks, telegram_id)?;
        let mut gang = self.locked_gang(&locks, gang_id)?;
        if gang.member(telegram_id).is_none() {
            return Err(GameError::NotInGang);
        }
        self.try_spend(&mut txn.player, amount)?;
        gang.cash_bank += amount;
        gang.push_log(self.now(), format!("{} deposited ${:.0}", txn.player.username, amount));

        let mut batch = WriteBatch::new();
        batch.put_gang(&gang)?;
        let player = self.stage(&mut batch, txn)?;
        self.store.commit(batch)?;
        Ok(GangOutcome {
            player: self.view(&player),
            gang: Some(GangSummary::from(&gang)),
        })
    }

    pub fn gang_withdraw(&self, telegram_id: i64, amount: f64) -> GameResult<GangOutcome> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(GameError::InvalidRequest("Invalid amount".into()));
        }
        let gang_id = self.store.get_player(telegram_id)?.gang_id.ok_or(GameError::NotInGang)?;
        let locks = self
            .locks
            .acquire_all(vec![EntityKey::Player(telegram_id), EntityKey::Gang(gang_id)])?;
        let mut txn = self.touch(&locks, telegram_id)?;
        let mut gang = self.locked_gang(&locks, gang_id)?;
        require_role(&gang, telegram_id, true, "withdraw")?;
        if gang.cash_bank < amount {
            return Err(GameError::InsufficientBankFunds);
        }
        gang.cash_bank -= amount;
        txn.player.cash += amount;
        gang.push_log(self.now(), format!("Leader withdrew ${:.0}", amount));

        let mut batch = WriteBatch::new();
        batch.put_gang(&gang)?;
        let player = self.stage(&mut batch, txn)?;
        self.store.commit(batch)?;
        Ok(GangOutcome {
            player: self.view(&player),
            gang: Some(GangSummary::from(&gang)),
        })
    }

    /// Buy the next level of a gang upgrade from the gang bank.
    pub fn gang_upgrade(&self, telegram_id: i64, upgrade_id: &str) -> GameResult<GangUpgradeOutcome> {
        let def = self.catalog.gang_upgrade(upgrade_id)?.clone();
        let gang_id = self.store.get_player(telegram_id)?.gang_id.ok_or(GameError::NotInGang)?;
        let locks = self.locks.acquire_all(vec![EntityKey::Gang(gang_id)])?;
        let mut gang = self.locked_gang(&locks, gang_id)?;
        require_role(&gang, telegram_id, true, "upgrade")?;
        let current = gang.upgrade_level(&def.id);
        if current >= def.max_level() {
            return Err(GameError::MaxLevelReached);
        }
        let cost = def.costs[current as usize];
        if gang.cash_bank < cost {
            return Err(GameError::InsufficientBankFunds);
        }
        gang.cash_bank -= cost;
        gang.upgrades.insert(def.id.clone(), current + 1);
        gang.power += POWER_PER_UPGRADE;
        gang.push_log(
            self.now(),
            format!("{} {} upgraded to level {}", def.emoji, def.name, current + 1),
        );
        let mut batch = WriteBatch::new();
        batch.put_gang(&gang)?;
        self.store.commit(batch)?;
        info!("gang: {} upgraded {} to {}", gang_id, def.id, current + 1);
        Ok(GangUpgradeOutcome {
            gang: GangSummary::from(&gang),
            gang_upgrades: gang.upgrades.clone(),
            level: current + 1,
            cost,
        })
    }

    /// Top 50 gangs by power.
    pub fn list_gangs(&self) -> GameResult<Vec<GangSummary>> {
        let mut gangs = self.store.list_gangs()?;
        gangs.sort_by(|a, b| b.power.cmp(&a.power).then(a.id.cmp(&b.id)));
        Ok(gangs.iter().take(50).map(GangSummary::from).collect())
    }

    pub fn gang_detail(&self, gang_id: u64) -> GameResult<GangDetail> {
        let gang = self.store.get_gang(gang_id)?;
        let mut members = Vec::with_capacity(gang.members.len());
        for m in &gang.members {
            let username = self
                .store
                .find_player(m.telegram_id)?
                .map(|p| p.username)
                .unwrap_or_default();
            members.push(MemberView {
                telegram_id: m.telegram_id,
                username,
                role: m.role,
                joined_at: m.joined_at,
            });
        }
        let territories = self
            .store
            .list_territories()?
            .into_iter()
            .filter(|t| t.owner_gang_id == Some(gang_id))
            .map(|t| t.id)
            .collect();
        Ok(GangDetail {
            gang: GangSummary::from(&gang),
            members,
            gang_upgrades: gang.upgrades.clone(),
            gang_log: gang.log.iter().rev().take(20).cloned().collect(),
            gang_upgrades_config: self.catalog.gangs.upgrades.clone(),
            territories,
            active_war: gang.active_war,
        })
    }
}
