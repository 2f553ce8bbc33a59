//! Territory control between gangs.

use log::info;
use serde::Serialize;

use crate::game::catalog::GameAction;
use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::gang::require_role;
use crate::game::locks::EntityKey;
use crate::game::storage::WriteBatch;
use crate::game::types::GangRecord;
use crate::game::views::PlayerView;

#[derive(Debug, Clone, Serialize)]
pub struct TerritoryView {
    pub id: u32,
    pub name: String,
    pub emoji: String,
    pub bonus_percent: f64,
    pub owner_gang_id: Option<u64>,
    pub gang_name: Option<String>,
    pub gang_tag: Option<String>,
    pub captured_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TerritoryAttackOutcome {
    pub win: bool,
    pub territory_name: String,
    pub attacker_power: f64,
    pub defender_power: f64,
    pub territories: Vec<TerritoryView>,
    pub player: PlayerView,
}

impl Engine {
    /// Combined strength of a gang: member business levels, gang power and armory.
    pub(crate) fn gang_strength(&self, gang: &GangRecord) -> GameResult<f64> {
        let mut levels = 0u64;
        for m in &gang.members {
            if let Some(p) = self.store.find_player(m.telegram_id)? {
                levels += p.level() as u64;
            }
        }
        let armory: f64 = self
            .catalog
            .gangs
            .upgrades
            .iter()
            .filter(|d| d.effect == crate::game::catalog::GangUpgradeEffect::Attack)
            .map(|d| d.value_at(gang.upgrade_level(&d.id)))
            .sum();
        Ok(levels as f64 + gang.power as f64 + armory)
    }

    pub fn territories(&self) -> GameResult<Vec<TerritoryView>> {
        let mut out = Vec::with_capacity(self.catalog.gangs.territories.len());
        for def in &self.catalog.gangs.territories {
            let record = self.store.get_territory(def.id)?;
            let owner = match record.owner_gang_id {
                Some(id) => self.store.find_gang(id)?,
                None => None,
            };
            out.push(TerritoryView {
                id: def.id,
                name: def.name.clone(),
                emoji: def.emoji.clone(),
                bonus_percent: def.bonus_percent,
                owner_gang_id: owner.as_ref().map(|g| g.id),
                gang_name: owner.as_ref().map(|g| g.name.clone()),
                gang_tag: owner.as_ref().map(|g| g.tag.clone()),
                captured_at: record.captured_at,
            });
        }
        Ok(out)
    }

    /// Leader or officer sends the gang against a territory.
    ///
    /// The attacking gang goes on cooldown whatever the result. A capture
    /// during an active war scores for the attacker.
    pub fn attack_territory(&self, telegram_id: i64, territory_id: u32) -> GameResult<TerritoryAttackOutcome> {
        let def = self.catalog.territory(territory_id)?.clone();
        let gang_id = self.store.get_player(telegram_id)?.gang_id.ok_or(GameError::NotInGang)?;
        let mut locks = self.locks.acquire_all(vec![
            EntityKey::Player(telegram_id),
            EntityKey::Gang(gang_id),
            EntityKey::Territory(territory_id),
        ])?;
        let mut txn = self.touch(&locks, telegram_id)?;
        let mut gang = self.locked_gang(&locks, gang_id)?;
        require_role(&gang, telegram_id, false, "attack")?;

        let now = self.now();
        let ready_at = gang.last_territory_attack_ts + self.tuning.territory_attack_cooldown_secs;
        if ready_at > now {
            return Err(GameError::OnCooldown {
                remaining_secs: (ready_at - now) as u64,
            });
        }
        let mut territory = self.store.get_territory(territory_id)?;
        if territory.owner_gang_id == Some(gang_id) {
            return Err(GameError::InvalidRequest("Already own this territory".into()));
        }

        let attacker_power = self.gang_strength(&gang)?;
        let defender_power = match territory.owner_gang_id.map(|id| self.store.find_gang(id)).transpose()?.flatten() {
            Some(defender) => self.gang_strength(&defender)? + self.tuning.territory_defender_bonus,
            None => self.tuning.unclaimed_territory_defense,
        };
        let chance = self.tuning.win_chance(attacker_power, defender_power);
        let win = self.roll(|rng| rng.chance(chance));

        gang.last_territory_attack_ts = now;
        let mut batch = WriteBatch::new();
        if win {
            let previous = territory.owner_gang_id;
            territory.owner_gang_id = Some(gang_id);
            territory.captured_at = now;
            batch.put_territory(&territory)?;
            gang.push_log(now, format!("Captured {} {}", def.emoji, def.name));
            self.track(&mut txn, GameAction::TerritoryCapture, 1.0)?;
            if let Some(war_id) = gang.active_war {
                let points = self.catalog.gangs.war.score_per_territory;
                self.score_war(&mut locks, &mut batch, war_id, gang_id, None, points)?;
            }
            info!("gang: {} captured territory {} (from {:?})", gang_id, territory_id, previous);
        }
        batch.put_gang(&gang)?;
        let player = self.stage(&mut batch, txn)?;
        self.store.commit(batch)?;
        drop(locks);

        Ok(TerritoryAttackOutcome {
            win,
            territory_name: def.name,
            attacker_power,
            defender_power,
            territories: self.territories()?,
            player: self.view(&player),
        })
    }
}
