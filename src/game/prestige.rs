//! Prestige resets and the talent tree.

use std::collections::BTreeMap;

use log::info;
use serde::Serialize;

use crate::game::catalog::{Catalog, TalentBranch, TalentEffect};
use crate::game::engine::{Engine, Rates};
use crate::game::errors::{GameError, GameResult};
use crate::game::locks::EntityKey;
use crate::game::storage::{keys, WriteBatch};
use crate::game::types::{OwnedBusiness, PlayerRecord, PlayerStats};
use crate::game::views::PlayerView;

/// Aggregated talent values keyed by effect: `level × per_level` summed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TalentBonuses(BTreeMap<TalentEffect, f64>);

impl TalentBonuses {
    pub fn for_player(catalog: &Catalog, player: &PlayerRecord) -> Self {
        let mut map = BTreeMap::new();
        for talent in catalog.talents() {
            let level = player.talent_level(&talent.id).min(talent.max_level);
            if level > 0 {
                *map.entry(talent.effect).or_insert(0.0) += level as f64 * talent.per_level;
            }
        }
        Self(map)
    }

    pub fn get(&self, effect: TalentEffect) -> f64 {
        self.0.get(&effect).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PrestigeOutcome {
    pub player: PlayerView,
    pub businesses: Vec<OwnedBusiness>,
    pub income_per_sec: f64,
    pub suspicion_per_sec: f64,
    pub player_level: u32,
    pub prestige_level: u32,
    pub prestige_multiplier: f64,
    pub talent_points: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TalentTree {
    pub branches: Vec<TalentBranch>,
    pub levels: BTreeMap<String, u32>,
    pub talent_points: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TalentOutcome {
    pub player: PlayerView,
    pub talent_id: String,
    pub level: u32,
    pub talent_points: u32,
}

impl Engine {
    /// Reset progress for a permanent income multiplier and a talent point.
    ///
    /// Listings go back to the inventory, unopened cases are deleted and the
    /// gang bank is zeroed when the player leads a gang, all in one commit.
    pub fn prestige(&self, telegram_id: i64) -> GameResult<PrestigeOutcome> {
        let mut locks = self.locks.acquire_all(vec![EntityKey::Player(telegram_id)])?;
        let mut txn = self.touch(&locks, telegram_id)?;
        let rules = &self.catalog.progression.prestige;
        let required = rules.required_level(txn.player.prestige_level);
        if txn.player.level() < required {
            return Err(GameError::LevelRequired { required });
        }

        let mut batch = WriteBatch::new();

        // Gang bank is forfeited by a leader.
        if let Some(gang_id) = txn.player.gang_id {
            locks.acquire(EntityKey::Gang(gang_id))?;
            if let Some(mut gang) = self.store.find_gang(gang_id)? {
                if gang.leader_id == telegram_id && gang.cash_bank > 0.0 {
                    gang.cash_bank = 0.0;
                    gang.push_log(self.now(), format!("{} prestiged; bank reset", txn.player.username));
                    batch.put_gang(&gang)?;
                }
            }
        }

        let own_listings: Vec<u64> = self
            .store
            .list_listings()?
            .into_iter()
            .filter(|l| l.seller_id == telegram_id)
            .map(|l| l.id)
            .collect();
        let mut returned = 0;
        for listing_id in own_listings {
            locks.acquire(EntityKey::Listing(listing_id))?;
            // Re-read under lock: a buyer may have taken it.
            let Some(listing) = self.store.find_listing(listing_id)? else {
                continue;
            };
            if !txn.player.owns_item(&listing.item_id) {
                txn.player.inventory.push(crate::game::types::InventoryEntry {
                    item_id: listing.item_id.clone(),
                    equipped: false,
                    acquired_at: self.now(),
                });
            }
            batch.remove(keys::listing(listing.id));
            returned += 1;
        }

        let talents = TalentBonuses::for_player(&self.catalog, &txn.player);
        let p = &mut txn.player;
        p.prestige_level += 1;
        p.prestige_multiplier = rules.multiplier_for(p.prestige_level);
        p.talent_points += 1;
        p.businesses.clear();
        p.upgrades.clear();
        p.raid_shields = 0;
        p.cases.clear();
        p.cash = self.tuning.prestige_starting_cash + talents.get(TalentEffect::QuickStart);
        p.fear = talents.get(TalentEffect::Intimidation) as u64;
        p.respect = 0;
        p.suspicion = 0.0;
        p.total_earned = 0.0;
        p.robbery_cooldown_ts = 0;
        p.pvp_cooldown_ts = 0;
        p.last_collect_ts = self.now();
        p.stats = PlayerStats {
            total_robberies: 0,
            successful_robberies: 0,
            ..p.stats.clone()
        };
        info!(
            "prestige: player {} reached prestige {} (x{:.2}), {} listings returned",
            p.telegram_id, p.prestige_level, p.prestige_multiplier, returned
        );

        let player = self.stage(&mut batch, txn)?;
        self.store.commit(batch)?;
        let Rates {
            income_per_sec,
            suspicion_per_sec,
        } = self.current_rates(&player)?;
        Ok(PrestigeOutcome {
            player: self.view(&player),
            player_level: player.level(),
            prestige_level: player.prestige_level,
            prestige_multiplier: player.prestige_multiplier,
            talent_points: player.talent_points,
            income_per_sec,
            suspicion_per_sec,
            businesses: player.businesses,
        })
    }

    pub fn assign_talent(&self, telegram_id: i64, talent_id: &str) -> GameResult<TalentOutcome> {
        let talent = self.catalog.talent(talent_id)?.clone();
        let (level, player) = self.with_player(telegram_id, |txn, _| {
            if txn.player.talent_points == 0 {
                return Err(GameError::NoPoints);
            }
            let current = txn.player.talent_level(&talent.id);
            if current >= talent.max_level {
                return Err(GameError::MaxLevelReached);
            }
            txn.player.talent_points -= 1;
            txn.player.talents.insert(talent.id.clone(), current + 1);
            Ok(current + 1)
        })?;
        Ok(TalentOutcome {
            player: self.view(&player),
            talent_id: talent.id,
            level,
            talent_points: player.talent_points,
        })
    }

    pub fn talent_tree(&self, player: &PlayerRecord) -> TalentTree {
        TalentTree {
            branches: self.catalog.progression.talents.clone(),
            levels: player.talents.clone(),
            talent_points: player.talent_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::seed::load_builtin;

    #[test]
    fn talent_bonuses_scale_with_level() {
        let catalog = load_builtin().unwrap();
        let mut p = PlayerRecord::new(1, "neo", 0.0, 0);
        p.talents.insert("passive_income".into(), 2);
        p.talents.insert("quick_start".into(), 1);
        let b = TalentBonuses::for_player(&catalog, &p);
        assert_eq!(b.get(TalentEffect::PassiveIncome), 6.0);
        assert_eq!(b.get(TalentEffect::QuickStart), 2000.0);
        assert_eq!(b.get(TalentEffect::Evasion), 0.0);
    }

    #[test]
    fn levels_above_max_are_capped() {
        let catalog = load_builtin().unwrap();
        let mut p = PlayerRecord::new(1, "neo", 0.0, 0);
        p.talents.insert("efficiency".into(), 99);
        let b = TalentBonuses::for_player(&catalog, &p);
        assert_eq!(b.get(TalentEffect::Efficiency), 4.0);
    }
}
