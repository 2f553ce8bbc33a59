//! Achievements derived from player statistics.

use serde::Serialize;

use crate::game::catalog::{AchievementStat, Catalog, Rarity};
use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::types::PlayerRecord;
use crate::game::views::PlayerView;

/// Current value of the statistic an achievement measures.
pub fn stat_value(catalog: &Catalog, player: &PlayerRecord, stat: AchievementStat) -> f64 {
    match stat {
        AchievementStat::TotalRobberies => player.stats.total_robberies as f64,
        AchievementStat::TotalEarned => player.total_earned,
        AchievementStat::Level => player.level() as f64,
        AchievementStat::InventoryCount => player.inventory.len() as f64,
        AchievementStat::LegendaryCount => player
            .inventory
            .iter()
            .filter(|e| {
                catalog
                    .item(&e.item_id)
                    .map(|i| i.rarity == Rarity::Legendary)
                    .unwrap_or(false)
            })
            .count() as f64,
        AchievementStat::GangMember => {
            if player.gang_id.is_some() {
                1.0
            } else {
                0.0
            }
        }
        AchievementStat::PrestigeLevel => player.prestige_level as f64,
        AchievementStat::PvpWins => player.stats.pvp_wins as f64,
        AchievementStat::CasinoWins => player.stats.casino_wins as f64,
        AchievementStat::MarketSales => player.stats.market_sales as f64,
        AchievementStat::BossesKilled => player.stats.bosses_killed as f64,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AchievementView {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub description: String,
    pub target: f64,
    pub reward: f64,
    pub progress: f64,
    pub completed: bool,
    pub claimed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AchievementGroup {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub achievements: Vec<AchievementView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AchievementClaimOutcome {
    pub player: PlayerView,
    pub reward: f64,
    pub achievements: Vec<AchievementGroup>,
}

/// Achievements grouped by category in catalog order.
pub fn achievement_groups(catalog: &Catalog, player: &PlayerRecord) -> Vec<AchievementGroup> {
    catalog
        .progression
        .achievement_categories
        .iter()
        .map(|cat| AchievementGroup {
            id: cat.id.clone(),
            name: cat.name.clone(),
            emoji: cat.emoji.clone(),
            achievements: catalog
                .progression
                .achievements
                .iter()
                .filter(|a| a.category == cat.id)
                .map(|a| {
                    let value = stat_value(catalog, player, a.stat);
                    AchievementView {
                        id: a.id.clone(),
                        name: a.name.clone(),
                        emoji: a.emoji.clone(),
                        description: a.description.clone(),
                        target: a.target,
                        reward: a.reward,
                        progress: value.min(a.target),
                        completed: value >= a.target,
                        claimed: player.achievements_claimed.contains(&a.id),
                    }
                })
                .collect(),
        })
        .collect()
}

impl Engine {
    pub fn achievements(&self, telegram_id: i64) -> GameResult<Vec<AchievementGroup>> {
        let player = self.store.get_player(telegram_id)?;
        Ok(achievement_groups(&self.catalog, &player))
    }

    pub fn claim_achievement(&self, telegram_id: i64, achievement_id: &str) -> GameResult<AchievementClaimOutcome> {
        let def = self.catalog.achievement(achievement_id)?.clone();
        let (reward, player) = self.with_player(telegram_id, |txn, _| {
            if txn.player.achievements_claimed.contains(&def.id) {
                return Err(GameError::AlreadyClaimed);
            }
            if stat_value(&self.catalog, &txn.player, def.stat) < def.target {
                return Err(GameError::NotCompleted);
            }
            txn.player.achievements_claimed.insert(def.id.clone());
            txn.player.cash += def.reward;
            Ok(def.reward)
        })?;
        Ok(AchievementClaimOutcome {
            player: self.view(&player),
            reward,
            achievements: achievement_groups(&self.catalog, &player),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::seed::load_builtin;

    #[test]
    fn gang_membership_is_binary() {
        let catalog = load_builtin().unwrap();
        let mut p = PlayerRecord::new(1, "a", 0.0, 0);
        assert_eq!(stat_value(&catalog, &p, AchievementStat::GangMember), 0.0);
        p.gang_id = Some(9);
        assert_eq!(stat_value(&catalog, &p, AchievementStat::GangMember), 1.0);
    }

    #[test]
    fn every_achievement_lands_in_a_group() {
        let catalog = load_builtin().unwrap();
        let p = PlayerRecord::new(1, "a", 0.0, 0);
        let grouped: usize = achievement_groups(&catalog, &p).iter().map(|g| g.achievements.len()).sum();
        assert_eq!(grouped, catalog.progression.achievements.len());
    }
}
