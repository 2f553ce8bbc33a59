//! Daily missions and the login streak.

use chrono::NaiveDate;
use serde::Serialize;

use crate::game::catalog::{Catalog, GameAction, LoginReward, MissionTemplate};
use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::rng::RandomSource;
use crate::game::types::{MissionBoard, MissionProgress, PlayerRecord};
use crate::game::views::PlayerView;

/// Pick today's mission ids: distinct templates drawn uniformly.
pub fn pick_daily(catalog: &Catalog, rng: &mut dyn RandomSource) -> Vec<String> {
    let mut pool: Vec<&MissionTemplate> = catalog.progression.missions.iter().collect();
    let count = catalog.progression.missions_per_day.min(pool.len());
    let mut picks = Vec::with_capacity(count);
    for _ in 0..count {
        let idx = rng.below(pool.len());
        picks.push(pool.swap_remove(idx).id.clone());
    }
    picks
}

pub fn board_for(day: NaiveDate, mission_ids: Vec<String>) -> MissionBoard {
    MissionBoard {
        day: Some(day),
        entries: mission_ids
            .into_iter()
            .map(|mission_id| MissionProgress {
                mission_id,
                progress: 0.0,
                claimed: false,
            })
            .collect(),
    }
}

/// Advance every mission on the board that listens for `action`, capped at target.
pub fn advance(catalog: &Catalog, player: &mut PlayerRecord, action: GameAction, amount: f64) {
    for entry in player.missions.entries.iter_mut() {
        let Ok(template) = catalog.mission(&entry.mission_id) else {
            continue;
        };
        if template.action == action && !entry.claimed {
            entry.progress = (entry.progress + amount).min(template.target);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MissionView {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub target: f64,
    pub progress: f64,
    pub reward: f64,
    pub claimed: bool,
}

pub fn mission_views(catalog: &Catalog, player: &PlayerRecord) -> Vec<MissionView> {
    player
        .missions
        .entries
        .iter()
        .filter_map(|entry| {
            let t = catalog.mission(&entry.mission_id).ok()?;
            Some(MissionView {
                id: t.id.clone(),
                name: t.name.clone(),
                emoji: t.emoji.clone(),
                target: t.target,
                progress: entry.progress,
                reward: t.reward,
                claimed: entry.claimed,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct MissionClaimOutcome {
    pub player: PlayerView,
    pub reward: f64,
    pub missions: Vec<MissionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginStatus {
    pub streak: u32,
    pub claimed_today: bool,
    pub rewards: Vec<LoginReward>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginClaimOutcome {
    pub player: PlayerView,
    pub streak: u32,
    pub reward: LoginReward,
}

impl Engine {
    pub fn claim_mission(&self, telegram_id: i64, mission_id: &str) -> GameResult<MissionClaimOutcome> {
        let (reward, player) = self.with_player(telegram_id, |txn, _| {
            let template = self.catalog.mission(mission_id)?;
            let entry = txn
                .player
                .missions
                .entries
                .iter_mut()
                .find(|e| e.mission_id == mission_id)
                .ok_or_else(|| GameError::NotFound(format!("mission {}", mission_id)))?;
            if entry.progress < template.target {
                return Err(GameError::NotCompleted);
            }
            if entry.claimed {
                return Err(GameError::AlreadyClaimed);
            }
            entry.claimed = true;
            txn.player.cash += template.reward;
            Ok(template.reward)
        })?;
        Ok(MissionClaimOutcome {
            player: self.view(&player),
            reward,
            missions: mission_views(&self.catalog, &player),
        })
    }

    pub fn login_status(&self, player: &PlayerRecord) -> LoginStatus {
        LoginStatus {
            streak: player.login.streak,
            claimed_today: player.login.last_claim == Some(self.clock.today()),
            rewards: self.catalog.progression.login_rewards.clone(),
        }
    }

    /// Claim today's login reward. Missing a day restarts the streak.
    pub fn claim_login(&self, telegram_id: i64) -> GameResult<LoginClaimOutcome> {
        let rewards = &self.catalog.progression.login_rewards;
        if rewards.is_empty() {
            return Err(GameError::NotFound("login rewards".into()));
        }
        let today = self.clock.today();
        let ((streak, reward), player) = self.with_player(telegram_id, |txn, _| {
            let login = &mut txn.player.login;
            if login.last_claim == Some(today) {
                return Err(GameError::AlreadyClaimed);
            }
            let continues = login.last_claim.and_then(|d| d.succ_opt()) == Some(today);
            login.streak = if continues { login.streak + 1 } else { 1 };
            login.last_claim = Some(today);
            let streak = login.streak;
            let reward = rewards[(streak as usize - 1) % rewards.len()].clone();
            self.grant_reward(&mut txn.player, &reward.reward)?;
            Ok((streak, reward))
        })?;
        Ok(LoginClaimOutcome {
            player: self.view(&player),
            streak,
            reward,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rng::ScriptedRandom;
    use crate::game::seed::load_builtin;

    #[test]
    fn daily_picks_are_distinct() {
        let catalog = load_builtin().unwrap();
        let mut rng = ScriptedRandom::new([0.0, 0.0, 0.0]);
        let picks = pick_daily(&catalog, &mut rng);
        assert_eq!(picks.len(), 3);
        assert_ne!(picks[0], picks[1]);
        assert_ne!(picks[1], picks[2]);
        assert_ne!(picks[0], picks[2]);
    }

    #[test]
    fn progress_caps_at_target() {
        let catalog = load_builtin().unwrap();
        let mut p = PlayerRecord::new(1, "neo", 0.0, 0);
        p.missions = board_for(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), vec!["robbery".into()]);
        advance(&catalog, &mut p, GameAction::Robbery, 10.0);
        assert_eq!(p.missions.entries[0].progress, 3.0);
        advance(&catalog, &mut p, GameAction::CasinoPlay, 1.0);
        assert_eq!(p.missions.entries[0].progress, 3.0);
    }
}
