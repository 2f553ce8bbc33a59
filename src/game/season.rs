//! Season pass: XP levels with a free and a premium reward track.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::game::catalog::{Catalog, SeasonRewardPair};
use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::types::{OwnedCase, PlayerRecord};
use crate::game::views::PlayerView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonTrack {
    Free,
    Premium,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeasonView {
    pub season_id: String,
    pub name: String,
    pub xp: f64,
    pub level: u32,
    pub max_level: u32,
    pub xp_per_level: f64,
    pub is_premium: bool,
    pub premium_stars: u32,
    pub free_claimed: BTreeSet<u32>,
    pub premium_claimed: BTreeSet<u32>,
    pub rewards: BTreeMap<u32, SeasonRewardPair>,
}

pub fn season_view(catalog: &Catalog, player: &PlayerRecord) -> SeasonView {
    let pass = &catalog.progression.season_pass;
    SeasonView {
        season_id: pass.id.clone(),
        name: pass.name.clone(),
        xp: player.season.xp,
        level: pass.level_for(player.season.xp),
        max_level: pass.max_level,
        xp_per_level: pass.xp_per_level,
        is_premium: player.season.premium,
        premium_stars: pass.premium_stars,
        free_claimed: player.season.claimed_free.clone(),
        premium_claimed: player.season.claimed_premium.clone(),
        rewards: pass.rewards.clone(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeasonClaimOutcome {
    pub player: PlayerView,
    pub season_pass: SeasonView,
    pub player_cases: Vec<OwnedCase>,
}

impl Engine {
    pub fn claim_season(&self, telegram_id: i64, level: u32, track: SeasonTrack) -> GameResult<SeasonClaimOutcome> {
        let pass = &self.catalog.progression.season_pass;
        if level < 1 || level > pass.max_level {
            return Err(GameError::InvalidRequest("Invalid level".into()));
        }
        let pair = pass
            .rewards
            .get(&level)
            .ok_or_else(|| GameError::NotFound(format!("season reward for level {}", level)))?
            .clone();
        let ((), player) = self.with_player(telegram_id, |txn, _| {
            let season = &txn.player.season;
            if pass.level_for(season.xp) < level {
                return Err(GameError::NotCompleted);
            }
            if track == SeasonTrack::Premium && !season.premium {
                return Err(GameError::InvalidRequest("Premium pass required".into()));
            }
            let claimed = match track {
                SeasonTrack::Free => &mut txn.player.season.claimed_free,
                SeasonTrack::Premium => &mut txn.player.season.claimed_premium,
            };
            if !claimed.insert(level) {
                return Err(GameError::AlreadyClaimed);
            }
            let reward = match track {
                SeasonTrack::Free => &pair.free,
                SeasonTrack::Premium => &pair.premium,
            };
            self.grant_reward(&mut txn.player, reward)
        })?;
        Ok(SeasonClaimOutcome {
            player: self.view(&player),
            season_pass: season_view(&self.catalog, &player),
            player_cases: player.cases,
        })
    }
}
