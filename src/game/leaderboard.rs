use serde::Serialize;

use crate::game::engine::Engine;
use crate::game::errors::GameResult;
use crate::game::views::round2;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LeaderboardEntry {
    pub telegram_id: i64,
    pub username: String,
    pub cash: f64,
    pub total_earned: f64,
    pub reputation_fear: u64,
    pub reputation_respect: u64,
    pub level: u32,
    pub prestige_level: u32,
}

impl Engine {
    /// Top 20 players by lifetime earnings.
    pub fn leaderboard(&self) -> GameResult<Vec<LeaderboardEntry>> {
        let mut players = self.store.list_players()?;
        players.sort_by(|a, b| {
            b.total_earned
                .total_cmp(&a.total_earned)
                .then(a.telegram_id.cmp(&b.telegram_id))
        });
        Ok(players
            .into_iter()
            .take(20)
            .map(|p| LeaderboardEntry {
                telegram_id: p.telegram_id,
                level: p.level(),
                cash: round2(p.cash),
                total_earned: round2(p.total_earned),
                reputation_fear: p.fear,
                reputation_respect: p.respect,
                prestige_level: p.prestige_level,
                username: p.username,
            })
            .collect())
    }
}
