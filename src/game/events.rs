//! Seasonal event milestones, the weekly event and the daily tournament.

use chrono::{Duration, NaiveDate};
use log::info;
use serde::Serialize;

use crate::game::catalog::{SeasonalEvent, TournamentPrize, WeeklyEvent};
use crate::game::engine::{Engine, PlayerTxn};
use crate::game::errors::{GameError, GameResult};
use crate::game::types::{OwnedCase, PlayerRecord, TournamentEntry};
use crate::game::views::PlayerView;

#[derive(Debug, Clone, Serialize)]
pub struct EventView {
    pub event: SeasonalEvent,
    pub score: f64,
    pub claimed: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventClaimOutcome {
    pub player: PlayerView,
    pub event_progress: Option<EventView>,
    pub player_cases: Vec<OwnedCase>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TournamentBoard {
    pub day: NaiveDate,
    pub leaderboard: Vec<TournamentEntry>,
    pub my_score: f64,
    /// 1-based rank, absent when the player has not scored today.
    pub my_rank: Option<usize>,
    pub prizes: Vec<TournamentPrize>,
}

/// Prize granted for a finish in yesterday's tournament.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TournamentAward {
    pub day: NaiveDate,
    pub rank: usize,
    pub cash: f64,
    pub cases: u32,
}

impl Engine {
    pub fn event_view(&self, player: &PlayerRecord) -> Option<EventView> {
        let event = self.catalog.active_event()?;
        let (score, claimed) = if player.event.event_id == event.id {
            (player.event.score, player.event.claimed.iter().copied().collect())
        } else {
            (0.0, Vec::new())
        };
        Some(EventView {
            event: event.clone(),
            score,
            claimed,
        })
    }

    /// The weekly theme for today's weekday, if one is scheduled.
    pub fn weekly_event(&self) -> Option<WeeklyEvent> {
        self.catalog.events.weekly.get(&self.clock.weekday()).cloned()
    }

    pub fn claim_event(&self, telegram_id: i64, milestone_index: usize) -> GameResult<EventClaimOutcome> {
        let event = self
            .catalog
            .active_event()
            .ok_or_else(|| GameError::NotFound("active event".into()))?
            .clone();
        let milestone = event
            .milestones
            .get(milestone_index)
            .ok_or_else(|| GameError::InvalidRequest("Invalid milestone".into()))?
            .clone();
        let ((), player) = self.with_player(telegram_id, |txn, _| {
            let progress = &mut txn.player.event;
            if progress.claimed.contains(&milestone_index) {
                return Err(GameError::AlreadyClaimed);
            }
            if progress.score < milestone.target {
                return Err(GameError::NotCompleted);
            }
            progress.claimed.insert(milestone_index);
            self.grant_reward(&mut txn.player, &milestone.reward)
        })?;
        Ok(EventClaimOutcome {
            player: self.view(&player),
            event_progress: self.event_view(&player),
            player_cases: player.cases,
        })
    }

    /// Today's standings, top 20, with the caller's own rank.
    pub fn tournament(&self, telegram_id: Option<i64>) -> GameResult<TournamentBoard> {
        let day = self.clock.today();
        let standings = self.store.tournament_standings(day)?;
        let mine = telegram_id.and_then(|id| standings.iter().position(|e| e.telegram_id == id));
        Ok(TournamentBoard {
            day,
            my_score: mine.map(|i| standings[i].score).unwrap_or(0.0),
            my_rank: mine.map(|i| i + 1),
            leaderboard: standings.into_iter().take(20).collect(),
            prizes: self.catalog.events.tournament.prizes.clone(),
        })
    }

    /// Pay out yesterday's tournament finish once per day.
    pub(crate) fn award_tournament_prize(&self, txn: &mut PlayerTxn) -> GameResult<Option<TournamentAward>> {
        let Some(yesterday) = self.clock.today().checked_sub_signed(Duration::days(1)) else {
            return Ok(None);
        };
        if txn.player.last_tournament_prize_day == Some(yesterday) {
            return Ok(None);
        }
        txn.player.last_tournament_prize_day = Some(yesterday);
        let rules = &self.catalog.events.tournament;
        let standings = self.store.tournament_standings(yesterday)?;
        let Some(rank) = standings
            .iter()
            .position(|e| e.telegram_id == txn.player.telegram_id)
        else {
            return Ok(None);
        };
        let Some(prize) = rules.prizes.get(rank) else {
            return Ok(None);
        };
        txn.player.cash += prize.cash;
        for _ in 0..prize.cases {
            self.grant_case(&mut txn.player, &rules.prize_case_id)?;
        }
        if rank < 3 {
            txn.player.stats.tournament_podiums += 1;
        }
        info!(
            "tournament: player {} placed {} on {} (+{:.0}, {} cases)",
            txn.player.telegram_id,
            rank + 1,
            yesterday,
            prize.cash,
            prize.cases
        );
        Ok(Some(TournamentAward {
            day: yesterday,
            rank: rank + 1,
            cash: prize.cash,
            cases: prize.cases,
        }))
    }
}
