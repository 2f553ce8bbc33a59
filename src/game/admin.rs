//! Operator commands behind the admin secret.
//!
//! - grant cash to a player (idle income is synced first)
//! - list the newest players
//! - wipe a player so the next `init` starts from scratch

use log::{info, warn};
use serde::Serialize;

use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::locks::EntityKey;
use crate::game::storage::{keys, WriteBatch};

#[derive(Debug, Clone, Serialize)]
pub struct AdminCash {
    pub telegram_id: i64,
    pub cash: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AdminPlayer {
    pub telegram_id: i64,
    pub username: String,
    pub cash: f64,
    pub prestige_level: u32,
}

impl Engine {
    /// Add (or with a negative amount, remove) cash. Not counted as income.
    pub fn admin_add_cash(&self, telegram_id: i64, amount: f64) -> GameResult<AdminCash> {
        if !amount.is_finite() {
            return Err(GameError::InvalidRequest("amount must be a number".into()));
        }
        let ((), player) = self.with_player(telegram_id, |txn, _| {
            if txn.player.cash + amount < 0.0 {
                return Err(GameError::InsufficientFunds);
            }
            txn.player.cash += amount;
            Ok(())
        })?;
        info!(target: "security", "admin: cash {:+.2} for player {}", amount, telegram_id);
        Ok(AdminCash {
            telegram_id,
            cash: player.cash,
        })
    }

    /// Most recently registered players first.
    pub fn admin_players(&self, limit: usize) -> GameResult<Vec<AdminPlayer>> {
        let mut players = self.store.list_players()?;
        players.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.telegram_id.cmp(&a.telegram_id)));
        Ok(players
            .into_iter()
            .take(limit)
            .map(|p| AdminPlayer {
                telegram_id: p.telegram_id,
                username: p.username,
                cash: p.cash,
                prestige_level: p.prestige_level,
            })
            .collect())
    }

    /// Delete a player with their listings, inbox and today's tournament
    /// score. Gang membership is given up through the normal leave path.
    /// Payment records stay. Returns false when there was nothing to delete.
    pub fn admin_reset_player(&self, telegram_id: i64) -> GameResult<bool> {
        let Some(player) = self.store.find_player(telegram_id)? else {
            return Ok(false);
        };
        if player.gang_id.is_some() {
            match self.leave_gang(telegram_id) {
                Ok(_) | Err(GameError::NotInGang) => {}
                Err(e) => return Err(e),
            }
        }

        let mut locks = self.locks.acquire_all(vec![EntityKey::Player(telegram_id)])?;
        if self.store.find_player(telegram_id)?.is_none() {
            return Ok(false);
        }
        let mut batch = WriteBatch::new();
        let mut listings: Vec<u64> = self
            .store
            .list_listings()?
            .into_iter()
            .filter(|l| l.seller_id == telegram_id)
            .map(|l| l.id)
            .collect();
        listings.sort_unstable();
        for id in &listings {
            locks.acquire(EntityKey::Listing(*id))?;
            batch.remove(keys::listing(*id));
        }
        for (key, _) in self.store.inbox(telegram_id)? {
            batch.remove(key);
        }
        batch.remove(keys::tournament(self.clock.today(), telegram_id));
        batch.remove(keys::player(telegram_id));
        self.store.commit(batch)?;
        warn!(
            target: "security",
            "admin: reset player {} ({} listings removed)",
            telegram_id,
            listings.len()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::clock::ManualClock;
    use crate::game::storage::GameStoreBuilder;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn engine() -> (Engine, Arc<ManualClock>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = GameStoreBuilder::new(tmp.path().join("db")).open().unwrap();
        let clock = Arc::new(ManualClock::at(1_748_865_600));
        let engine = Engine::builder(store).clock(clock.clone()).build().unwrap();
        (engine, clock, tmp)
    }

    #[test]
    fn newest_players_first() {
        let (engine, clock, _tmp) = engine();
        for id in [3, 1, 2] {
            engine.init(id, "p", None).unwrap();
            clock.advance(10);
        }
        let ids: Vec<i64> = engine.admin_players(2).unwrap().iter().map(|p| p.telegram_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn cash_cannot_go_negative() {
        let (engine, _clock, _tmp) = engine();
        engine.init(1, "p", None).unwrap();
        let cash = engine.store().get_player(1).unwrap().cash;
        assert!(matches!(
            engine.admin_add_cash(1, -(cash + 1.0)),
            Err(GameError::InsufficientFunds)
        ));
        assert_eq!(engine.admin_add_cash(1, 250.0).unwrap().cash, cash + 250.0);
        assert_eq!(engine.store().get_player(1).unwrap().total_earned, 0.0);
    }
}
