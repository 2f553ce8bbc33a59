//! Shared fixtures for integration tests: a throwaway sled store, a manual
//! clock and a seeded RNG behind a fully built [`Engine`].
#![allow(dead_code)]

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

use shadow_empire::game::seed::load_builtin;
use shadow_empire::game::storage::WriteBatch;
use shadow_empire::game::types::PlayerRecord;
use shadow_empire::game::{
    Catalog, EconomyTuning, Engine, GameStoreBuilder, ManualClock, RandomSource, ScriptedRandom,
};

/// 2025-06-02 12:00:00 UTC, a Monday.
pub const START: i64 = 1_748_865_600;

pub struct TestGame {
    pub engine: Arc<Engine>,
    pub clock: Arc<ManualClock>,
    // Keeps the database directory alive for the test's duration.
    _dir: TempDir,
}

pub fn game() -> TestGame {
    game_with(load_builtin().expect("built-in catalog"), EconomyTuning::default())
}

pub fn game_with(catalog: Catalog, tuning: EconomyTuning) -> TestGame {
    game_with_rng(catalog, tuning, StdRng::seed_from_u64(0x5eed))
}

/// Every draw returns `sample`: 0.0 wins any chance roll and picks range
/// minimums, 0.99 loses any roll below 99%. Quests are cleared so their
/// automatic rewards stay out of cash assertions.
pub fn scripted(sample: f64) -> TestGame {
    let mut catalog = load_builtin().expect("built-in catalog");
    catalog.progression.quests.clear();
    game_with_rng(
        catalog,
        EconomyTuning::default(),
        ScriptedRandom::new(Vec::<f64>::new()).with_fallback(sample),
    )
}

pub fn game_with_rng(
    catalog: Catalog,
    tuning: EconomyTuning,
    rng: impl RandomSource + Send + 'static,
) -> TestGame {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = GameStoreBuilder::new(dir.path().join("game.db")).open().expect("open store");
    let clock = Arc::new(ManualClock::at(START));
    let engine = Engine::builder(store)
        .catalog(catalog)
        .tuning(tuning)
        .clock(clock.clone())
        .rng(rng)
        .build()
        .expect("engine");
    TestGame {
        engine: Arc::new(engine),
        clock,
        _dir: dir,
    }
}

impl TestGame {
    /// Register a player through the normal bootstrap path.
    pub fn player(&self, telegram_id: i64) -> PlayerRecord {
        self.engine
            .init(telegram_id, &format!("player{}", telegram_id), None)
            .expect("init");
        self.record(telegram_id)
    }

    pub fn record(&self, telegram_id: i64) -> PlayerRecord {
        self.engine.store().get_player(telegram_id).expect("player record")
    }

    /// Rewrite a stored player directly, for arranging preconditions.
    pub fn edit_player(&self, telegram_id: i64, edit: impl FnOnce(&mut PlayerRecord)) {
        let mut player = self.record(telegram_id);
        edit(&mut player);
        let mut batch = WriteBatch::new();
        batch.put_player(&player).expect("stage player");
        self.engine.store().commit(batch).expect("commit player");
    }

    pub fn give_cash(&self, telegram_id: i64, cash: f64) {
        self.edit_player(telegram_id, |p| p.cash = cash);
    }

    /// A gang led by `leader` with `members` joined, leader funded for fees.
    pub fn gang(&self, leader: i64, name: &str, tag: &str, members: &[i64]) -> u64 {
        self.player(leader);
        self.give_cash(leader, 1_000_000.0);
        let gang_id = self
            .engine
            .create_gang(leader, name, tag)
            .expect("create gang")
            .gang
            .expect("gang view")
            .id;
        for id in members {
            self.player(*id);
            self.engine.join_gang(*id, gang_id).expect("join gang");
        }
        gang_id
    }
}
