//! The authoritative game economy.
//!
//! [`Engine`] owns every rule. Each public method is one player action: it
//! locks the entities it touches, applies the rule against the stored
//! records and commits the result as a single batch. Content (businesses,
//! items, cases, ...) comes from a [`Catalog`]; balance knobs that operators
//! tune live in [`EconomyTuning`].

pub mod achievements;
pub mod admin;
pub mod boss;
pub mod cases;
pub mod casino;
pub mod catalog;
pub mod clock;
pub mod engine;
pub mod errors;
pub mod events;
pub mod gang;
pub mod heist;
pub mod inventory;
pub mod leaderboard;
pub mod ledger;
pub mod locks;
pub mod maintenance;
pub mod market;
pub mod missions;
pub mod monetization;
pub mod payments;
pub mod prestige;
pub mod pvp;
pub mod quests;
pub mod rng;
pub mod robbery;
pub mod season;
pub mod seed;
pub mod skins;
pub mod snapshot;
pub mod storage;
pub mod territory;
pub mod tuning;
pub mod types;
pub mod views;
pub mod war;

pub use catalog::Catalog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Engine, EngineBuilder};
pub use errors::{GameError, GameResult};
pub use rng::{RandomSource, ScriptedRandom};
pub use storage::{GameStore, GameStoreBuilder};
pub use tuning::EconomyTuning;
