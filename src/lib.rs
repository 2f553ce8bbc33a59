//! # Shadow Empire - economy server for a Telegram idle-crime game
//!
//! The server is the single authority over every player's money, items and
//! progress. Clients ask for actions; the engine validates them against the
//! stored state, rolls any randomness on the server and commits the result
//! atomically.
//!
//! ## Features
//!
//! - **Idle ledger**: income and suspicion accrue from owned businesses and
//!   are settled on each touch, with offline caps and police raids.
//! - **Randomized outcomes**: robberies, casino games, loot and skin cases,
//!   PvP, territory and boss combat, all behind an injectable RNG.
//! - **Progression**: daily missions, login streaks, achievements, quest
//!   lines, prestige with a talent tree, a season pass and timed events.
//! - **Economy between players**: an escrowed marketplace and gangs with a
//!   shared bank, upgrades, territories, heists, wars and raid bosses.
//! - **Monetization**: VIP, rewarded ads, Telegram Stars and TON purchases
//!   granted exactly once per provider transaction.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use shadow_empire::api::{self, AppState};
//! use shadow_empire::config::Config;
//! use shadow_empire::game::{Engine, GameStoreBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let store = GameStoreBuilder::new(config.storage.game_db_path()).open()?;
//!     let engine = Arc::new(Engine::builder(store).tuning(config.economy.clone()).build()?);
//!     api::serve(AppState::new(engine, config)?, async {}).await
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`game`] - the engine: rules, records, storage, locks, clock and RNG
//! - [`api`] - axum routes under `/api`
//! - [`auth`] - Telegram `initData` signature checks
//! - [`config`] - TOML configuration
//! - [`storage`] - database backups and the backup scheduler
//! - [`logutil`] - escaping client strings for logs
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   HTTP API      │ ← axum, auth, request shapes
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Engine        │ ← entity locks, rules, RNG, clock
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   GameStore     │ ← sled, atomic batches
//! └─────────────────┘
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod game;
pub mod logutil;
pub mod storage;
