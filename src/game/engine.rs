//! The economy engine.
//!
//! Every mutating operation follows the same shape:
//!
//! 1. acquire entity locks in hierarchy order ([`EntityLocks`]),
//! 2. `touch` each player involved: fold their credit inbox and accrue idle
//!    income up to now,
//! 3. mutate the in-memory records and `track` the action for progression,
//! 4. stage every changed record into one [`WriteBatch`] and commit it.
//!
//! # Quick start
//!
//! ```no_run
//! use shadow_empire::game::{Engine, GameStoreBuilder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = GameStoreBuilder::new("./data/game").open()?;
//! let engine = Engine::builder(store).build()?;
//! let outcome = engine.collect(12345)?;
//! println!("cash: {}", outcome.player.cash);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use log::{debug, error};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::game::catalog::{BusinessKind, Catalog, EventBonuses, GameAction, GangUpgradeEffect, Reward, TalentEffect};
use crate::game::clock::{Clock, SystemClock};
use crate::game::errors::{GameError, GameResult};
use crate::game::inventory::{equipment_bonuses, EquipmentBonuses};
use crate::game::locks::{EntityKey, EntityLocks, LockSet};
use crate::game::prestige::TalentBonuses;
use crate::game::rng::RandomSource;
use crate::game::storage::{GameStore, WriteBatch};
use crate::game::tuning::EconomyTuning;
use crate::game::types::{
    CreditKind, OwnedCase, PlayerRecord, TournamentEntry, TOURNAMENT_SCHEMA_VERSION,
};
use crate::game::views::PlayerView;

/// Everything that scales a player's rates, gathered from the player, their
/// gang and the territories that gang holds.
#[derive(Debug, Clone, Default)]
pub struct Modifiers {
    /// Fear including equipment bonuses.
    pub fear: f64,
    /// Respect including equipment bonuses.
    pub respect: f64,
    pub equipment: EquipmentBonuses,
    pub upgrade_income_pct: f64,
    pub gang_income_pct: f64,
    pub gang_raid_reduction_pct: f64,
    pub gang_attack_bonus: f64,
    pub territory_pct: f64,
    pub talents: TalentBonuses,
    pub vip: bool,
    pub event: EventBonuses,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct Rates {
    pub income_per_sec: f64,
    pub suspicion_per_sec: f64,
}

/// A player loaded under lock, with idle income already applied.
pub(crate) struct PlayerTxn {
    pub player: PlayerRecord,
    pub raided: bool,
    /// Cash accrued by this touch.
    pub synced: f64,
    folded: Vec<Vec<u8>>,
    tournament_delta: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectOutcome {
    pub player: PlayerView,
    pub income_per_sec: f64,
    pub suspicion_per_sec: f64,
    pub was_raided: bool,
    pub earned: f64,
}

pub struct EngineBuilder {
    store: GameStore,
    catalog: Option<Arc<Catalog>>,
    tuning: EconomyTuning,
    clock: Arc<dyn Clock>,
    rng: Box<dyn RandomSource + Send>,
}

impl EngineBuilder {
    pub fn new(store: GameStore) -> Self {
        Self {
            store,
            catalog: None,
            tuning: EconomyTuning::default(),
            clock: Arc::new(SystemClock),
            rng: Box::new(StdRng::from_entropy()),
        }
    }

    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(Arc::new(catalog));
        self
    }

    pub fn tuning(mut self, tuning: EconomyTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn rng(mut self, rng: impl RandomSource + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn build(self) -> GameResult<Engine> {
        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => Arc::new(crate::game::seed::load_builtin()?),
        };
        Ok(Engine {
            store: self.store,
            catalog,
            tuning: self.tuning,
            clock: self.clock,
            rng: Mutex::new(self.rng),
            locks: EntityLocks::new(),
        })
    }
}

pub struct Engine {
    pub(crate) store: GameStore,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) tuning: EconomyTuning,
    pub(crate) clock: Arc<dyn Clock>,
    rng: Mutex<Box<dyn RandomSource + Send>>,
    pub(crate) locks: EntityLocks,
}

impl Engine {
    pub fn builder(store: GameStore) -> EngineBuilder {
        EngineBuilder::new(store)
    }

    pub fn store(&self) -> &GameStore {
        &self.store
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn tuning(&self) -> &EconomyTuning {
        &self.tuning
    }

    pub fn now(&self) -> i64 {
        self.clock.unix()
    }

    pub(crate) fn roll<T>(&self, f: impl FnOnce(&mut dyn RandomSource) -> T) -> T {
        let mut rng = self.rng.lock();
        f(rng.as_mut())
    }

    pub(crate) fn view(&self, player: &PlayerRecord) -> PlayerView {
        PlayerView::build(player, self.now())
    }

    // ========================================================================
    // Rates
    // ========================================================================

    pub fn modifiers(&self, player: &PlayerRecord) -> GameResult<Modifiers> {
        let now = self.now();
        let equipment = equipment_bonuses(&self.catalog, player);
        let mut mods = Modifiers {
            fear: player.fear as f64 + equipment.fear,
            respect: player.respect as f64 + equipment.respect,
            equipment,
            talents: TalentBonuses::for_player(&self.catalog, player),
            vip: player.is_vip(now),
            event: self.catalog.event_bonuses(),
            ..Modifiers::default()
        };
        if let Some(upgrade) = self
            .catalog
            .upgrade_by_effect(crate::game::catalog::UpgradeEffect::IncomeBoost)
        {
            mods.upgrade_income_pct = player.upgrade_level(&upgrade.id) as f64 * 10.0;
        }
        if let Some(gang_id) = player.gang_id {
            if let Some(gang) = self.store.find_gang(gang_id)? {
                for def in &self.catalog.gangs.upgrades {
                    let value = def.value_at(gang.upgrade_level(&def.id));
                    match def.effect {
                        GangUpgradeEffect::Income => mods.gang_income_pct += value,
                        GangUpgradeEffect::Attack => mods.gang_attack_bonus += value,
                        GangUpgradeEffect::RaidReduction => mods.gang_raid_reduction_pct += value,
                    }
                }
            }
            mods.territory_pct = self.territory_bonus(gang_id)?;
        }
        Ok(mods)
    }

    /// Total income percent granted by the territories a gang controls.
    pub fn territory_bonus(&self, gang_id: u64) -> GameResult<f64> {
        let mut total = 0.0;
        for territory in self.store.list_territories()? {
            if territory.owner_gang_id == Some(gang_id) {
                if let Ok(def) = self.catalog.territory(territory.id) {
                    total += def.bonus_percent;
                }
            }
        }
        Ok(total)
    }

    /// Income and suspicion per second. Rates are never stored.
    pub fn compute_rates(&self, player: &PlayerRecord, mods: &Modifiers, ad_boost: bool) -> Rates {
        let t = &self.tuning;
        let fear_bonus = (mods.fear * t.fear_income_bonus).min(t.reputation_effect_cap);
        let respect_reduce = (mods.respect * t.respect_suspicion_reduce).min(t.reputation_effect_cap);
        let shadow_reduce = mods.talents.get(TalentEffect::ShadowTalent) / 100.0;

        let mut income = 0.0;
        let mut suspicion = 0.0;
        for owned in &player.businesses {
            let Ok(def) = self.catalog.business(&owned.business_id) else {
                continue;
            };
            let mut business_income = def.income_at(owned.level);
            match def.kind {
                BusinessKind::Shadow => {
                    business_income *= 1.0 + fear_bonus;
                    if owned.level > 0 {
                        suspicion += def.suspicion_add * (1.0 - respect_reduce) * (1.0 - shadow_reduce);
                    }
                }
                BusinessKind::Legal => {
                    if owned.level > 0 {
                        suspicion -= def.suspicion_reduce;
                    }
                }
            }
            income += business_income;
        }

        income *= player.prestige_multiplier;
        income *= 1.0 + mods.territory_pct / 100.0;
        income *= 1.0 + mods.equipment.income_pct / 100.0;
        income *= 1.0 + mods.upgrade_income_pct / 100.0;
        income *= 1.0 + mods.gang_income_pct / 100.0;
        income *= 1.0 + mods.talents.get(TalentEffect::PassiveIncome) / 100.0;
        if mods.vip {
            income *= t.vip_income_multiplier;
        }
        income *= mods.event.income_multiplier;
        if ad_boost {
            income *= 2.0;
        }

        suspicion -= mods.equipment.suspicion_reduce * t.equip_suspicion_unit;
        suspicion -= t.suspicion_decay_per_sec;

        Rates {
            income_per_sec: income,
            suspicion_per_sec: suspicion,
        }
    }

    /// Rates as the client should display them right now.
    pub fn current_rates(&self, player: &PlayerRecord) -> GameResult<Rates> {
        let mods = self.modifiers(player)?;
        Ok(self.compute_rates(player, &mods, self.now() < player.ad_boost_until))
    }

    /// Accrue idle income and suspicion from `last_collect_ts` up to now.
    ///
    /// Returns `(earned, raided)`. Elapsed time is capped by the offline
    /// ceiling; time beyond the cap is forfeited.
    fn sync_earnings(&self, player: &mut PlayerRecord) -> GameResult<(f64, bool)> {
        let now = self.now();
        let elapsed = now - player.last_collect_ts;
        if elapsed <= 0 {
            return Ok((0.0, false));
        }
        let mods = self.modifiers(player)?;
        let t = &self.tuning;
        let base_hours = if mods.vip {
            t.vip_offline_cap_hours
        } else {
            t.offline_cap_hours
        };
        let cap = ((base_hours + mods.talents.get(TalentEffect::Efficiency)) * 3600.0) as i64;
        let elapsed = elapsed.min(cap.max(0));
        let start = player.last_collect_ts;
        player.last_collect_ts = now;
        if elapsed == 0 {
            return Ok((0.0, false));
        }

        let rates = self.compute_rates(player, &mods, false);
        let boosted = (player.ad_boost_until - start).clamp(0, elapsed);
        let mut earned = rates.income_per_sec * (elapsed + boosted) as f64;
        let mut suspicion = (player.suspicion + rates.suspicion_per_sec * elapsed as f64).clamp(0.0, 100.0);

        let mut raided = false;
        if suspicion >= t.raid_threshold {
            raided = true;
            let penalty = if player.raid_shields > 0 {
                player.raid_shields -= 1;
                0.0
            } else {
                (t.raid_penalty
                    - mods.gang_raid_reduction_pct / 100.0
                    - mods.talents.get(TalentEffect::Evasion) / 100.0)
                    .max(0.0)
            };
            earned *= 1.0 - penalty;
            suspicion = (suspicion - t.raid_suspicion_drop).max(0.0);
            debug!("raid on player {} (penalty {:.2})", player.telegram_id, penalty);
        }
        player.suspicion = suspicion;
        player.earn(earned);
        Ok((earned, raided))
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Load a locked player, fold pending credits and accrue income.
    pub(crate) fn touch(&self, locks: &LockSet<'_>, telegram_id: i64) -> GameResult<PlayerTxn> {
        if !locks.holds(&EntityKey::Player(telegram_id)) {
            error!("touch of player {} without its lock", telegram_id);
            return Err(GameError::InvariantViolation(format!(
                "player {} touched without lock",
                telegram_id
            )));
        }
        let mut player = self.store.get_player(telegram_id)?;
        let mut folded = Vec::new();
        for (key, credit) in self.store.inbox(telegram_id)? {
            player.cash += credit.cash;
            match credit.kind {
                CreditKind::BossKill => {
                    player.total_earned += credit.cash;
                    player.stats.bosses_killed += 1;
                }
                CreditKind::Heist => {
                    player.total_earned += credit.cash;
                    player.stats.heists_completed += 1;
                }
                CreditKind::Referral => player.referral_count += 1,
            }
            debug!("player {} folded credit: {}", telegram_id, credit.reason);
            folded.push(key);
        }

        self.refresh_progress(&mut player);
        let (synced, raided) = self.sync_earnings(&mut player)?;
        let mut txn = PlayerTxn {
            player,
            raided,
            synced,
            folded,
            tournament_delta: 0.0,
        };
        if synced > 0.0 {
            self.track(&mut txn, GameAction::EarnCash, synced)?;
        }
        Ok(txn)
    }

    /// Roll daily missions and reset season or event progress when the
    /// calendar or content moved on.
    fn refresh_progress(&self, player: &mut PlayerRecord) {
        let today = self.clock.today();
        if player.missions.day != Some(today) {
            let picks = self.roll(|rng| {
                crate::game::missions::pick_daily(&self.catalog, rng)
            });
            player.missions = crate::game::missions::board_for(today, picks);
        }
        crate::game::quests::unlock_quests(&self.catalog, player);
        let season_id = &self.catalog.progression.season_pass.id;
        if &player.season.season_id != season_id {
            player.season = crate::game::types::SeasonProgress {
                season_id: season_id.clone(),
                ..Default::default()
            };
        }
        if let Some(event) = self.catalog.active_event() {
            if player.event.event_id != event.id {
                player.event = crate::game::types::EventProgress {
                    event_id: event.id.clone(),
                    ..Default::default()
                };
            }
        }
    }

    /// Feed an action into missions, tournament, event, quests and season pass.
    pub(crate) fn track(&self, txn: &mut PlayerTxn, action: GameAction, amount: f64) -> GameResult<()> {
        if amount <= 0.0 {
            return Ok(());
        }
        crate::game::missions::advance(&self.catalog, &mut txn.player, action, amount);
        txn.tournament_delta += self
            .catalog
            .events
            .tournament
            .score_events
            .get(&action)
            .copied()
            .unwrap_or(0.0)
            * amount;
        if let Some(event) = self.catalog.active_event() {
            let score = event.score_events.get(&action).copied().unwrap_or(0.0) * amount;
            if score > 0.0 && txn.player.event.event_id == event.id {
                txn.player.event.score += score;
            }
        }
        let rewards = crate::game::quests::advance(&self.catalog, &mut txn.player, action, amount);
        for reward in rewards {
            self.grant_reward(&mut txn.player, &reward)?;
        }
        let season = &self.catalog.progression.season_pass;
        let xp = season.xp_events.get(&action).copied().unwrap_or(0.0) * amount;
        if xp > 0.0 {
            txn.player.season.xp += xp;
        }
        Ok(())
    }

    /// Apply a content reward to a player record.
    pub(crate) fn grant_reward(&self, player: &mut PlayerRecord, reward: &Reward) -> GameResult<()> {
        let cash = reward.cash();
        if cash > 0.0 {
            player.cash += cash;
        }
        if let Some(case_id) = reward.case_id() {
            self.grant_case(player, case_id)?;
        }
        if let Reward::Item { item_id } = reward {
            self.catalog.item(item_id)?;
            if !player.owns_item(item_id) {
                player.inventory.push(crate::game::types::InventoryEntry {
                    item_id: item_id.clone(),
                    equipped: false,
                    acquired_at: self.now(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn grant_case(&self, player: &mut PlayerRecord, case_id: &str) -> GameResult<u64> {
        let id = self.store.next_id()?;
        player.cases.push(OwnedCase {
            id,
            case_id: case_id.to_string(),
            acquired_at: self.now(),
        });
        Ok(id)
    }

    /// Atomic check-then-subtract on a loaded player.
    pub(crate) fn try_spend(&self, player: &mut PlayerRecord, amount: f64) -> GameResult<()> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(GameError::InvalidRequest("Invalid amount".into()));
        }
        if player.cash < amount {
            return Err(GameError::InsufficientFunds);
        }
        player.cash -= amount;
        Ok(())
    }

    /// Stage a touched player into `batch`, checking ledger invariants.
    pub(crate) fn stage(&self, batch: &mut WriteBatch, txn: PlayerTxn) -> GameResult<PlayerRecord> {
        let PlayerTxn {
            mut player,
            folded,
            tournament_delta,
            ..
        } = txn;
        if !player.cash.is_finite() || player.cash < 0.0 {
            error!("negative cash for player {}: {}", player.telegram_id, player.cash);
            return Err(GameError::InvariantViolation(format!(
                "cash {} for player {}",
                player.cash, player.telegram_id
            )));
        }
        if !(0.0..=100.0).contains(&player.suspicion) {
            error!("suspicion out of range for player {}: {}", player.telegram_id, player.suspicion);
            return Err(GameError::InvariantViolation(format!(
                "suspicion {} for player {}",
                player.suspicion, player.telegram_id
            )));
        }
        player.updated_at = self.now();
        batch.put_player(&player)?;
        for key in folded {
            batch.remove(key);
        }
        if tournament_delta > 0.0 {
            let day = self.clock.today();
            let mut entry = self
                .store
                .tournament_entry(day, player.telegram_id)?
                .unwrap_or(TournamentEntry {
                    telegram_id: player.telegram_id,
                    username: player.username.clone(),
                    score: 0.0,
                    schema_version: TOURNAMENT_SCHEMA_VERSION,
                });
            entry.score += tournament_delta;
            entry.username = player.username.clone();
            batch.put_tournament(day, &entry)?;
        }
        Ok(player)
    }

    /// Run a single-player operation under that player's lock and commit it.
    pub(crate) fn with_player<T>(
        &self,
        telegram_id: i64,
        op: impl FnOnce(&mut PlayerTxn, &mut WriteBatch) -> GameResult<T>,
    ) -> GameResult<(T, PlayerRecord)> {
        let locks = self.locks.acquire_all(vec![EntityKey::Player(telegram_id)])?;
        let mut txn = self.touch(&locks, telegram_id)?;
        let mut batch = WriteBatch::new();
        let out = op(&mut txn, &mut batch)?;
        let player = self.stage(&mut batch, txn)?;
        self.store.commit(batch)?;
        Ok((out, player))
    }

    // ========================================================================
    // Ledger primitives
    // ========================================================================

    /// Sync idle income and report current rates.
    pub fn collect(&self, telegram_id: i64) -> GameResult<CollectOutcome> {
        let ((earned, raided), player) =
            self.with_player(telegram_id, |txn, _| Ok((txn.synced, txn.raided)))?;
        let rates = self.current_rates(&player)?;
        Ok(CollectOutcome {
            player: self.view(&player),
            income_per_sec: rates.income_per_sec,
            suspicion_per_sec: rates.suspicion_per_sec,
            was_raided: raided,
            earned,
        })
    }

    /// Debit `amount` from a player, failing with `InsufficientFunds`.
    pub fn spend(&self, telegram_id: i64, amount: f64) -> GameResult<PlayerView> {
        let ((), player) = self.with_player(telegram_id, |txn, _| self.try_spend(&mut txn.player, amount))?;
        Ok(self.view(&player))
    }
}
