//! Persistent records stored in the game database.
//!
//! Every record carries a `schema_version` that the store checks on read.
//! Records are encoded with bincode, so enums here stay externally tagged.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const PLAYER_SCHEMA_VERSION: u8 = 1;
pub const GANG_SCHEMA_VERSION: u8 = 1;
pub const TERRITORY_SCHEMA_VERSION: u8 = 1;
pub const LISTING_SCHEMA_VERSION: u8 = 1;
pub const BOSS_SCHEMA_VERSION: u8 = 1;
pub const HEIST_SCHEMA_VERSION: u8 = 1;
pub const WAR_SCHEMA_VERSION: u8 = 1;
pub const PAYMENT_SCHEMA_VERSION: u8 = 1;
pub const CREDIT_SCHEMA_VERSION: u8 = 1;
pub const TOURNAMENT_SCHEMA_VERSION: u8 = 1;

/// Maximum number of entries retained in a gang activity log.
pub const GANG_LOG_LIMIT: usize = 50;

// ============================================================================
// Player
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OwnedBusiness {
    pub business_id: String,
    pub level: u32,
    pub has_manager: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryEntry {
    pub item_id: String,
    pub equipped: bool,
    pub acquired_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OwnedCase {
    pub id: u64,
    pub case_id: String,
    pub acquired_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlayerStats {
    pub total_robberies: u64,
    pub successful_robberies: u64,
    pub pvp_wins: u64,
    pub pvp_losses: u64,
    pub casino_plays: u64,
    pub casino_wins: u64,
    pub market_sales: u64,
    pub cases_opened: u64,
    pub bosses_killed: u64,
    pub heists_completed: u64,
    pub tournament_podiums: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissionProgress {
    pub mission_id: String,
    pub progress: f64,
    pub claimed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MissionBoard {
    pub day: Option<NaiveDate>,
    pub entries: Vec<MissionProgress>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoginStreak {
    pub streak: u32,
    pub last_claim: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestProgress {
    pub quest_id: String,
    pub step: usize,
    pub progress: f64,
    pub completed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeasonProgress {
    pub season_id: String,
    pub xp: f64,
    pub premium: bool,
    pub claimed_free: BTreeSet<u32>,
    pub claimed_premium: BTreeSet<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventProgress {
    pub event_id: String,
    pub score: f64,
    /// Indices of claimed milestones.
    pub claimed: BTreeSet<usize>,
}

/// The authoritative state of one player.
///
/// Owned collections live inside the record so that a prestige reset or a
/// multi-collection update lands in a single write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerRecord {
    pub telegram_id: i64,
    pub username: String,
    pub cash: f64,
    pub suspicion: f64,
    pub fear: u64,
    pub respect: u64,
    pub last_collect_ts: i64,
    pub robbery_cooldown_ts: i64,
    pub pvp_cooldown_ts: i64,
    pub last_boss_attack_ts: i64,
    pub total_earned: f64,
    pub stats: PlayerStats,
    pub prestige_level: u32,
    pub prestige_multiplier: f64,
    pub talent_points: u32,
    pub talents: BTreeMap<String, u32>,
    pub gang_id: Option<u64>,
    pub referral_code: String,
    pub referred_by: Option<i64>,
    pub referral_count: u32,
    pub vip_until: i64,
    pub last_ad_ts: BTreeMap<String, i64>,
    pub ad_boost_until: i64,
    pub last_vip_case_claim: Option<NaiveDate>,
    pub last_vip_skin_claim: Option<NaiveDate>,
    pub businesses: Vec<OwnedBusiness>,
    pub upgrades: BTreeMap<String, u32>,
    /// Unused safe-house charges; each one waives a single raid.
    pub raid_shields: u32,
    pub inventory: Vec<InventoryEntry>,
    pub cases: Vec<OwnedCase>,
    /// Owned business skins with duplicate counts.
    pub skins: BTreeMap<String, u32>,
    /// business_id -> skin_id
    pub equipped_skins: BTreeMap<String, String>,
    pub missions: MissionBoard,
    pub login: LoginStreak,
    pub achievements_claimed: BTreeSet<String>,
    pub quests: Vec<QuestProgress>,
    pub season: SeasonProgress,
    pub event: EventProgress,
    pub last_tournament_prize_day: Option<NaiveDate>,
    pub created_at: i64,
    pub updated_at: i64,
    pub schema_version: u8,
}

pub fn referral_code_for(telegram_id: i64) -> String {
    format!("ref_{}", telegram_id)
}

impl PlayerRecord {
    pub fn new(telegram_id: i64, username: &str, starting_cash: f64, now: i64) -> Self {
        Self {
            telegram_id,
            username: username.to_string(),
            cash: starting_cash,
            suspicion: 0.0,
            fear: 0,
            respect: 0,
            last_collect_ts: now,
            robbery_cooldown_ts: 0,
            pvp_cooldown_ts: 0,
            last_boss_attack_ts: 0,
            total_earned: 0.0,
            stats: PlayerStats::default(),
            prestige_level: 0,
            prestige_multiplier: 1.0,
            talent_points: 0,
            talents: BTreeMap::new(),
            gang_id: None,
            referral_code: referral_code_for(telegram_id),
            referred_by: None,
            referral_count: 0,
            vip_until: 0,
            last_ad_ts: BTreeMap::new(),
            ad_boost_until: 0,
            last_vip_case_claim: None,
            last_vip_skin_claim: None,
            businesses: Vec::new(),
            upgrades: BTreeMap::new(),
            raid_shields: 0,
            inventory: Vec::new(),
            cases: Vec::new(),
            skins: BTreeMap::new(),
            equipped_skins: BTreeMap::new(),
            missions: MissionBoard::default(),
            login: LoginStreak::default(),
            achievements_claimed: BTreeSet::new(),
            quests: Vec::new(),
            season: SeasonProgress::default(),
            event: EventProgress::default(),
            last_tournament_prize_day: None,
            created_at: now,
            updated_at: now,
            schema_version: PLAYER_SCHEMA_VERSION,
        }
    }

    /// Player level: the sum of all owned business levels.
    pub fn level(&self) -> u32 {
        self.businesses.iter().map(|b| b.level).sum()
    }

    pub fn is_vip(&self, now: i64) -> bool {
        now < self.vip_until
    }

    pub fn vip_days_left(&self, now: i64) -> i64 {
        if !self.is_vip(now) {
            return 0;
        }
        (self.vip_until - now + 86_399) / 86_400
    }

    pub fn business_level(&self, business_id: &str) -> u32 {
        self.businesses
            .iter()
            .find(|b| b.business_id == business_id)
            .map(|b| b.level)
            .unwrap_or(0)
    }

    pub fn business_mut(&mut self, business_id: &str) -> Option<&mut OwnedBusiness> {
        self.businesses.iter_mut().find(|b| b.business_id == business_id)
    }

    pub fn owns_item(&self, item_id: &str) -> bool {
        self.inventory.iter().any(|i| i.item_id == item_id)
    }

    pub fn inventory_entry(&self, item_id: &str) -> Option<&InventoryEntry> {
        self.inventory.iter().find(|i| i.item_id == item_id)
    }

    pub fn upgrade_level(&self, upgrade_id: &str) -> u32 {
        self.upgrades.get(upgrade_id).copied().unwrap_or(0)
    }

    pub fn talent_level(&self, talent_id: &str) -> u32 {
        self.talents.get(talent_id).copied().unwrap_or(0)
    }

    /// Credit earned cash; counts toward total_earned.
    pub fn earn(&mut self, amount: f64) {
        if amount > 0.0 {
            self.cash += amount;
            self.total_earned += amount;
        }
    }

    pub fn add_suspicion(&mut self, amount: f64) {
        self.suspicion = (self.suspicion + amount).clamp(0.0, 100.0);
    }
}

// ============================================================================
// Gangs and shared world state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GangRole {
    Leader,
    Officer,
    Member,
}

impl GangRole {
    pub fn can_command(self) -> bool {
        matches!(self, GangRole::Leader | GangRole::Officer)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GangMember {
    pub telegram_id: i64,
    pub role: GangRole,
    pub joined_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GangLogEntry {
    pub ts: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GangRecord {
    pub id: u64,
    pub name: String,
    pub tag: String,
    pub leader_id: i64,
    pub cash_bank: f64,
    pub power: u64,
    pub members: Vec<GangMember>,
    pub upgrades: BTreeMap<String, u32>,
    pub log: Vec<GangLogEntry>,
    pub last_territory_attack_ts: i64,
    /// heist type -> last start timestamp
    pub heist_cooldowns: BTreeMap<String, i64>,
    pub active_war: Option<u64>,
    pub created_at: i64,
    pub schema_version: u8,
}

impl GangRecord {
    pub fn new(id: u64, name: &str, tag: &str, leader_id: i64, now: i64) -> Self {
        Self {
            id,
            name: name.to_string(),
            tag: tag.to_string(),
            leader_id,
            cash_bank: 0.0,
            power: 1,
            members: vec![GangMember {
                telegram_id: leader_id,
                role: GangRole::Leader,
                joined_at: now,
            }],
            upgrades: BTreeMap::new(),
            log: Vec::new(),
            last_territory_attack_ts: 0,
            heist_cooldowns: BTreeMap::new(),
            active_war: None,
            created_at: now,
            schema_version: GANG_SCHEMA_VERSION,
        }
    }

    pub fn member(&self, telegram_id: i64) -> Option<&GangMember> {
        self.members.iter().find(|m| m.telegram_id == telegram_id)
    }

    pub fn role_of(&self, telegram_id: i64) -> Option<GangRole> {
        self.member(telegram_id).map(|m| m.role)
    }

    pub fn upgrade_level(&self, upgrade_id: &str) -> u32 {
        self.upgrades.get(upgrade_id).copied().unwrap_or(0)
    }

    /// Append to the activity log, dropping the oldest entries past the limit.
    pub fn push_log(&mut self, ts: i64, message: impl Into<String>) {
        self.log.push(GangLogEntry {
            ts,
            message: message.into(),
        });
        if self.log.len() > GANG_LOG_LIMIT {
            let excess = self.log.len() - GANG_LOG_LIMIT;
            self.log.drain(..excess);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerritoryRecord {
    pub id: u32,
    pub owner_gang_id: Option<u64>,
    pub captured_at: i64,
    pub schema_version: u8,
}

impl TerritoryRecord {
    pub fn unclaimed(id: u32) -> Self {
        Self {
            id,
            owner_gang_id: None,
            captured_at: 0,
            schema_version: TERRITORY_SCHEMA_VERSION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub id: u64,
    pub seller_id: i64,
    pub item_id: String,
    pub price: f64,
    pub created_at: i64,
    pub schema_version: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BossRecord {
    pub gang_id: u64,
    pub boss_id: String,
    /// Position in the boss rotation.
    pub boss_index: usize,
    pub current_hp: u64,
    pub max_hp: u64,
    pub reward_pool: f64,
    /// telegram_id -> cumulative damage
    pub attackers: BTreeMap<i64, u64>,
    pub spawned_at: i64,
    pub schema_version: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeistStatus {
    Recruiting,
    Completed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeistRecord {
    pub id: u64,
    pub gang_id: u64,
    pub heist_type: String,
    pub started_by: i64,
    pub participants: Vec<i64>,
    pub status: HeistStatus,
    pub reward: f64,
    pub created_at: i64,
    pub expires_at: i64,
    pub schema_version: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarStatus {
    Active,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WarRecord {
    pub id: u64,
    pub attacker_gang_id: u64,
    pub defender_gang_id: u64,
    pub attacker_score: u64,
    pub defender_score: u64,
    pub status: WarStatus,
    /// None while active, and for a draw once finished.
    pub winner_gang_id: Option<u64>,
    pub started_at: i64,
    pub ends_at: i64,
    pub ended_at: Option<i64>,
    pub schema_version: u8,
}

impl WarRecord {
    pub fn involves(&self, gang_id: u64) -> bool {
        self.attacker_gang_id == gang_id || self.defender_gang_id == gang_id
    }

    pub fn opponent_of(&self, gang_id: u64) -> u64 {
        if self.attacker_gang_id == gang_id {
            self.defender_gang_id
        } else {
            self.attacker_gang_id
        }
    }
}

// ============================================================================
// Payments, inbox, tournament
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Stars,
    Ton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRecord {
    pub id: String,
    pub telegram_id: i64,
    pub package_id: String,
    pub method: PaymentMethod,
    /// Stars count or TON amount.
    pub amount: f64,
    /// TON amount in nanotons; zero for Stars.
    pub amount_nano: u64,
    pub comment: String,
    pub status: PaymentStatus,
    pub provider_tx: Option<String>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
    pub schema_version: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditKind {
    BossKill,
    Heist,
    Referral,
}

/// Cash owed to a player by an operation that did not hold their lock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingCredit {
    pub cash: f64,
    pub kind: CreditKind,
    pub reason: String,
    pub created_at: i64,
    pub schema_version: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TournamentEntry {
    pub telegram_id: i64,
    pub username: String,
    pub score: f64,
    pub schema_version: u8,
}
