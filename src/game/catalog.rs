//! Static game content: businesses, robberies, items, cases, progression
//! templates, gang content, payment packages and events.
//!
//! Content is data, not logic. It is parsed from JSON (see [`crate::game::seed`])
//! into a [`Catalog`] that the engine shares read-only behind an `Arc`.
//! Every lookup returns `GameError::NotFound` for unknown ids so request
//! handlers can surface the failure directly.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::game::errors::{GameError, GameResult};

// ============================================================================
// Shared enums
// ============================================================================

/// Player actions that feed missions, quests, events, tournaments and the season pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameAction {
    Robbery,
    RobberySuccess,
    CasinoPlay,
    CasinoWin,
    BuyBusiness,
    EarnCash,
    PvpAttack,
    PvpWin,
    ShopBuy,
    CaseOpen,
    BossAttack,
    HeistJoin,
    TerritoryCapture,
    MarketSale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    /// Rare and above count as "rare+" for loot-table boosts.
    pub fn is_rare_or_better(self) -> bool {
        self >= Rarity::Rare
    }
}

/// A grant paid out by missions, quests, events, the season pass and login streaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reward {
    Cash { amount: f64 },
    Case { case_id: String },
    CashAndCase { amount: f64, case_id: String },
    Item { item_id: String },
}

impl Reward {
    pub fn cash(&self) -> f64 {
        match self {
            Reward::Cash { amount } | Reward::CashAndCase { amount, .. } => *amount,
            _ => 0.0,
        }
    }

    pub fn case_id(&self) -> Option<&str> {
        match self {
            Reward::Case { case_id } | Reward::CashAndCase { case_id, .. } => Some(case_id),
            _ => None,
        }
    }
}

// ============================================================================
// Economy: businesses, robberies, upgrades, casino
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessKind {
    Legal,
    Shadow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessDef {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub kind: BusinessKind,
    pub base_cost: f64,
    pub base_income: f64,
    /// Suspicion per second generated by shadow businesses.
    #[serde(default)]
    pub suspicion_add: f64,
    /// Suspicion per second removed by legal businesses.
    #[serde(default)]
    pub suspicion_reduce: f64,
    pub cost_multiplier: f64,
    pub income_multiplier: f64,
    pub manager_cost: f64,
    pub unlock_level: u32,
}

impl BusinessDef {
    /// Price of the next level when the business currently sits at `level`.
    pub fn cost_at(&self, level: u32) -> f64 {
        let level = level.max(1);
        self.base_cost * self.cost_multiplier.powi(level as i32 - 1)
    }

    /// Income per second at `level`; zero for unowned businesses.
    pub fn income_at(&self, level: u32) -> f64 {
        if level == 0 {
            return 0.0;
        }
        self.base_income * self.income_multiplier.powi(level as i32 - 1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobberyDef {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub min_reward: f64,
    pub max_reward: f64,
    pub success_chance: f64,
    pub suspicion_gain: f64,
    pub cooldown_seconds: f64,
    pub unlock_level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeEffect {
    SuspicionReset,
    RaidProtection,
    IncomeBoost,
    Territory,
    PvpDefense,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeDef {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub description: String,
    pub base_cost: f64,
    pub cost_multiplier: f64,
    pub effect: UpgradeEffect,
}

impl UpgradeDef {
    pub fn cost_at(&self, current_level: u32) -> f64 {
        self.base_cost * self.cost_multiplier.powi(current_level as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CasinoGame {
    Coinflip,
    Dice,
    Slots,
    Roulette,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetLimits {
    pub name: String,
    pub emoji: String,
    pub min_bet: f64,
    pub max_bet: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotPayout {
    pub symbol: String,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasinoRules {
    pub games: BTreeMap<CasinoGame, BetLimits>,
    pub coinflip_payout: f64,
    pub dice_payout: f64,
    pub dice_seven_payout: f64,
    pub slot_symbols: Vec<String>,
    pub slot_triples: Vec<SlotPayout>,
    pub slot_two_match_payout: f64,
    pub roulette_red: Vec<u8>,
    pub roulette_black: Vec<u8>,
    pub roulette_color_payout: f64,
    pub roulette_number_payout: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomySection {
    pub businesses: Vec<BusinessDef>,
    pub robberies: Vec<RobberyDef>,
    pub upgrades: Vec<UpgradeDef>,
    pub casino: CasinoRules,
}

// ============================================================================
// Items and cases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Hat,
    Jacket,
    Accessory,
    Car,
    Weapon,
}

impl Slot {
    pub const ALL: [Slot; 5] = [Slot::Hat, Slot::Jacket, Slot::Accessory, Slot::Car, Slot::Weapon];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusType {
    None,
    Fear,
    Respect,
    Income,
    SuspicionReduce,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RarityInfo {
    pub name: String,
    pub color: String,
    pub order: u8,
    /// Scales duplicate-loot compensation for this rarity.
    pub compensation_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub slot: Slot,
    pub price: f64,
    pub rarity: Rarity,
    pub description: String,
    pub bonus_type: BonusType,
    pub bonus: f64,
    #[serde(default)]
    pub case_only: bool,
    #[serde(default)]
    pub vip_only: bool,
}

impl ItemDef {
    pub fn purchasable(&self) -> bool {
        !self.case_only && !self.vip_only && self.price > 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootEntry {
    pub item_id: String,
    pub weight: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDef {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub price: f64,
    pub rarity: Rarity,
    pub description: String,
    pub loot: Vec<LootEntry>,
    /// Overrides the global duplicate compensation ratio for this case.
    #[serde(default)]
    pub duplicate_compensation_ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemsSection {
    pub rarities: BTreeMap<Rarity, RarityInfo>,
    pub items: Vec<ItemDef>,
    pub cases: Vec<CaseDef>,
}

// ============================================================================
// Progression
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionTemplate {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub action: GameAction,
    pub target: f64,
    pub reward: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginReward {
    pub day: u32,
    pub label: String,
    pub reward: Reward,
}

/// Player statistic an achievement measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementStat {
    TotalRobberies,
    TotalEarned,
    Level,
    InventoryCount,
    LegendaryCount,
    GangMember,
    PrestigeLevel,
    PvpWins,
    CasinoWins,
    MarketSales,
    BossesKilled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementDef {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub description: String,
    pub category: String,
    pub stat: AchievementStat,
    pub target: f64,
    pub reward: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementCategory {
    pub id: String,
    pub name: String,
    pub emoji: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestStep {
    pub description: String,
    pub trigger: GameAction,
    pub target: f64,
    pub reward: Reward,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestLine {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub description: String,
    pub unlock_level: u32,
    pub steps: Vec<QuestStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrestigeRules {
    pub base_level_required: u32,
    pub level_increment: u32,
    pub multiplier_bonus: f64,
}

impl PrestigeRules {
    pub fn required_level(&self, prestige_level: u32) -> u32 {
        self.base_level_required + self.level_increment * prestige_level
    }

    pub fn multiplier_for(&self, prestige_level: u32) -> f64 {
        1.0 + prestige_level as f64 * self.multiplier_bonus
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TalentEffect {
    /// Percent discount on business purchases.
    TradeGrip,
    /// Percent passive income.
    PassiveIncome,
    /// Starting cash after prestige.
    QuickStart,
    /// Extra offline accrual hours.
    Efficiency,
    /// Percent robbery cooldown reduction.
    RobberyMaster,
    /// Percent robbery reward bonus.
    BigLoot,
    /// Starting fear after prestige.
    Intimidation,
    /// Flat PvP attack power.
    StreetFighter,
    /// Extra maximum casino bet.
    Lucky,
    /// Percent boost to rare+ loot weights.
    LootboxMaster,
    /// Percent raid penalty reduction.
    Evasion,
    /// Percent shadow suspicion reduction.
    ShadowTalent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TalentDef {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub description: String,
    pub max_level: u32,
    pub per_level: f64,
    pub effect: TalentEffect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TalentBranch {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub talents: Vec<TalentDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonRewardPair {
    pub free: Reward,
    pub premium: Reward,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonPassDef {
    pub id: String,
    pub name: String,
    pub max_level: u32,
    pub xp_per_level: f64,
    pub premium_stars: u32,
    pub xp_events: BTreeMap<GameAction, f64>,
    pub rewards: BTreeMap<u32, SeasonRewardPair>,
}

impl SeasonPassDef {
    pub fn level_for(&self, xp: f64) -> u32 {
        let raw = (xp.max(0.0) / self.xp_per_level).floor() as u32 + 1;
        raw.min(self.max_level)
    }
}

fn default_missions_per_day() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionSection {
    #[serde(default = "default_missions_per_day")]
    pub missions_per_day: usize,
    pub missions: Vec<MissionTemplate>,
    pub login_rewards: Vec<LoginReward>,
    pub achievement_categories: Vec<AchievementCategory>,
    pub achievements: Vec<AchievementDef>,
    pub quests: Vec<QuestLine>,
    pub prestige: PrestigeRules,
    pub talents: Vec<TalentBranch>,
    pub season_pass: SeasonPassDef,
}

// ============================================================================
// Gangs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerritoryDef {
    pub id: u32,
    pub name: String,
    pub emoji: String,
    pub bonus_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GangUpgradeEffect {
    /// Percent income for every member.
    Income,
    /// Flat power for territory attacks and boss damage.
    Attack,
    /// Percent raid penalty reduction for every member.
    RaidReduction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GangUpgradeDef {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub description: String,
    pub effect: GangUpgradeEffect,
    /// Cost of reaching level `i + 1`.
    pub costs: Vec<f64>,
    /// Effect value at level `i + 1`.
    pub values: Vec<f64>,
}

impl GangUpgradeDef {
    pub fn max_level(&self) -> u32 {
        self.costs.len() as u32
    }

    pub fn value_at(&self, level: u32) -> f64 {
        if level == 0 {
            return 0.0;
        }
        let idx = (level as usize).min(self.values.len()) - 1;
        self.values.get(idx).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeistDef {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub description: String,
    pub min_members: usize,
    pub min_reward: f64,
    pub max_reward: f64,
    pub reward_per_member: f64,
    pub cooldown: f64,
    pub join_window: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BossDef {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub base_hp: u64,
    pub hp_per_member: u64,
    pub reward_pool: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarRules {
    pub declare_cost: f64,
    pub duration: f64,
    pub winner_reward: f64,
    pub loser_reward: f64,
    pub score_per_pvp_win: u64,
    pub score_per_territory: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PvpRarityBonuses {
    pub weapon: BTreeMap<Rarity, f64>,
    pub defense: BTreeMap<Rarity, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GangSection {
    pub territories: Vec<TerritoryDef>,
    pub upgrades: Vec<GangUpgradeDef>,
    pub heists: Vec<HeistDef>,
    pub bosses: Vec<BossDef>,
    pub war: WarRules,
    pub pvp: PvpRarityBonuses,
}

// ============================================================================
// Monetization
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseGrant {
    pub case_id: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PackageGrant {
    Vip { days: u32 },
    Cash { amount: f64 },
    Cases { cases: Vec<CaseGrant> },
    SeasonPremium,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPackage {
    pub id: String,
    pub label: String,
    pub stars: u32,
    /// TON price; packages without one are Stars-only.
    #[serde(default)]
    pub ton: Option<f64>,
    pub grant: PackageGrant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkinDef {
    pub id: String,
    pub name: String,
    pub rarity: Rarity,
    pub css: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkinRarityDef {
    pub rarity: Rarity,
    pub name: String,
    pub color: String,
    /// Probability mass; entries are walked in order.
    pub chance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkinCaseDef {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonetizationSection {
    pub packages: Vec<PaymentPackage>,
    pub vip_item_ids: Vec<String>,
    pub skins: Vec<SkinDef>,
    pub skin_rarities: Vec<SkinRarityDef>,
    pub skin_case: SkinCaseDef,
    pub skin_case_vip: SkinCaseDef,
}

// ============================================================================
// Events and tournaments
// ============================================================================

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBonuses {
    #[serde(default = "one")]
    pub income_multiplier: f64,
    #[serde(default = "one")]
    pub robbery_multiplier: f64,
}

impl Default for EventBonuses {
    fn default() -> Self {
        Self {
            income_multiplier: 1.0,
            robbery_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMilestone {
    pub target: f64,
    pub label: String,
    pub reward: Reward,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalEvent {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub description: String,
    pub active: bool,
    pub score_events: BTreeMap<GameAction, f64>,
    pub milestones: Vec<EventMilestone>,
    #[serde(default)]
    pub bonuses: EventBonuses,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyEvent {
    pub name: String,
    pub emoji: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentPrize {
    pub cash: f64,
    #[serde(default)]
    pub cases: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentRules {
    pub score_events: BTreeMap<GameAction, f64>,
    pub prize_case_id: String,
    pub prizes: Vec<TournamentPrize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSection {
    pub seasonal: Vec<SeasonalEvent>,
    /// Keyed by weekday, Monday = 0.
    pub weekly: BTreeMap<u32, WeeklyEvent>,
    pub tournament: TournamentRules,
}

// ============================================================================
// Catalog
// ============================================================================

/// All static content the engine serves and computes against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub economy: EconomySection,
    pub items: ItemsSection,
    pub progression: ProgressionSection,
    pub gangs: GangSection,
    pub monetization: MonetizationSection,
    pub events: EventSection,
}

fn missing(kind: &str, id: impl std::fmt::Display) -> GameError {
    GameError::NotFound(format!("{} {}", kind, id))
}

impl Catalog {
    pub fn business(&self, id: &str) -> GameResult<&BusinessDef> {
        self.economy
            .businesses
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| missing("business", id))
    }

    pub fn robbery(&self, id: &str) -> GameResult<&RobberyDef> {
        self.economy
            .robberies
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| missing("robbery", id))
    }

    pub fn upgrade(&self, id: &str) -> GameResult<&UpgradeDef> {
        self.economy
            .upgrades
            .iter()
            .find(|u| u.id == id)
            .ok_or_else(|| missing("upgrade", id))
    }

    pub fn upgrade_by_effect(&self, effect: UpgradeEffect) -> Option<&UpgradeDef> {
        self.economy.upgrades.iter().find(|u| u.effect == effect)
    }

    pub fn item(&self, id: &str) -> GameResult<&ItemDef> {
        self.items
            .items
            .iter()
            .find(|i| i.id == id)
            .ok_or_else(|| missing("item", id))
    }

    pub fn case(&self, id: &str) -> GameResult<&CaseDef> {
        self.items
            .cases
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| missing("case", id))
    }

    pub fn rarity(&self, rarity: Rarity) -> Option<&RarityInfo> {
        self.items.rarities.get(&rarity)
    }

    pub fn mission(&self, id: &str) -> GameResult<&MissionTemplate> {
        self.progression
            .missions
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| missing("mission", id))
    }

    pub fn achievement(&self, id: &str) -> GameResult<&AchievementDef> {
        self.progression
            .achievements
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| missing("achievement", id))
    }

    pub fn quest(&self, id: &str) -> Option<&QuestLine> {
        self.progression.quests.iter().find(|q| q.id == id)
    }

    pub fn talent(&self, id: &str) -> GameResult<&TalentDef> {
        self.progression
            .talents
            .iter()
            .flat_map(|b| b.talents.iter())
            .find(|t| t.id == id)
            .ok_or_else(|| missing("talent", id))
    }

    pub fn talents(&self) -> impl Iterator<Item = &TalentDef> {
        self.progression.talents.iter().flat_map(|b| b.talents.iter())
    }

    pub fn territory(&self, id: u32) -> GameResult<&TerritoryDef> {
        self.gangs
            .territories
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| missing("territory", id))
    }

    pub fn gang_upgrade(&self, id: &str) -> GameResult<&GangUpgradeDef> {
        self.gangs
            .upgrades
            .iter()
            .find(|u| u.id == id)
            .ok_or_else(|| missing("gang upgrade", id))
    }

    pub fn heist(&self, id: &str) -> GameResult<&HeistDef> {
        self.gangs
            .heists
            .iter()
            .find(|h| h.id == id)
            .ok_or_else(|| missing("heist", id))
    }

    pub fn package(&self, id: &str) -> GameResult<&PaymentPackage> {
        self.monetization
            .packages
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| missing("package", id))
    }

    pub fn skin(&self, id: &str) -> GameResult<&SkinDef> {
        self.monetization
            .skins
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| missing("skin", id))
    }

    /// The first seasonal event flagged active, if any.
    pub fn active_event(&self) -> Option<&SeasonalEvent> {
        self.events.seasonal.iter().find(|e| e.active)
    }

    pub fn event_bonuses(&self) -> EventBonuses {
        self.active_event()
            .map(|e| e.bonuses.clone())
            .unwrap_or_default()
    }

    /// True when `case_id` is a loot case or the skin case.
    pub fn is_known_case(&self, case_id: &str) -> bool {
        case_id == self.monetization.skin_case.id || self.case(case_id).is_ok()
    }

    fn check_reward(&self, reward: &Reward, context: &str) -> GameResult<()> {
        if let Some(case_id) = reward.case_id() {
            if !self.is_known_case(case_id) {
                return Err(GameError::Content(format!(
                    "{} references unknown case {}",
                    context, case_id
                )));
            }
        }
        if let Reward::Item { item_id } = reward {
            self.item(item_id)
                .map_err(|_| GameError::Content(format!("{} references unknown item {}", context, item_id)))?;
        }
        Ok(())
    }

    /// Cross-check references between sections. Run once after loading.
    pub fn validate(&self) -> GameResult<()> {
        let mut seen = BTreeSet::new();
        for item in &self.items.items {
            if !seen.insert(item.id.as_str()) {
                return Err(GameError::Content(format!("duplicate item id {}", item.id)));
            }
            if self.rarity(item.rarity).is_none() {
                return Err(GameError::Content(format!("item {} has undefined rarity", item.id)));
            }
        }
        for case in &self.items.cases {
            if case.loot.is_empty() {
                return Err(GameError::Content(format!("case {} has no loot", case.id)));
            }
            for entry in &case.loot {
                if entry.weight == 0 {
                    return Err(GameError::Content(format!(
                        "case {} has zero weight for {}",
                        case.id, entry.item_id
                    )));
                }
                self.item(&entry.item_id).map_err(|_| {
                    GameError::Content(format!("case {} drops unknown item {}", case.id, entry.item_id))
                })?;
            }
        }
        for id in &self.monetization.vip_item_ids {
            let item = self
                .item(id)
                .map_err(|_| GameError::Content(format!("unknown VIP item {}", id)))?;
            if !item.vip_only {
                return Err(GameError::Content(format!("VIP item {} is not flagged vip_only", id)));
            }
        }
        let categories: BTreeSet<&str> = self
            .progression
            .achievement_categories
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        for achievement in &self.progression.achievements {
            if !categories.contains(achievement.category.as_str()) {
                return Err(GameError::Content(format!(
                    "achievement {} is in unknown category {}",
                    achievement.id, achievement.category
                )));
            }
        }
        for reward in &self.progression.login_rewards {
            self.check_reward(&reward.reward, "login reward")?;
        }
        for quest in &self.progression.quests {
            for step in &quest.steps {
                self.check_reward(&step.reward, &format!("quest {}", quest.id))?;
            }
        }
        for (level, pair) in &self.progression.season_pass.rewards {
            let ctx = format!("season level {}", level);
            self.check_reward(&pair.free, &ctx)?;
            self.check_reward(&pair.premium, &ctx)?;
        }
        for event in &self.events.seasonal {
            for milestone in &event.milestones {
                self.check_reward(&milestone.reward, &format!("event {}", event.id))?;
            }
        }
        if !self.is_known_case(&self.events.tournament.prize_case_id) {
            return Err(GameError::Content("tournament prize case is unknown".into()));
        }
        for upgrade in &self.gangs.upgrades {
            if upgrade.costs.len() != upgrade.values.len() || upgrade.costs.is_empty() {
                return Err(GameError::Content(format!(
                    "gang upgrade {} needs matching costs and values",
                    upgrade.id
                )));
            }
        }
        if self.gangs.bosses.is_empty() {
            return Err(GameError::Content("at least one boss is required".into()));
        }
        for package in &self.monetization.packages {
            if let PackageGrant::Cases { cases } = &package.grant {
                for grant in cases {
                    if !self.is_known_case(&grant.case_id) {
                        return Err(GameError::Content(format!(
                            "package {} grants unknown case {}",
                            package.id, grant.case_id
                        )));
                    }
                }
            }
        }
        let total_chance: f64 = self.monetization.skin_rarities.iter().map(|r| r.chance).sum();
        if (total_chance - 1.0).abs() > 1e-6 {
            return Err(GameError::Content(format!(
                "skin rarity chances sum to {}, expected 1.0",
                total_chance
            )));
        }
        let skin_rarities: BTreeSet<Rarity> = self.monetization.skins.iter().map(|s| s.rarity).collect();
        for rarity in &self.monetization.skin_rarities {
            if !skin_rarities.contains(&rarity.rarity) {
                return Err(GameError::Content(format!(
                    "no skins defined for rarity {:?}",
                    rarity.rarity
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car_wash() -> BusinessDef {
        BusinessDef {
            id: "car_wash".into(),
            name: "Car Wash".into(),
            emoji: "🚗".into(),
            kind: BusinessKind::Legal,
            base_cost: 800.0,
            base_income: 3.0,
            suspicion_add: 0.0,
            suspicion_reduce: 0.8,
            cost_multiplier: 1.7,
            income_multiplier: 1.15,
            manager_cost: 5000.0,
            unlock_level: 0,
        }
    }

    #[test]
    fn business_cost_treats_unowned_as_level_one() {
        let def = car_wash();
        assert_eq!(def.cost_at(0), 800.0);
        assert_eq!(def.cost_at(1), 800.0);
        assert!((def.cost_at(2) - 1360.0).abs() < 1e-9);
    }

    #[test]
    fn business_income_is_zero_when_unowned() {
        let def = car_wash();
        assert_eq!(def.income_at(0), 0.0);
        assert_eq!(def.income_at(1), 3.0);
        assert!((def.income_at(2) - 3.45).abs() < 1e-9);
    }

    #[test]
    fn prestige_requirements_grow_linearly() {
        let rules = PrestigeRules {
            base_level_required: 15,
            level_increment: 5,
            multiplier_bonus: 0.12,
        };
        assert_eq!(rules.required_level(0), 15);
        assert_eq!(rules.required_level(2), 25);
        assert!((rules.multiplier_for(3) - 1.36).abs() < 1e-9);
    }

    #[test]
    fn rarity_ordering_marks_rare_and_above() {
        assert!(!Rarity::Uncommon.is_rare_or_better());
        assert!(Rarity::Rare.is_rare_or_better());
        assert!(Rarity::Legendary > Rarity::Epic);
    }

    #[test]
    fn reward_json_is_tagged() {
        let reward: Reward = serde_json::from_str(r#"{"type":"cash_and_case","amount":500,"case_id":"case_basic"}"#)
            .expect("parse");
        assert_eq!(reward.cash(), 500.0);
        assert_eq!(reward.case_id(), Some("case_basic"));
    }
}
