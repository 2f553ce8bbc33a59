use serde::{Deserialize, Serialize};

/// Balance knobs that are not part of the content catalog.
///
/// Deserialized from the `[economy]` section of the config file; every field
/// has a default so partial sections are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyTuning {
    #[serde(default = "default_starting_cash")]
    pub starting_cash: f64,
    #[serde(default)]
    pub prestige_starting_cash: f64,

    #[serde(default = "default_offline_cap_hours")]
    pub offline_cap_hours: f64,
    #[serde(default = "default_vip_offline_cap_hours")]
    pub vip_offline_cap_hours: f64,
    #[serde(default = "default_vip_income_multiplier")]
    pub vip_income_multiplier: f64,

    #[serde(default = "default_raid_threshold")]
    pub raid_threshold: f64,
    #[serde(default = "default_raid_penalty")]
    pub raid_penalty: f64,
    #[serde(default = "default_raid_suspicion_drop")]
    pub raid_suspicion_drop: f64,
    #[serde(default = "default_suspicion_decay")]
    pub suspicion_decay_per_sec: f64,
    /// Per-second suspicion removed per point of equipment suspicion reduction.
    #[serde(default = "default_equip_suspicion_unit")]
    pub equip_suspicion_unit: f64,

    #[serde(default = "default_rep_factor")]
    pub fear_income_bonus: f64,
    #[serde(default = "default_rep_factor")]
    pub respect_suspicion_reduce: f64,
    #[serde(default = "default_rep_cap")]
    pub reputation_effect_cap: f64,
    #[serde(default = "default_discount_per_point")]
    pub reputation_discount: f64,
    #[serde(default = "default_reputation_discount_cap")]
    pub reputation_discount_cap: f64,
    #[serde(default = "default_total_discount_cap")]
    pub total_discount_cap: f64,

    #[serde(default = "default_robbery_fear_bonus")]
    pub robbery_fear_bonus: f64,
    #[serde(default = "default_robbery_fear_bonus_cap")]
    pub robbery_fear_bonus_cap: f64,
    #[serde(default = "default_robbery_max_chance")]
    pub robbery_max_chance: f64,
    #[serde(default = "default_robbery_min_cooldown")]
    pub robbery_min_cooldown_secs: f64,

    #[serde(default = "default_ad_cooldown")]
    pub ad_cooldown_secs: i64,
    #[serde(default = "default_ad_boost")]
    pub ad_boost_secs: i64,
    #[serde(default = "default_ad_free_bet")]
    pub ad_free_bet_cash: f64,

    #[serde(default = "default_market_commission")]
    pub market_commission: f64,
    #[serde(default = "default_vip_market_commission")]
    pub vip_market_commission: f64,
    #[serde(default = "default_market_min_price")]
    pub market_min_price: f64,

    #[serde(default = "default_duplicate_ratio")]
    pub duplicate_compensation_ratio: f64,
    #[serde(default = "default_reroll_attempts")]
    pub case_reroll_attempts: u32,
    #[serde(default = "default_vip_daily_case")]
    pub vip_daily_case_id: String,
    #[serde(default = "default_max_skin_open")]
    pub max_skin_open: u32,
    #[serde(default = "default_vip_skin_boost")]
    pub vip_skin_rare_boost: f64,

    #[serde(default = "default_referral_bonus")]
    pub referral_bonus: f64,

    #[serde(default = "default_gang_create_cost")]
    pub gang_create_cost: f64,
    #[serde(default = "default_gang_max_members")]
    pub gang_max_members: usize,
    #[serde(default = "default_gang_name_min")]
    pub gang_name_min: usize,
    #[serde(default = "default_gang_name_max")]
    pub gang_name_max: usize,

    #[serde(default = "default_pvp_cooldown")]
    pub pvp_cooldown_secs: i64,
    #[serde(default = "default_pvp_steal_percent")]
    pub pvp_steal_percent: f64,
    #[serde(default = "default_pvp_steal_percent_cap")]
    pub pvp_steal_percent_cap: f64,
    #[serde(default = "default_pvp_steal_cap")]
    pub pvp_steal_cap: f64,
    #[serde(default = "default_pvp_loss_percent")]
    pub pvp_loss_percent: f64,
    #[serde(default = "default_pvp_loss_cap")]
    pub pvp_loss_cap: f64,
    #[serde(default = "default_pvp_min_cash")]
    pub pvp_min_cash: f64,
    #[serde(default = "default_pvp_defense_per_bodyguard")]
    pub pvp_defense_per_bodyguard: f64,

    #[serde(default = "default_combat_min_chance")]
    pub combat_min_chance: f64,
    #[serde(default = "default_combat_max_chance")]
    pub combat_max_chance: f64,

    #[serde(default = "default_unclaimed_defense")]
    pub unclaimed_territory_defense: f64,
    #[serde(default = "default_defender_bonus")]
    pub territory_defender_bonus: f64,
    #[serde(default = "default_territory_cooldown")]
    pub territory_attack_cooldown_secs: i64,

    #[serde(default = "default_boss_cooldown")]
    pub boss_attack_cooldown_secs: i64,
}

fn default_starting_cash() -> f64 {
    1000.0
}
fn default_offline_cap_hours() -> f64 {
    4.0
}
fn default_vip_offline_cap_hours() -> f64 {
    8.0
}
fn default_vip_income_multiplier() -> f64 {
    2.0
}
fn default_raid_threshold() -> f64 {
    70.0
}
fn default_raid_penalty() -> f64 {
    0.5
}
fn default_raid_suspicion_drop() -> f64 {
    40.0
}
fn default_suspicion_decay() -> f64 {
    0.03
}
fn default_equip_suspicion_unit() -> f64 {
    0.1
}
fn default_rep_factor() -> f64 {
    0.005
}
fn default_rep_cap() -> f64 {
    0.5
}
fn default_discount_per_point() -> f64 {
    0.01
}
fn default_reputation_discount_cap() -> f64 {
    0.3
}
fn default_total_discount_cap() -> f64 {
    0.5
}
fn default_robbery_fear_bonus() -> f64 {
    0.005
}
fn default_robbery_fear_bonus_cap() -> f64 {
    0.15
}
fn default_robbery_max_chance() -> f64 {
    0.95
}
fn default_robbery_min_cooldown() -> f64 {
    5.0
}
fn default_ad_cooldown() -> i64 {
    180
}
fn default_ad_boost() -> i64 {
    300
}
fn default_ad_free_bet() -> f64 {
    1000.0
}
fn default_market_commission() -> f64 {
    0.10
}
fn default_vip_market_commission() -> f64 {
    0.05
}
fn default_market_min_price() -> f64 {
    100.0
}
fn default_duplicate_ratio() -> f64 {
    0.5
}
fn default_reroll_attempts() -> u32 {
    20
}
fn default_vip_daily_case() -> String {
    "case_premium".to_string()
}
fn default_max_skin_open() -> u32 {
    50
}
fn default_vip_skin_boost() -> f64 {
    2.0
}
fn default_referral_bonus() -> f64 {
    1000.0
}
fn default_gang_create_cost() -> f64 {
    50_000.0
}
fn default_gang_max_members() -> usize {
    20
}
fn default_gang_name_min() -> usize {
    2
}
fn default_gang_name_max() -> usize {
    24
}
fn default_pvp_cooldown() -> i64 {
    900
}
fn default_pvp_steal_percent() -> f64 {
    0.08
}
fn default_pvp_steal_percent_cap() -> f64 {
    0.15
}
fn default_pvp_steal_cap() -> f64 {
    50_000.0
}
fn default_pvp_loss_percent() -> f64 {
    0.04
}
fn default_pvp_loss_cap() -> f64 {
    25_000.0
}
fn default_pvp_min_cash() -> f64 {
    2000.0
}
fn default_pvp_defense_per_bodyguard() -> f64 {
    10.0
}
fn default_combat_min_chance() -> f64 {
    0.05
}
fn default_combat_max_chance() -> f64 {
    0.95
}
fn default_unclaimed_defense() -> f64 {
    50.0
}
fn default_defender_bonus() -> f64 {
    10.0
}
fn default_territory_cooldown() -> i64 {
    3600
}
fn default_boss_cooldown() -> i64 {
    600
}

impl Default for EconomyTuning {
    fn default() -> Self {
        Self {
            starting_cash: default_starting_cash(),
            prestige_starting_cash: 0.0,
            offline_cap_hours: default_offline_cap_hours(),
            vip_offline_cap_hours: default_vip_offline_cap_hours(),
            vip_income_multiplier: default_vip_income_multiplier(),
            raid_threshold: default_raid_threshold(),
            raid_penalty: default_raid_penalty(),
            raid_suspicion_drop: default_raid_suspicion_drop(),
            suspicion_decay_per_sec: default_suspicion_decay(),
            equip_suspicion_unit: default_equip_suspicion_unit(),
            fear_income_bonus: default_rep_factor(),
            respect_suspicion_reduce: default_rep_factor(),
            reputation_effect_cap: default_rep_cap(),
            reputation_discount: default_discount_per_point(),
            reputation_discount_cap: default_reputation_discount_cap(),
            total_discount_cap: default_total_discount_cap(),
            robbery_fear_bonus: default_robbery_fear_bonus(),
            robbery_fear_bonus_cap: default_robbery_fear_bonus_cap(),
            robbery_max_chance: default_robbery_max_chance(),
            robbery_min_cooldown_secs: default_robbery_min_cooldown(),
            ad_cooldown_secs: default_ad_cooldown(),
            ad_boost_secs: default_ad_boost(),
            ad_free_bet_cash: default_ad_free_bet(),
            market_commission: default_market_commission(),
            vip_market_commission: default_vip_market_commission(),
            market_min_price: default_market_min_price(),
            duplicate_compensation_ratio: default_duplicate_ratio(),
            case_reroll_attempts: default_reroll_attempts(),
            vip_daily_case_id: default_vip_daily_case(),
            max_skin_open: default_max_skin_open(),
            vip_skin_rare_boost: default_vip_skin_boost(),
            referral_bonus: default_referral_bonus(),
            gang_create_cost: default_gang_create_cost(),
            gang_max_members: default_gang_max_members(),
            gang_name_min: default_gang_name_min(),
            gang_name_max: default_gang_name_max(),
            pvp_cooldown_secs: default_pvp_cooldown(),
            pvp_steal_percent: default_pvp_steal_percent(),
            pvp_steal_percent_cap: default_pvp_steal_percent_cap(),
            pvp_steal_cap: default_pvp_steal_cap(),
            pvp_loss_percent: default_pvp_loss_percent(),
            pvp_loss_cap: default_pvp_loss_cap(),
            pvp_min_cash: default_pvp_min_cash(),
            pvp_defense_per_bodyguard: default_pvp_defense_per_bodyguard(),
            combat_min_chance: default_combat_min_chance(),
            combat_max_chance: default_combat_max_chance(),
            unclaimed_territory_defense: default_unclaimed_defense(),
            territory_defender_bonus: default_defender_bonus(),
            territory_attack_cooldown_secs: default_territory_cooldown(),
            boss_attack_cooldown_secs: default_boss_cooldown(),
        }
    }
}

impl EconomyTuning {
    /// Win probability for a power contest.
    ///
    /// Equal powers are an exact coin flip; otherwise `a / (a + d)` clamped
    /// to the configured band so no fight is certain.
    pub fn win_chance(&self, attacker: f64, defender: f64) -> f64 {
        let a = attacker.max(0.0);
        let d = defender.max(0.0);
        if (a - d).abs() < f64::EPSILON {
            return 0.5;
        }
        (a / (a + d)).clamp(self.combat_min_chance, self.combat_max_chance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_section_uses_defaults() {
        let tuning: EconomyTuning = toml::from_str("starting_cash = 150.0").unwrap();
        assert_eq!(tuning.starting_cash, 150.0);
        assert_eq!(tuning.market_commission, 0.10);
        assert_eq!(tuning.gang_max_members, 20);
    }

    #[test]
    fn win_chance_is_clamped_and_symmetric_on_ties() {
        let t = EconomyTuning::default();
        assert_eq!(t.win_chance(10.0, 10.0), 0.5);
        assert_eq!(t.win_chance(0.0, 0.0), 0.5);
        assert_eq!(t.win_chance(1000.0, 1.0), 0.95);
        assert_eq!(t.win_chance(1.0, 1000.0), 0.05);
        assert!((t.win_chance(30.0, 10.0) - 0.75).abs() < 1e-9);
    }
}
