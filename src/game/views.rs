//! Serializable snapshots returned to clients.

use serde::Serialize;

use crate::game::types::{PlayerRecord, PlayerStats};

/// Public view of a player; derived fields are computed at render time.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlayerView {
    pub telegram_id: i64,
    pub username: String,
    pub cash: f64,
    pub suspicion: f64,
    pub reputation_fear: u64,
    pub reputation_respect: u64,
    pub level: u32,
    pub prestige_level: u32,
    pub prestige_multiplier: f64,
    pub talent_points: u32,
    pub gang_id: Option<u64>,
    pub last_collect_ts: i64,
    pub robbery_cooldown_ts: i64,
    pub pvp_cooldown_ts: i64,
    pub vip_until: i64,
    pub is_vip: bool,
    pub vip_days_left: i64,
    pub ad_boost_until: i64,
    pub total_earned: f64,
    pub referral_code: String,
    pub referral_count: u32,
    pub raid_shields: u32,
    pub stats: PlayerStats,
}

impl PlayerView {
    pub fn build(player: &PlayerRecord, now: i64) -> Self {
        Self {
            telegram_id: player.telegram_id,
            username: player.username.clone(),
            cash: round2(player.cash),
            suspicion: round2(player.suspicion),
            reputation_fear: player.fear,
            reputation_respect: player.respect,
            level: player.level(),
            prestige_level: player.prestige_level,
            prestige_multiplier: player.prestige_multiplier,
            talent_points: player.talent_points,
            gang_id: player.gang_id,
            last_collect_ts: player.last_collect_ts,
            robbery_cooldown_ts: player.robbery_cooldown_ts,
            pvp_cooldown_ts: player.pvp_cooldown_ts,
            vip_until: player.vip_until,
            is_vip: player.is_vip(now),
            vip_days_left: player.vip_days_left(now),
            ad_boost_until: player.ad_boost_until,
            total_earned: round2(player.total_earned),
            referral_code: player.referral_code.clone(),
            referral_count: player.referral_count,
            raid_shields: player.raid_shields,
            stats: player.stats.clone(),
        }
    }
}

/// Round a money value to cents for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_rounds_money() {
        let mut p = PlayerRecord::new(1, "neo", 10.456, 0);
        p.suspicion = 12.3333;
        let view = PlayerView::build(&p, 0);
        assert_eq!(view.cash, 10.46);
        assert_eq!(view.suspicion, 12.33);
        assert!(!view.is_vip);
    }
}
