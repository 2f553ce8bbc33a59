//! VIP entitlements and ad rewards.

use log::info;
use serde::{Deserialize, Serialize};

use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::types::{InventoryEntry, OwnedCase, PlayerRecord};
use crate::game::views::PlayerView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdRewardType {
    IncomeBoost,
    FreeBet,
    ResetCooldown,
}

impl AdRewardType {
    pub fn as_str(self) -> &'static str {
        match self {
            AdRewardType::IncomeBoost => "income_boost",
            AdRewardType::FreeBet => "free_bet",
            AdRewardType::ResetCooldown => "reset_cooldown",
        }
    }

    /// Rewards that only save time; VIP players skip their throttle.
    pub fn is_time_based(self) -> bool {
        !matches!(self, AdRewardType::FreeBet)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VipStatus {
    pub is_vip: bool,
    pub vip_until: i64,
    pub days_left: i64,
}

pub fn vip_status_of(player: &PlayerRecord, now: i64) -> VipStatus {
    VipStatus {
        is_vip: player.is_vip(now),
        vip_until: player.vip_until,
        days_left: player.vip_days_left(now),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdReward {
    #[serde(rename = "type")]
    pub kind: AdRewardType,
    pub duration: Option<i64>,
    pub cash: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdRewardOutcome {
    pub player: PlayerView,
    pub reward: AdReward,
}

#[derive(Debug, Clone, Serialize)]
pub struct VipCaseOutcome {
    pub player: PlayerView,
    pub player_cases: Vec<OwnedCase>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VipItemOutcome {
    pub player: PlayerView,
    pub inventory: Vec<InventoryEntry>,
    pub item_id: String,
}

impl Engine {
    pub fn vip_status(&self, telegram_id: i64) -> GameResult<VipStatus> {
        let player = self.store.get_player(telegram_id)?;
        Ok(vip_status_of(&player, self.now()))
    }

    /// Extend VIP by `days` from the later of now and the current expiry.
    pub(crate) fn extend_vip(&self, player: &mut PlayerRecord, days: u32) {
        let now = self.now();
        player.vip_until = player.vip_until.max(now) + i64::from(days) * 86_400;
    }

    pub fn ad_reward(&self, telegram_id: i64, kind: AdRewardType) -> GameResult<AdRewardOutcome> {
        let (reward, player) = self.with_player(telegram_id, |txn, _| {
            let now = self.now();
            let t = &self.tuning;
            let waived = kind.is_time_based() && txn.player.is_vip(now);
            if !waived {
                if let Some(last) = txn.player.last_ad_ts.get(kind.as_str()) {
                    let ready = last + t.ad_cooldown_secs;
                    if now < ready {
                        return Err(GameError::AdCooldown {
                            remaining_secs: (ready - now) as u64,
                        });
                    }
                }
            }
            txn.player.last_ad_ts.insert(kind.as_str().to_string(), now);
            let reward = match kind {
                AdRewardType::IncomeBoost => {
                    txn.player.ad_boost_until = now + t.ad_boost_secs;
                    AdReward {
                        kind,
                        duration: Some(t.ad_boost_secs),
                        cash: None,
                    }
                }
                AdRewardType::FreeBet => {
                    txn.player.cash += t.ad_free_bet_cash;
                    AdReward {
                        kind,
                        duration: None,
                        cash: Some(t.ad_free_bet_cash),
                    }
                }
                AdRewardType::ResetCooldown => {
                    txn.player.robbery_cooldown_ts = 0;
                    AdReward {
                        kind,
                        duration: None,
                        cash: None,
                    }
                }
            };
            Ok(reward)
        })?;
        Ok(AdRewardOutcome {
            player: self.view(&player),
            reward,
        })
    }

    /// Free premium case, once per calendar day while VIP.
    pub fn vip_daily_case(&self, telegram_id: i64) -> GameResult<VipCaseOutcome> {
        let case_id = self.tuning.vip_daily_case_id.clone();
        let ((), player) = self.with_player(telegram_id, |txn, _| {
            if !txn.player.is_vip(self.now()) {
                return Err(GameError::VipRequired);
            }
            let today = self.clock.today();
            if txn.player.last_vip_case_claim == Some(today) {
                return Err(GameError::AlreadyClaimed);
            }
            txn.player.last_vip_case_claim = Some(today);
            self.grant_case(&mut txn.player, &case_id)?;
            Ok(())
        })?;
        info!("vip: player {} claimed daily {}", telegram_id, case_id);
        Ok(VipCaseOutcome {
            player: self.view(&player),
            player_cases: player.cases,
        })
    }

    pub fn vip_claim_item(&self, telegram_id: i64, item_id: &str) -> GameResult<VipItemOutcome> {
        if !self.catalog.monetization.vip_item_ids.iter().any(|id| id == item_id) {
            return Err(GameError::NotFound(format!("VIP item {}", item_id)));
        }
        let ((), player) = self.with_player(telegram_id, |txn, _| {
            if !txn.player.is_vip(self.now()) {
                return Err(GameError::VipRequired);
            }
            if txn.player.owns_item(item_id) {
                return Err(GameError::AlreadyOwned);
            }
            txn.player.inventory.push(InventoryEntry {
                item_id: item_id.to_string(),
                equipped: false,
                acquired_at: self.now(),
            });
            Ok(())
        })?;
        Ok(VipItemOutcome {
            player: self.view(&player),
            inventory: player.inventory,
            item_id: item_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_free_bet_keeps_throttle_for_vip() {
        assert!(AdRewardType::IncomeBoost.is_time_based());
        assert!(AdRewardType::ResetCooldown.is_time_based());
        assert!(!AdRewardType::FreeBet.is_time_based());
    }

    #[test]
    fn reward_type_parses_snake_case() {
        let kind: AdRewardType = serde_json::from_str("\"reset_cooldown\"").unwrap();
        assert_eq!(kind, AdRewardType::ResetCooldown);
        assert_eq!(kind.as_str(), "reset_cooldown");
    }

    #[test]
    fn status_reports_days_left() {
        let mut p = PlayerRecord::new(1, "a", 0.0, 0);
        p.vip_until = 3 * 86_400;
        let status = vip_status_of(&p, 10);
        assert!(status.is_vip);
        assert_eq!(status.days_left, 3);
    }
}
