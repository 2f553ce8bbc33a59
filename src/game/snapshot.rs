//! Player bootstrap: `init` creates or refreshes a player and returns
//! everything the client needs to render its first screen.

use std::collections::BTreeMap;

use log::info;
use serde::Serialize;

use crate::game::achievements::{achievement_groups, AchievementGroup};
use crate::game::boss::BossView;
use crate::game::catalog::{Catalog, WeeklyEvent};
use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::events::{EventView, TournamentAward};
use crate::game::gang::GangSummary;
use crate::game::inventory::{character, Character};
use crate::game::locks::EntityKey;
use crate::game::market::ListingView;
use crate::game::missions::{mission_views, LoginStatus, MissionView};
use crate::game::monetization::{vip_status_of, VipStatus};
use crate::game::prestige::TalentTree;
use crate::game::quests::{quest_views, QuestView};
use crate::game::season::{season_view, SeasonView};
use crate::game::storage::WriteBatch;
use crate::game::territory::TerritoryView;
use crate::game::types::{
    CreditKind, InventoryEntry, ListingRecord, OwnedBusiness, OwnedCase, PendingCredit, PlayerRecord,
    CREDIT_SCHEMA_VERSION,
};
use crate::game::views::PlayerView;
use crate::logutil::{clean_display_name, escape_log};

/// Referrer id encoded in a `ref_<telegram_id>` code.
pub fn parse_referral(code: &str) -> Option<i64> {
    code.trim()
        .strip_prefix("ref_")
        .and_then(|id| id.parse::<i64>().ok())
        .filter(|id| *id > 0)
}

#[derive(Debug, Clone, Serialize)]
pub struct Bootstrap {
    pub player: PlayerView,
    pub created: bool,
    pub businesses: Vec<OwnedBusiness>,
    pub character: Character,
    pub inventory: Vec<InventoryEntry>,
    pub upgrades: BTreeMap<String, u32>,
    pub player_cases: Vec<OwnedCase>,
    pub income_per_sec: f64,
    pub suspicion_per_sec: f64,
    pub player_level: u32,
    pub was_raided: bool,
    pub content: Catalog,
    pub market_listings: Vec<ListingView>,
    pub my_listings: Vec<ListingRecord>,
    pub referral_count: u32,
    pub daily_missions: Vec<MissionView>,
    pub login_data: LoginStatus,
    pub achievements: Vec<AchievementGroup>,
    pub territories: Vec<TerritoryView>,
    pub territory_bonus: f64,
    pub vip_status: VipStatus,
    pub ad_boost_until: i64,
    pub player_skins: BTreeMap<String, u32>,
    pub equipped_skins: BTreeMap<String, String>,
    pub tournament_score: f64,
    pub tournament_prize: Option<TournamentAward>,
    pub player_quests: Vec<QuestView>,
    pub event_progress: Option<EventView>,
    pub weekly_event: Option<WeeklyEvent>,
    pub gang: Option<GangSummary>,
    pub boss_data: Option<BossView>,
    pub talents: TalentTree,
    pub season_pass: SeasonView,
}

impl Engine {
    /// Insert a new player, crediting the referrer when a valid code is given.
    fn register(&self, telegram_id: i64, username: &str, referral: Option<&str>) -> GameResult<bool> {
        let referrer = match referral.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => {
                let id = parse_referral(code).ok_or(GameError::InvalidReferral)?;
                if id == telegram_id {
                    return Err(GameError::InvalidReferral);
                }
                Some(id)
            }
            None => None,
        };
        let _locks = self.locks.acquire_all(vec![EntityKey::Player(telegram_id)])?;
        if self.store.find_player(telegram_id)?.is_some() {
            return Ok(false);
        }
        let now = self.now();
        let mut player = PlayerRecord::new(telegram_id, username, self.tuning.starting_cash, now);
        let mut batch = WriteBatch::new();
        if let Some(referrer_id) = referrer {
            if self.store.find_player(referrer_id)?.is_none() {
                return Err(GameError::InvalidReferral);
            }
            let bonus = self.tuning.referral_bonus;
            player.cash += bonus;
            player.referred_by = Some(referrer_id);
            let credit = PendingCredit {
                cash: bonus,
                kind: CreditKind::Referral,
                reason: format!("referral of {}", telegram_id),
                created_at: now,
                schema_version: CREDIT_SCHEMA_VERSION,
            };
            batch.put_credit(referrer_id, self.store.next_id()?, &credit)?;
            info!("referral: player {} referred by {}", telegram_id, referrer_id);
        }
        batch.put_player(&player)?;
        self.store.commit(batch)?;
        info!("init: new player {} ({})", telegram_id, escape_log(username));
        Ok(true)
    }

    /// Create or refresh a player and build their bootstrap snapshot.
    ///
    /// A referral code only matters when the player is new; it is ignored for
    /// existing players.
    pub fn init(&self, telegram_id: i64, username: &str, referral: Option<&str>) -> GameResult<Bootstrap> {
        let username = clean_display_name(username);
        let created = if self.store.find_player(telegram_id)?.is_none() {
            self.register(telegram_id, &username, referral)?
        } else {
            false
        };

        let ((raided, prize), player) = self.with_player(telegram_id, |txn, _| {
            if !username.is_empty() && txn.player.username != username {
                txn.player.username = username.clone();
            }
            let prize = self.award_tournament_prize(txn)?;
            Ok((txn.raided, prize))
        })?;

        let rates = self.current_rates(&player)?;
        let today = self.clock.today();
        let tournament_score = self
            .store
            .tournament_entry(today, telegram_id)?
            .map(|e| e.score)
            .unwrap_or(0.0);
        let market_listings = self
            .market()?
            .into_iter()
            .filter(|l| l.seller_id != telegram_id)
            .take(50)
            .collect();
        let (gang, boss_data, territory_bonus) = match player.gang_id {
            Some(gang_id) => match self.store.find_gang(gang_id)? {
                Some(g) => (
                    Some(GangSummary::from(&g)),
                    Some(self.boss(gang_id)?),
                    self.territory_bonus(gang_id)?,
                ),
                None => (None, None, 0.0),
            },
            None => (None, None, 0.0),
        };

        Ok(Bootstrap {
            player: self.view(&player),
            created,
            businesses: player.businesses.clone(),
            character: character(&self.catalog, &player),
            inventory: player.inventory.clone(),
            upgrades: player.upgrades.clone(),
            player_cases: player.cases.clone(),
            income_per_sec: rates.income_per_sec,
            suspicion_per_sec: rates.suspicion_per_sec,
            player_level: player.level(),
            was_raided: raided,
            content: (*self.catalog).clone(),
            market_listings,
            my_listings: self.listings_of(telegram_id)?,
            referral_count: player.referral_count,
            daily_missions: mission_views(&self.catalog, &player),
            login_data: self.login_status(&player),
            achievements: achievement_groups(&self.catalog, &player),
            territories: self.territories()?,
            territory_bonus,
            vip_status: vip_status_of(&player, self.now()),
            ad_boost_until: player.ad_boost_until,
            player_skins: player.skins.clone(),
            equipped_skins: player.equipped_skins.clone(),
            tournament_score,
            tournament_prize: prize,
            player_quests: quest_views(&self.catalog, &player),
            event_progress: self.event_view(&player),
            weekly_event: self.weekly_event(),
            gang,
            boss_data,
            talents: self.talent_tree(&player),
            season_pass: season_view(&self.catalog, &player),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referral_codes_parse() {
        assert_eq!(parse_referral("ref_12345"), Some(12345));
        assert_eq!(parse_referral(" ref_7 "), Some(7));
        assert_eq!(parse_referral("ref_"), None);
        assert_eq!(parse_referral("ref_-3"), None);
        assert_eq!(parse_referral("abc123"), None);
    }
}
