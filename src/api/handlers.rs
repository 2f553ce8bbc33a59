//! Route handlers.
//!
//! Engine calls are synchronous and may wait on entity locks, so each one
//! runs on the blocking pool. Handlers only decode the request, authorize
//! the caller and shape the reply.

use std::collections::BTreeMap;

use axum::{
    extract::{FromRequest, Path, Query, Request, State},
    http::HeaderMap,
    Json,
};
use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::game::achievements::AchievementClaimOutcome;
use crate::game::admin::{AdminCash, AdminPlayer};
use crate::game::boss::{BossAttackOutcome, BossView};
use crate::game::cases::{CaseBuyOutcome, CaseOpenOutcome};
use crate::game::casino::CasinoOutcome;
use crate::game::catalog::{CasinoGame, Slot};
use crate::game::engine::CollectOutcome;
use crate::game::events::{EventClaimOutcome, TournamentBoard};
use crate::game::gang::{GangDetail, GangOutcome, GangSummary, GangUpgradeOutcome};
use crate::game::heist::{HeistExecution, HeistOutcome};
use crate::game::inventory::InventoryOutcome;
use crate::game::ledger::{BusinessOutcome, UpgradeOutcome};
use crate::game::market::{MarketOutcome, PurchaseOutcome};
use crate::game::missions::{LoginClaimOutcome, MissionClaimOutcome};
use crate::game::monetization::{AdRewardOutcome, AdRewardType, VipCaseOutcome, VipItemOutcome, VipStatus};
use crate::game::payments::Settlement;
use crate::game::prestige::{PrestigeOutcome, TalentOutcome};
use crate::game::pvp::PvpOutcome;
use crate::game::robbery::RobberyOutcome;
use crate::game::season::{SeasonClaimOutcome, SeasonTrack};
use crate::game::skins::{SkinCaseKind, SkinOpenOutcome, SkinsConfig};
use crate::game::snapshot::Bootstrap;
use crate::game::territory::TerritoryAttackOutcome;
use crate::game::types::{GangRole, PaymentMethod};
use crate::game::war::{WarOverview, WarView};
use crate::game::{Engine, GameResult};
use crate::logutil::escape_log;

/// Header carrying the Mini App's signed launch parameters.
pub const INIT_DATA_HEADER: &str = "x-telegram-init-data";
/// Header the bot uses to prove it is the one confirming Stars charges.
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// `Json` whose rejections use the `{"detail"}` error body.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = axum::extract::rejection::JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(ApiJson(value))
    }
}

async fn blocking<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Engine) -> GameResult<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || f(&engine))
        .await
        .map_err(|e| ApiError::Internal(format!("engine task failed: {}", e)))?;
    Ok(result?)
}

/// Authorize `telegram_id` and run one engine action for them.
async fn act<T, F>(state: &AppState, headers: &HeaderMap, telegram_id: i64, f: F) -> ApiResult<Json<T>>
where
    F: FnOnce(&Engine) -> GameResult<T> + Send + 'static,
    T: Send + 'static,
{
    state.authorize(headers, telegram_id, None)?;
    blocking(state, f).await.map(Json)
}

/// Ids arrive as numbers from some clients and strings from others.
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

// ── Requests ──

#[derive(Debug, Deserialize)]
pub struct InitRequest {
    pub telegram_id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub referral_code: String,
    #[serde(default)]
    pub init_data: String,
}

#[derive(Debug, Deserialize)]
pub struct PlayerRequest {
    pub telegram_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct BusinessRequest {
    pub telegram_id: i64,
    pub business_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RobberyRequest {
    pub telegram_id: i64,
    pub robbery_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CasinoRequest {
    pub telegram_id: i64,
    pub game: CasinoGame,
    pub bet: f64,
    #[serde(default)]
    pub choice: String,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeRequest {
    pub telegram_id: i64,
    pub upgrade_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    pub telegram_id: i64,
    pub item_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SlotRequest {
    pub telegram_id: i64,
    pub slot: Slot,
}

#[derive(Debug, Deserialize)]
pub struct CaseRequest {
    pub telegram_id: i64,
    pub case_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CaseOpenRequest {
    pub telegram_id: i64,
    pub player_case_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct SellRequest {
    pub telegram_id: i64,
    pub item_id: String,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct ListingRequest {
    pub telegram_id: i64,
    pub listing_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct GangCreateRequest {
    pub telegram_id: i64,
    pub name: String,
    pub tag: String,
}

#[derive(Debug, Deserialize)]
pub struct GangJoinRequest {
    pub telegram_id: i64,
    pub gang_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct MemberRequest {
    pub telegram_id: i64,
    pub target_id: i64,
}

fn officer() -> GangRole {
    GangRole::Officer
}

#[derive(Debug, Deserialize)]
pub struct PromoteRequest {
    pub telegram_id: i64,
    pub target_id: i64,
    #[serde(default = "officer")]
    pub role: GangRole,
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub telegram_id: i64,
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct HeistStartRequest {
    pub telegram_id: i64,
    pub heist_type: String,
}

#[derive(Debug, Deserialize)]
pub struct HeistRequest {
    pub telegram_id: i64,
    pub heist_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct WarDeclareRequest {
    pub telegram_id: i64,
    pub target_gang_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct TargetRequest {
    pub telegram_id: i64,
    pub target_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TerritoryRequest {
    pub telegram_id: i64,
    pub territory_id: u32,
}

#[derive(Debug, Deserialize)]
pub struct GangRequest {
    pub telegram_id: i64,
    pub gang_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct MissionRequest {
    pub telegram_id: i64,
    #[serde(deserialize_with = "id_string")]
    pub mission_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AchievementRequest {
    pub telegram_id: i64,
    pub achievement_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TalentRequest {
    pub telegram_id: i64,
    pub talent_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SeasonRequest {
    pub telegram_id: i64,
    pub level: u32,
    pub track: SeasonTrack,
}

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub telegram_id: i64,
    pub milestone_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct AdRequest {
    pub telegram_id: i64,
    pub reward_type: AdRewardType,
}

#[derive(Debug, Deserialize)]
pub struct SkinOpenRequest {
    pub telegram_id: i64,
    #[serde(default)]
    pub case_type: SkinCaseKind,
    #[serde(default = "one")]
    pub count: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SkinEquipRequest {
    pub telegram_id: i64,
    pub business_id: String,
    pub skin_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PackageRequest {
    pub telegram_id: i64,
    pub package_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StarsConfirmRequest {
    pub payment_id: String,
    pub charge_id: String,
    pub total_amount: u32,
}

#[derive(Debug, Deserialize)]
pub struct TonVerifyRequest {
    pub telegram_id: i64,
    pub payment_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TournamentQuery {
    pub telegram_id: Option<i64>,
}

// ── Replies that are not engine types ──

#[derive(Debug, Serialize)]
pub struct StarsInvoice {
    pub payment_id: String,
    pub package_id: String,
    pub stars: u32,
    /// Absent when no bot token is configured; the bot then issues the invoice itself.
    pub invoice_link: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TonInvoice {
    pub payment_id: String,
    pub package_id: String,
    pub wallet: String,
    pub amount_ton: f64,
    pub amount_nano: u64,
    pub comment: String,
}

#[derive(Debug, Serialize)]
pub struct SkinEquipReply {
    pub equipped_skins: BTreeMap<String, String>,
}

// ── Player bootstrap and ledger ──

pub async fn init(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<InitRequest>) -> ApiResult<Json<Bootstrap>> {
    let signed_user = state.authorize(&headers, req.telegram_id, Some(&req.init_data))?;
    let username = match signed_user.and_then(|u| u.username) {
        Some(name) if req.username.trim().is_empty() => name,
        _ => req.username,
    };
    let referral = Some(req.referral_code).filter(|c| !c.trim().is_empty());
    blocking(&state, move |engine| engine.init(req.telegram_id, &username, referral.as_deref()))
        .await
        .map(Json)
}

pub async fn collect(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<PlayerRequest>) -> ApiResult<Json<CollectOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.collect(req.telegram_id)).await
}

pub async fn buy_business(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<BusinessRequest>) -> ApiResult<Json<BusinessOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.buy_business(req.telegram_id, &req.business_id)).await
}

pub async fn buy_manager(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<BusinessRequest>) -> ApiResult<Json<BusinessOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.buy_manager(req.telegram_id, &req.business_id)).await
}

pub async fn robbery(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<RobberyRequest>) -> ApiResult<Json<RobberyOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.robbery(req.telegram_id, &req.robbery_id)).await
}

pub async fn casino(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<CasinoRequest>) -> ApiResult<Json<CasinoOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| {
        e.casino(req.telegram_id, req.game, req.bet, &req.choice)
    })
    .await
}

pub async fn upgrade(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<UpgradeRequest>) -> ApiResult<Json<UpgradeOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.buy_upgrade(req.telegram_id, &req.upgrade_id)).await
}

// ── Inventory and cases ──

pub async fn shop_buy(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<ItemRequest>) -> ApiResult<Json<InventoryOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.shop_buy(req.telegram_id, &req.item_id)).await
}

pub async fn shop_equip(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<ItemRequest>) -> ApiResult<Json<InventoryOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.equip(req.telegram_id, &req.item_id)).await
}

pub async fn shop_unequip(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<SlotRequest>) -> ApiResult<Json<InventoryOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.unequip(req.telegram_id, req.slot)).await
}

pub async fn case_buy(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<CaseRequest>) -> ApiResult<Json<CaseBuyOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.buy_case(req.telegram_id, &req.case_id)).await
}

pub async fn case_open(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<CaseOpenRequest>) -> ApiResult<Json<CaseOpenOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.open_case(req.telegram_id, req.player_case_id)).await
}

pub async fn case_spin(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<CaseRequest>) -> ApiResult<Json<CaseOpenOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.spin_case(req.telegram_id, &req.case_id)).await
}

// ── Market ──

pub async fn market_sell(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<SellRequest>) -> ApiResult<Json<MarketOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.market_sell(req.telegram_id, &req.item_id, req.price)).await
}

pub async fn market_buy(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<ListingRequest>) -> ApiResult<Json<PurchaseOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.market_buy(req.telegram_id, req.listing_id)).await
}

pub async fn market_cancel(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<ListingRequest>) -> ApiResult<Json<MarketOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.market_cancel(req.telegram_id, req.listing_id)).await
}

pub async fn market(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let listings = blocking(&state, |e| e.market()).await?;
    Ok(Json(json!({ "listings": listings })))
}

// ── Gangs ──

pub async fn gang_create(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<GangCreateRequest>) -> ApiResult<Json<GangOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.create_gang(req.telegram_id, &req.name, &req.tag)).await
}

pub async fn gang_join(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<GangJoinRequest>) -> ApiResult<Json<GangOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.join_gang(req.telegram_id, req.gang_id)).await
}

pub async fn gang_leave(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<PlayerRequest>) -> ApiResult<Json<GangOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.leave_gang(req.telegram_id)).await
}

pub async fn gang_kick(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<MemberRequest>) -> ApiResult<Json<GangOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.kick_member(req.telegram_id, req.target_id)).await
}

pub async fn gang_promote(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<PromoteRequest>) -> ApiResult<Json<GangSummary>> {
    act(&state, &headers, req.telegram_id, move |e| {
        e.set_member_role(req.telegram_id, req.target_id, req.role)
    })
    .await
}

pub async fn gang_deposit(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<AmountRequest>) -> ApiResult<Json<GangOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.gang_deposit(req.telegram_id, req.amount)).await
}

pub async fn gang_withdraw(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<AmountRequest>) -> ApiResult<Json<GangOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.gang_withdraw(req.telegram_id, req.amount)).await
}

pub async fn gang_upgrade(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<UpgradeRequest>) -> ApiResult<Json<GangUpgradeOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.gang_upgrade(req.telegram_id, &req.upgrade_id)).await
}

pub async fn heist_start(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<HeistStartRequest>) -> ApiResult<Json<HeistOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.start_heist(req.telegram_id, &req.heist_type)).await
}

pub async fn heist_join(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<HeistRequest>) -> ApiResult<Json<HeistOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.join_heist(req.telegram_id, req.heist_id)).await
}

pub async fn heist_execute(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<HeistRequest>) -> ApiResult<Json<HeistExecution>> {
    act(&state, &headers, req.telegram_id, move |e| e.execute_heist(req.telegram_id, req.heist_id)).await
}

pub async fn war_declare(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<WarDeclareRequest>) -> ApiResult<Json<WarView>> {
    act(&state, &headers, req.telegram_id, move |e| e.declare_war(req.telegram_id, req.target_gang_id)).await
}

pub async fn gangs(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let gangs = blocking(&state, |e| e.list_gangs()).await?;
    Ok(Json(json!({ "gangs": gangs })))
}

pub async fn gang(State(state): State<AppState>, Path(gang_id): Path<u64>) -> ApiResult<Json<GangDetail>> {
    blocking(&state, move |e| e.gang_detail(gang_id)).await.map(Json)
}

pub async fn gang_heists(State(state): State<AppState>, Path(gang_id): Path<u64>) -> ApiResult<Json<Value>> {
    let heists = blocking(&state, move |e| e.heists(gang_id)).await?;
    Ok(Json(json!({ "heists": heists })))
}

pub async fn gang_war(State(state): State<AppState>, Path(gang_id): Path<u64>) -> ApiResult<Json<WarOverview>> {
    blocking(&state, move |e| e.war_status(gang_id)).await.map(Json)
}

// ── Combat ──

pub async fn pvp_attack(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<TargetRequest>) -> ApiResult<Json<PvpOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.pvp_attack(req.telegram_id, req.target_id)).await
}

pub async fn pvp_targets(State(state): State<AppState>, Path(telegram_id): Path<i64>) -> ApiResult<Json<Value>> {
    let targets = blocking(&state, move |e| e.pvp_targets(telegram_id)).await?;
    Ok(Json(json!({ "targets": targets })))
}

pub async fn territory_attack(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<TerritoryRequest>) -> ApiResult<Json<TerritoryAttackOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.attack_territory(req.telegram_id, req.territory_id)).await
}

pub async fn territories(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let territories = blocking(&state, |e| e.territories()).await?;
    Ok(Json(json!({ "territories": territories })))
}

pub async fn boss_attack(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<GangRequest>) -> ApiResult<Json<BossAttackOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.attack_boss(req.telegram_id, req.gang_id)).await
}

pub async fn boss(State(state): State<AppState>, Path(gang_id): Path<u64>) -> ApiResult<Json<Value>> {
    let boss: BossView = blocking(&state, move |e| e.boss(gang_id)).await?;
    Ok(Json(json!({ "boss_data": boss })))
}

// ── Progression ──

pub async fn mission_claim(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<MissionRequest>) -> ApiResult<Json<MissionClaimOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.claim_mission(req.telegram_id, &req.mission_id)).await
}

pub async fn login_claim(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<PlayerRequest>) -> ApiResult<Json<LoginClaimOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.claim_login(req.telegram_id)).await
}

pub async fn achievement_claim(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<AchievementRequest>) -> ApiResult<Json<AchievementClaimOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| {
        e.claim_achievement(req.telegram_id, &req.achievement_id)
    })
    .await
}

pub async fn achievements(State(state): State<AppState>, Path(telegram_id): Path<i64>) -> ApiResult<Json<Value>> {
    let groups = blocking(&state, move |e| e.achievements(telegram_id)).await?;
    Ok(Json(json!({ "achievements": groups })))
}

pub async fn quests(State(state): State<AppState>, Path(telegram_id): Path<i64>) -> ApiResult<Json<Value>> {
    let quests = blocking(&state, move |e| e.quests(telegram_id)).await?;
    Ok(Json(json!({ "quests": quests })))
}

pub async fn prestige(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<PlayerRequest>) -> ApiResult<Json<PrestigeOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.prestige(req.telegram_id)).await
}

pub async fn talent_assign(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<TalentRequest>) -> ApiResult<Json<TalentOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.assign_talent(req.telegram_id, &req.talent_id)).await
}

pub async fn season_claim(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<SeasonRequest>) -> ApiResult<Json<SeasonClaimOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.claim_season(req.telegram_id, req.level, req.track)).await
}

pub async fn event_claim(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<EventRequest>) -> ApiResult<Json<EventClaimOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.claim_event(req.telegram_id, req.milestone_index)).await
}

pub async fn character(State(state): State<AppState>, Path(telegram_id): Path<i64>) -> ApiResult<Json<Value>> {
    let character = blocking(&state, move |e| e.character(telegram_id)).await?;
    Ok(Json(json!({ "character": character })))
}

pub async fn leaderboard(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let players = blocking(&state, |e| e.leaderboard()).await?;
    Ok(Json(json!({ "leaderboard": players })))
}

pub async fn tournament(State(state): State<AppState>, Query(query): Query<TournamentQuery>) -> ApiResult<Json<TournamentBoard>> {
    blocking(&state, move |e| e.tournament(query.telegram_id)).await.map(Json)
}

// ── Monetization ──

pub async fn ad_reward(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<AdRequest>) -> ApiResult<Json<AdRewardOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.ad_reward(req.telegram_id, req.reward_type)).await
}

pub async fn vip_daily_case(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<PlayerRequest>) -> ApiResult<Json<VipCaseOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.vip_daily_case(req.telegram_id)).await
}

pub async fn vip_claim_item(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<ItemRequest>) -> ApiResult<Json<VipItemOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| e.vip_claim_item(req.telegram_id, &req.item_id)).await
}

pub async fn vip_status(State(state): State<AppState>, Path(telegram_id): Path<i64>) -> ApiResult<Json<VipStatus>> {
    blocking(&state, move |e| e.vip_status(telegram_id)).await.map(Json)
}

pub async fn skin_open(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<SkinOpenRequest>) -> ApiResult<Json<SkinOpenOutcome>> {
    act(&state, &headers, req.telegram_id, move |e| {
        e.open_skin_case(req.telegram_id, req.case_type, req.count)
    })
    .await
}

pub async fn skin_equip(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<SkinEquipRequest>) -> ApiResult<Json<SkinEquipReply>> {
    let equipped_skins = act(&state, &headers, req.telegram_id, move |e| {
        e.equip_skin(req.telegram_id, &req.business_id, &req.skin_id)
    })
    .await?
    .0;
    Ok(Json(SkinEquipReply { equipped_skins }))
}

pub async fn skins_config(State(state): State<AppState>) -> Json<SkinsConfig> {
    Json(state.engine.skins_config())
}

pub async fn stars_invoice(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<PackageRequest>) -> ApiResult<Json<StarsInvoice>> {
    let (payment, package) = act(&state, &headers, req.telegram_id, move |e| {
        let payment = e.create_payment(req.telegram_id, &req.package_id, PaymentMethod::Stars)?;
        let package = e.catalog().package(&payment.package_id)?.clone();
        Ok((payment, package))
    })
    .await?
    .0;

    let invoice_link = match &state.config.telegram.bot_token {
        #[cfg(feature = "payments")]
        Some(token) => Some(
            super::payments::create_invoice_link(&state.http, token, &payment, &package)
                .await
                .map_err(|e| ApiError::Upstream(e.to_string()))?,
        ),
        _ => None,
    };
    Ok(Json(StarsInvoice {
        payment_id: payment.id,
        package_id: package.id,
        stars: package.stars,
        invoice_link,
    }))
}

/// Called by the bot after `successful_payment`; not by players.
pub async fn stars_confirm(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<StarsConfirmRequest>) -> ApiResult<Json<Settlement>> {
    let presented = headers.get(WEBHOOK_SECRET_HEADER).and_then(|v| v.to_str().ok());
    match (&state.config.telegram.webhook_secret, presented) {
        (Some(expected), Some(given)) if expected == given => {}
        (None, _) => {
            warn!(target: "security", "stars confirm rejected: no webhook secret configured");
            return Err(ApiError::Forbidden("Stars confirmation disabled".into()));
        }
        _ => {
            warn!(
                target: "security",
                "stars confirm rejected: bad webhook secret for payment {}",
                escape_log(&req.payment_id)
            );
            return Err(ApiError::Forbidden("Forbidden".into()));
        }
    }
    blocking(&state, move |e| e.confirm_stars(&req.payment_id, &req.charge_id, req.total_amount))
        .await
        .map(Json)
}

pub async fn ton_create(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<PackageRequest>) -> ApiResult<Json<TonInvoice>> {
    let payment = act(&state, &headers, req.telegram_id, move |e| {
        e.create_payment(req.telegram_id, &req.package_id, PaymentMethod::Ton)
    })
    .await?
    .0;
    info!("payments: ton invoice {} for player {}", payment.id, payment.telegram_id);
    Ok(Json(TonInvoice {
        payment_id: payment.id,
        package_id: payment.package_id,
        wallet: state.config.ton.wallet_address.clone(),
        amount_ton: payment.amount,
        amount_nano: payment.amount_nano,
        comment: payment.comment,
    }))
}

pub async fn ton_verify(State(state): State<AppState>, headers: HeaderMap, ApiJson(req): ApiJson<TonVerifyRequest>) -> ApiResult<Json<Settlement>> {
    state.authorize(&headers, req.telegram_id, None)?;
    #[cfg(feature = "payments")]
    {
        let transfers = super::payments::fetch_ton_transfers(&state.http, &state.config.ton)
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;
        let tolerance = state.config.ton.amount_tolerance;
        blocking(&state, move |e| e.confirm_ton(req.telegram_id, &req.payment_id, &transfers, tolerance))
            .await
            .map(Json)
    }
    #[cfg(not(feature = "payments"))]
    {
        let _ = req;
        Err(ApiError::Upstream("TON verification is not available in this build".into()))
    }
}

// ============================================================================
// Admin
// ============================================================================

const ADMIN_PLAYER_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct AdminRequest {
    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminCashRequest {
    #[serde(default)]
    pub secret: String,
    pub telegram_id: i64,
    #[serde(default)]
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct AdminPlayerRequest {
    #[serde(default)]
    pub secret: String,
    pub telegram_id: i64,
}

#[derive(Debug, Serialize)]
pub struct AdminPlayers {
    pub players: Vec<AdminPlayer>,
}

fn check_admin(state: &AppState, presented: &str, action: &str) -> ApiResult<()> {
    match &state.config.server.admin_secret {
        Some(expected) if !expected.is_empty() && expected == presented => Ok(()),
        _ => {
            warn!(target: "security", "admin {} rejected: bad or unconfigured secret", action);
            Err(ApiError::Forbidden("Forbidden".into()))
        }
    }
}

pub async fn admin_cash(State(state): State<AppState>, ApiJson(req): ApiJson<AdminCashRequest>) -> ApiResult<Json<AdminCash>> {
    check_admin(&state, &req.secret, "cash")?;
    blocking(&state, move |e| e.admin_add_cash(req.telegram_id, req.amount))
        .await
        .map(Json)
}

pub async fn admin_players(State(state): State<AppState>, ApiJson(req): ApiJson<AdminRequest>) -> ApiResult<Json<AdminPlayers>> {
    check_admin(&state, &req.secret, "players")?;
    let players = blocking(&state, |e| e.admin_players(ADMIN_PLAYER_LIMIT)).await?;
    Ok(Json(AdminPlayers { players }))
}

pub async fn admin_reset(State(state): State<AppState>, ApiJson(req): ApiJson<AdminPlayerRequest>) -> ApiResult<Json<Value>> {
    check_admin(&state, &req.secret, "reset")?;
    let telegram_id = req.telegram_id;
    let removed = blocking(&state, move |e| e.admin_reset_player(telegram_id)).await?;
    Ok(Json(json!({"status": "ok", "telegram_id": telegram_id, "removed": removed})))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let store = state.engine.store();
    Json(json!({
        "status": "ok",
        "players": store.count_players(),
        "gangs": store.count_gangs(),
    }))
}
