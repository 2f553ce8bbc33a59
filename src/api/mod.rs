//! # HTTP API
//!
//! JSON routes under `/api` for the Mini App client and the payment bot.
//! Player actions are POSTs carrying `telegram_id`; reads are GETs. Errors
//! come back as `{"detail": "..."}` with a non-2xx status.
//!
//! When a request carries signed Telegram launch data (the `init_data` field
//! on `/api/init`, or the `X-Telegram-Init-Data` header on any action) the
//! signature is checked and the signed user must match `telegram_id`.

pub mod error;
pub mod handlers;
pub mod payments;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::{header::CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use log::{debug, info, warn};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

pub use error::{ApiError, ApiResult};

use crate::auth::{InitDataVerifier, TelegramUser};
use crate::config::Config;
use crate::game::Engine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub config: Arc<Config>,
    verifier: Option<Arc<InitDataVerifier>>,
    #[cfg(feature = "payments")]
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, config: Config) -> Result<Self> {
        let verifier = match config.telegram.bot_id {
            0 => None,
            bot_id => Some(Arc::new(
                InitDataVerifier::telegram(bot_id).context("Failed to load Telegram public key")?,
            )),
        };
        Ok(Self::with_verifier(engine, config, verifier))
    }

    /// State with an explicit verifier; tests use their own signing key.
    pub fn with_verifier(engine: Arc<Engine>, config: Config, verifier: Option<Arc<InitDataVerifier>>) -> Self {
        Self {
            engine,
            config: Arc::new(config),
            verifier,
            #[cfg(feature = "payments")]
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Check signed launch data, if any, against `telegram_id`.
    ///
    /// `body_init_data` takes precedence over the header. Returns the signed
    /// user when a signature was checked.
    pub fn authorize(
        &self,
        headers: &HeaderMap,
        telegram_id: i64,
        body_init_data: Option<&str>,
    ) -> ApiResult<Option<TelegramUser>> {
        let init_data = body_init_data
            .filter(|d| !d.trim().is_empty())
            .or_else(|| {
                headers
                    .get(handlers::INIT_DATA_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .filter(|d| !d.trim().is_empty())
            });
        let Some(init_data) = init_data else {
            if self.config.telegram.require_init_data {
                warn!(target: "security", "request for {} without initData", telegram_id);
                return Err(ApiError::Forbidden("initData required".into()));
            }
            return Ok(None);
        };
        let Some(verifier) = &self.verifier else {
            debug!("initData present but no bot_id configured; not checked");
            return Ok(None);
        };
        match verifier.verify(init_data) {
            Ok(user) if user.id == telegram_id => Ok(Some(user)),
            Ok(user) => {
                warn!(
                    target: "security",
                    "initData user {} does not match telegram_id {}",
                    user.id, telegram_id
                );
                Err(ApiError::Forbidden("Invalid initData".into()))
            }
            Err(e) => {
                warn!(target: "security", "initData rejected for {}: {}", telegram_id, e);
                Err(ApiError::Forbidden("Invalid initData".into()))
            }
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(handlers::INIT_DATA_HEADER),
            HeaderName::from_static(handlers::WEBHOOK_SECRET_HEADER),
        ]);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("ignoring invalid CORS origin {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

pub fn routes() -> Router<AppState> {
    use handlers::*;
    Router::new()
        // Player and ledger
        .route("/init", post(init))
        .route("/collect", post(collect))
        .route("/buy", post(buy_business))
        .route("/manager", post(buy_manager))
        .route("/robbery", post(robbery))
        .route("/casino", post(casino))
        .route("/upgrade", post(upgrade))
        // Inventory and cases
        .route("/shop/buy", post(shop_buy))
        .route("/shop/equip", post(shop_equip))
        .route("/shop/unequip", post(shop_unequip))
        .route("/case/buy", post(case_buy))
        .route("/case/open", post(case_open))
        .route("/case/spin", post(case_spin))
        .route("/character/{telegram_id}", get(character))
        // Market
        .route("/market", get(market))
        .route("/market/sell", post(market_sell))
        .route("/market/buy", post(market_buy))
        .route("/market/cancel", post(market_cancel))
        // Gangs
        .route("/gangs", get(gangs))
        .route("/gang/{gang_id}", get(gang))
        .route("/gang/create", post(gang_create))
        .route("/gang/join", post(gang_join))
        .route("/gang/leave", post(gang_leave))
        .route("/gang/kick", post(gang_kick))
        .route("/gang/promote", post(gang_promote))
        .route("/gang/deposit", post(gang_deposit))
        .route("/gang/withdraw", post(gang_withdraw))
        .route("/gang/upgrade", post(gang_upgrade))
        .route("/gang/heist/start", post(heist_start))
        .route("/gang/heist/join", post(heist_join))
        .route("/gang/heist/execute", post(heist_execute))
        .route("/gang/heists/{gang_id}", get(gang_heists))
        .route("/gang/war/declare", post(war_declare))
        .route("/gang/war/{gang_id}", get(gang_war))
        // Combat
        .route("/pvp/attack", post(pvp_attack))
        .route("/pvp/targets/{telegram_id}", get(pvp_targets))
        .route("/territories", get(territories))
        .route("/territory/attack", post(territory_attack))
        .route("/boss/attack", post(boss_attack))
        .route("/boss/{gang_id}", get(boss))
        // Progression
        .route("/mission/claim", post(mission_claim))
        .route("/login/claim", post(login_claim))
        .route("/achievement/claim", post(achievement_claim))
        .route("/achievements/{telegram_id}", get(achievements))
        .route("/quests/{telegram_id}", get(quests))
        .route("/prestige", post(prestige))
        .route("/talent/assign", post(talent_assign))
        .route("/season/claim", post(season_claim))
        .route("/event/claim", post(event_claim))
        .route("/leaderboard", get(leaderboard))
        .route("/tournament/leaderboard", get(tournament))
        // Monetization
        .route("/ad/reward", post(ad_reward))
        .route("/vip/daily-case", post(vip_daily_case))
        .route("/vip/claim-item", post(vip_claim_item))
        .route("/vip/status/{telegram_id}", get(vip_status))
        .route("/skin/open", post(skin_open))
        .route("/skin/equip", post(skin_equip))
        .route("/skins/config", get(skins_config))
        .route("/stars/invoice", post(stars_invoice))
        .route("/stars/confirm", post(stars_confirm))
        .route("/ton/create", post(ton_create))
        .route("/ton/verify", post(ton_verify))
        .route("/admin/cash", post(admin_cash))
        .route("/admin/players", post(admin_players))
        .route("/admin/reset", post(admin_reset))
        .route("/health", get(health))
}

/// The complete application: routes nested under `/api` with CORS.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.allowed_origins);
    Router::new()
        .nest("/api", routes())
        .with_state(state)
        .layer(cors)
}

/// Serve until `shutdown` resolves.
pub async fn serve(state: AppState, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let addr = state.config.bind_addr()?;
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP API listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;
    Ok(())
}
