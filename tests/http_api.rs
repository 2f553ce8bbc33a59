mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{json, Value};
use tower::ServiceExt;

use shadow_empire::api::{self, AppState};
use shadow_empire::auth::{data_check_string, InitDataVerifier};
use shadow_empire::config::Config;

use common::{game, TestGame};

const BOT_ID: i64 = 8_123_456;
const SECRET: &str = "bot-secret";
const ADMIN: &str = "ops-secret";

fn app(g: &TestGame, verifier: Option<InitDataVerifier>) -> Router {
    let mut config = Config::default();
    config.telegram.webhook_secret = Some(SECRET.to_string());
    config.server.admin_secret = Some(ADMIN.to_string());
    api::router(AppState::with_verifier(g.engine.clone(), config, verifier.map(Arc::new)))
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn signed_init_data(key: &SigningKey, user_id: i64) -> String {
    let mut fields = BTreeMap::new();
    fields.insert("auth_date".to_string(), "1748865600".to_string());
    fields.insert("user".to_string(), format!(r#"{{"id":{},"username":"vito"}}"#, user_id));
    let signature = key.sign(data_check_string(BOT_ID, &fields).as_bytes());
    let mut pairs: Vec<String> = fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect();
    pairs.push(format!("signature={}", URL_SAFE_NO_PAD.encode(signature.to_bytes())));
    pairs.join("&")
}

#[tokio::test]
async fn init_then_collect() {
    let g = game();
    let app = app(&g, None);

    let (status, body) = call(&app, post("/api/init", json!({"telegram_id": 11, "username": "don"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], true);
    assert_eq!(body["player"]["telegram_id"], 11);
    assert_eq!(body["player"]["referral_code"], "ref_11");

    let (status, body) = call(&app, post("/api/collect", json!({"telegram_id": 11}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["player"]["cash"].is_number());

    let (status, body) = call(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["players"], 1);
}

#[tokio::test]
async fn errors_carry_detail_and_status() {
    let g = game();
    let app = app(&g, None);

    let (status, body) = call(&app, post("/api/collect", json!({"telegram_id": 404}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("not found"));

    g.player(12);
    let (status, body) = call(
        &app,
        post("/api/buy", json!({"telegram_id": 12, "business_id": "syndicate"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().starts_with("Requires level"));

    let (status, body) = call(&app, post("/api/collect", json!({"telegram": "x"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn market_listing_visible_and_gone_after_purchase() {
    let g = game();
    let app = app(&g, None);
    g.player(1);
    g.player(2);
    g.engine.shop_buy(1, "hat_cap").unwrap();
    let listing = g.engine.market_sell(1, "hat_cap", 300.0).unwrap().my_listings[0].id;

    let (_, body) = call(&app, get("/api/market")).await;
    assert_eq!(body["listings"][0]["id"], listing);

    let (status, _) = call(
        &app,
        post("/api/market/buy", json!({"telegram_id": 2, "listing_id": listing})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(
        &app,
        post("/api/market/buy", json!({"telegram_id": 2, "listing_id": listing})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "Listing no longer available");
}

#[tokio::test]
async fn stars_confirmation_needs_the_webhook_secret() {
    let g = game();
    let app = app(&g, None);
    g.player(5);
    let payment = g
        .engine
        .create_payment(5, "cash_small", shadow_empire::game::types::PaymentMethod::Stars)
        .unwrap();
    let confirm = json!({"payment_id": payment.id, "charge_id": "tg-charge-9", "total_amount": 10});

    let (status, _) = call(&app, post("/api/stars/confirm", confirm.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(g.engine.payment(&payment.id).unwrap().status, shadow_empire::game::types::PaymentStatus::Pending);

    let authed = |body: Value| {
        Request::post("/api/stars/confirm")
            .header("content-type", "application/json")
            .header("x-webhook-secret", SECRET)
            .body(Body::from(body.to_string()))
            .unwrap()
    };
    let (status, body) = call(&app, authed(confirm.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let (_, body) = call(&app, authed(confirm)).await;
    assert_eq!(body["status"], "already_processed");
}

#[tokio::test]
async fn signed_init_data_must_match_the_player() {
    let g = game();
    let signing = SigningKey::from_bytes(&[9u8; 32]);
    let verifier = InitDataVerifier::with_key(BOT_ID, signing.verifying_key());
    let app = app(&g, Some(verifier));

    let good = signed_init_data(&signing, 21);
    let (status, body) = call(
        &app,
        post("/api/init", json!({"telegram_id": 21, "init_data": good})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // Username falls back to the signed profile.
    assert_eq!(body["player"]["username"], "vito");

    let (status, _) = call(
        &app,
        post("/api/init", json!({"telegram_id": 22, "init_data": good})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(g.engine.store().find_player(22).unwrap().is_none());

    let forged = Request::post("/api/collect")
        .header("content-type", "application/json")
        .header("x-telegram-init-data", signed_init_data(&SigningKey::from_bytes(&[1u8; 32]), 21))
        .body(Body::from(json!({"telegram_id": 21}).to_string()))
        .unwrap();
    let (status, body) = call(&app, forged).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Invalid initData");
}

#[tokio::test]
async fn admin_routes_need_the_admin_secret() {
    let g = game();
    let app = app(&g, None);
    g.player(31);
    g.player(32);
    let cash = g.record(31).cash;

    let (status, _) = call(
        &app,
        post("/api/admin/cash", json!({"secret": SECRET, "telegram_id": 31, "amount": 500})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, post("/api/admin/players", json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(g.record(31).cash, cash);

    let (status, body) = call(
        &app,
        post("/api/admin/cash", json!({"secret": ADMIN, "telegram_id": 31, "amount": 500})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cash"], cash + 500.0);

    let (_, body) = call(&app, post("/api/admin/players", json!({"secret": ADMIN}))).await;
    assert_eq!(body["players"].as_array().unwrap().len(), 2);

    let (status, body) = call(
        &app,
        post("/api/admin/reset", json!({"secret": ADMIN, "telegram_id": 31})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], true);
    assert!(g.engine.store().find_player(31).unwrap().is_none());
    let (status, _) = call(&app, post("/api/collect", json!({"telegram_id": 31}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
