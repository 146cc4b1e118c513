//! `/token`, `/api/auth`, static assets and request validation.

mod common;

use std::time::Duration;

use bodyworn_device::mock::TokenReply;
use bodyworn_gateway::{TokenMode, TokenResponse};
use bodyworn_protocol::NormalizedEvent;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use reqwest::StatusCode;

use common::{APP_JS, Gateway, INDEX_HTML};

async fn get_token(gw: &Gateway) -> TokenResponse {
    let resp = reqwest::get(gw.url("/token")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    serde_json::from_str(&resp.text().await.unwrap()).unwrap()
}

#[tokio::test]
async fn token_unavailable_before_first_refresh() {
    let gw = Gateway::start(TokenMode::Cached).await;

    let resp = reqwest::get(gw.url("/token")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        resp.text().await.unwrap().trim(),
        "Token not initialized yet. Please wait for background refresh."
    );
}

#[tokio::test]
async fn token_reports_cached_value() {
    let gw = Gateway::start(TokenMode::Cached).await;
    gw.device
        .push_token(TokenReply::token("T1", "2099-01-01T00:00:00Z"));
    gw.state.tokens().refresh_once().await.unwrap();

    let body = get_token(&gw).await;
    assert_eq!(body.token, "T1");
    assert_eq!(body.target_id, "cfg-target");
    assert_eq!(body.expires_at, "2099-01-01T00:00:00Z");
    assert!(DateTime::parse_from_rfc3339(&body.refreshed).is_ok());

    // Served from cache: no extra device call.
    get_token(&gw).await;
    assert_eq!(gw.device.token_requests(), 1);
}

#[tokio::test]
async fn refreshed_token_replaces_previous() {
    let gw = Gateway::start(TokenMode::Cached).await;
    let expiry = (Utc::now() + TimeDelta::seconds(60)).to_rfc3339_opts(SecondsFormat::Secs, true);
    gw.device.push_token(TokenReply::token("T1", &expiry));
    gw.device.push_token(TokenReply::token("T2", &expiry));

    let delay = gw.state.tokens().refresh_once().await.unwrap();
    assert!(delay <= Duration::from_secs(50) && delay >= Duration::from_secs(48));
    assert_eq!(get_token(&gw).await.token, "T1");

    gw.state.tokens().refresh_once().await.unwrap();
    assert_eq!(get_token(&gw).await.token, "T2");
}

#[tokio::test]
async fn failed_refresh_keeps_serving_old_token() {
    let gw = Gateway::start(TokenMode::Cached).await;
    gw.device
        .push_token(TokenReply::token("T1", "2099-01-01T00:00:00Z"));
    gw.device.push_token(TokenReply::status(500, "busy"));
    gw.state.tokens().refresh_once().await.unwrap();
    let before = get_token(&gw).await;

    assert!(gw.state.tokens().refresh_once().await.is_err());
    assert_eq!(get_token(&gw).await, before);
}

#[tokio::test]
async fn target_id_follows_events() {
    let gw = Gateway::start(TokenMode::Cached).await;
    gw.device
        .push_token(TokenReply::token("T1", "2099-01-01T00:00:00Z"));
    gw.state.tokens().refresh_once().await.unwrap();

    let event = NormalizedEvent {
        subject: "bwc-9".into(),
        ..NormalizedEvent::default()
    };
    gw.state.publish(&event).unwrap();
    assert_eq!(get_token(&gw).await.target_id, "bwc-9");

    // An event without a subject leaves the target alone.
    gw.state.publish(&NormalizedEvent::default()).unwrap();
    assert_eq!(get_token(&gw).await.target_id, "bwc-9");
}

#[tokio::test]
async fn per_request_mode_fetches_every_call() {
    let gw = Gateway::start(TokenMode::PerRequest).await;
    gw.device.push_token(TokenReply::token("P1", ""));
    gw.device.push_token(TokenReply::token("P2", ""));

    assert_eq!(get_token(&gw).await.token, "P1");
    assert_eq!(get_token(&gw).await.token, "P2");
    assert_eq!(gw.device.token_requests(), 2);
    assert!(gw.state.tokens().snapshot().is_none());
}

#[tokio::test]
async fn per_request_mode_reports_device_failure() {
    let gw = Gateway::start(TokenMode::PerRequest).await;
    gw.device.push_token(TokenReply::status(500, "busy"));

    let resp = reqwest::get(gw.url("/token")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn auth_returns_device_config() {
    let gw = Gateway::start(TokenMode::Cached).await;

    let text = reqwest::get(gw.url("/api/auth"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["ip_address"], gw.device.addr().to_string());
    assert_eq!(body["username"], "root");
    assert_eq!(body["password"], "pass");
    assert_eq!(body["target_id"], "cfg-target");
}

#[tokio::test]
async fn serves_static_assets() {
    let gw = Gateway::start(TokenMode::Cached).await;

    let index = reqwest::get(gw.url("/")).await.unwrap();
    assert_eq!(index.status(), StatusCode::OK);
    assert_eq!(index.text().await.unwrap(), INDEX_HTML);

    let js = reqwest::get(gw.url("/static/app.js")).await.unwrap();
    assert_eq!(js.status(), StatusCode::OK);
    assert_eq!(js.text().await.unwrap(), APP_JS);

    let missing = reqwest::get(gw.url("/static/nope.css")).await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn proxy_requires_token() {
    let gw = Gateway::start(TokenMode::Cached).await;

    for path in ["/ws-proxy", "/ws-proxy?token="] {
        let resp = reqwest::get(gw.url(path)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.text().await.unwrap(), "Missing token");
    }
}
