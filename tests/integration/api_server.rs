//! Integration tests for the HTTP surface
//!
//! Health, metrics, and the Telegram webhook feeding the command loop.


use axum_test::TestServer;
use screener_bot::core::http::{create_router, AppState};
use screener_bot::metrics::Metrics;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use test_utils::TestApp;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn root_reports_online() {
    let app = TestApp::new().await;
    let response = app.server.get("/").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "Bot is online.");
}

#[tokio::test]
async fn health_endpoint_reports_healthy_status() {
    let app = TestApp::new().await;
    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_seconds"].as_u64().is_some());
    assert_eq!(body["service"], "indicator-screener-bot");
}

#[tokio::test]
async fn health_degrades_when_the_command_loop_is_gone() {
    let metrics = Arc::new(Metrics::new().expect("metrics initialization"));
    let (commands, receiver) = mpsc::channel(1);
    drop(receiver);
    let server = TestServer::new(create_router(AppState::new(metrics, commands)))
        .expect("start test server");

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), 503);
    let body: Value = response.json();
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_metrics() {
    let app = TestApp::new().await;
    app.server.get("/health").await;

    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    for name in [
        "http_requests_total",
        "http_request_duration_seconds",
        "cache_hits_total",
        "screeners_running",
        "notifications_sent_total",
    ] {
        assert!(body.contains(name), "Expected {} metric", name);
    }
}

#[tokio::test]
async fn webhook_acknowledges_garbage() {
    let app = TestApp::new().await;
    let response = app.server.post("/webhook").text("not json").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "OK");

    let response = app
        .server
        .post("/webhook")
        .json(&json!({"update_id": 1, "channel_post": {}}))
        .await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn webhook_command_is_answered_through_telegram() {
    let app = TestApp::new().await;
    let response = app
        .server
        .post("/webhook")
        .json(&TestApp::update(100, 555, "/rules RSI>60, EMA50 > 5000"))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "OK");

    let texts = app.sent_texts(1, WAIT).await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("Rules set"));
    assert!(texts[0].contains("EMA50 > 5000"));
}

#[tokio::test]
async fn redelivered_update_is_ignored() {
    let app = TestApp::new().await;
    for _ in 0..3 {
        app.server
            .post("/webhook")
            .json(&TestApp::update(7, 555, "/help"))
            .await;
    }
    app.server
        .post("/webhook")
        .json(&TestApp::update(8, 555, "/status"))
        .await;

    let texts = app.sent_texts(2, WAIT).await;
    assert_eq!(texts.len(), 2);
    assert!(texts[0].starts_with("Indicator screener commands"));
    assert!(texts[1].starts_with("State: idle"));
}

#[tokio::test]
async fn query_fetches_from_the_indicator_api() {
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/indicators"))
        .and(query_param("symbol", "BINANCE:ETHUSDT"))
        .and(query_param("interval", "1h"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "indicators": {"RSI": 48.25},
            "summary": "NEUTRAL"
        })))
        .expect(1)
        .mount(&app.indicators)
        .await;

    app.server
        .post("/webhook")
        .json(&TestApp::update(1, 555, "/query binance:ethusdt"))
        .await;

    let texts = app.sent_texts(1, WAIT).await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("BINANCE:ETHUSDT [1h]"));
    assert!(texts[0].contains("RSI = 48.25"));
    assert!(texts[0].contains("Summary: NEUTRAL"));
}

#[tokio::test]
async fn started_screener_notifies_on_match() {
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/indicators"))
        .and(query_param("symbol", "BINANCE:BTCUSDT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "indicators": {"RSI": 72.0},
            "summary": "BUY"
        })))
        .mount(&app.indicators)
        .await;

    app.server
        .post("/webhook")
        .json(&TestApp::update(1, 555, "/rules RSI > 70"))
        .await;
    app.server
        .post("/webhook")
        .json(&TestApp::update(2, 555, "/start"))
        .await;

    let texts = app.sent_texts(3, WAIT).await;
    assert!(texts.iter().any(|t| t.contains("Screener started")));
    assert!(texts
        .iter()
        .any(|t| t.contains("BINANCE:BTCUSDT now matches") && t.contains("RSI = 72.00")));

    app.runtime.shutdown().await;
}
