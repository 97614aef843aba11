//! HTTP indicator provider against a mocked upstream

use screener_bot::models::{Instrument, Interval};
use screener_bot::services::indicator_api::HttpIndicatorProvider;
use screener_bot::services::market_data::{FetchError, IndicatorProvider, UniverseProvider};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn btc() -> Instrument {
    "BINANCE:BTCUSDT".parse().unwrap()
}

async fn provider(server: &MockServer) -> HttpIndicatorProvider {
    HttpIndicatorProvider::new(&server.uri(), Duration::from_secs(2)).expect("provider")
}

#[tokio::test]
async fn fetch_decodes_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indicators"))
        .and(query_param("symbol", "BINANCE:BTCUSDT"))
        .and(query_param("interval", "4h"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "indicators": {"rsi": 61.5, "EMA50": 5200.0, "MACD.macd": null},
            "summary": "STRONG_BUY"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = provider(&server)
        .await
        .fetch(&btc(), Interval::FourHours)
        .await
        .expect("snapshot");

    assert_eq!(snapshot.instrument, btc());
    assert_eq!(snapshot.get("RSI"), Some(61.5));
    assert_eq!(snapshot.get("ema50"), Some(5200.0));
    assert_eq!(snapshot.get("MACD.MACD"), None, "null values are dropped");
    assert_eq!(snapshot.summary, "STRONG_BUY");
}

#[tokio::test]
async fn base_path_is_preserved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/indicators"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"indicators": {"RSI": 1.0}})))
        .mount(&server)
        .await;

    let provider = HttpIndicatorProvider::new(&format!("{}/api/v1", server.uri()), Duration::from_secs(2))
        .expect("provider");
    let snapshot = provider.fetch(&btc(), Interval::OneHour).await.expect("snapshot");
    assert_eq!(snapshot.get("RSI"), Some(1.0));
    assert_eq!(snapshot.summary, "");
}

#[tokio::test]
async fn status_codes_are_classified() {
    for status in [429u16, 404, 503] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indicators"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let result = provider(&server).await.fetch(&btc(), Interval::OneHour).await;
        match status {
            429 => assert_eq!(result.unwrap_err(), FetchError::RateLimited),
            404 => assert!(matches!(result, Err(FetchError::NotFound(_)))),
            _ => assert!(matches!(result, Err(FetchError::Unavailable(_)))),
        }
    }
}

#[tokio::test]
async fn malformed_body_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indicators"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = provider(&server).await.fetch(&btc(), Interval::OneHour).await;
    assert!(matches!(result, Err(FetchError::Unavailable(_))));
}

#[tokio::test]
async fn slow_upstream_times_out_as_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indicators"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"indicators": {}}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let provider = HttpIndicatorProvider::new(&server.uri(), Duration::from_millis(200)).expect("provider");
    let result = provider.fetch(&btc(), Interval::OneHour).await;
    assert!(matches!(result, Err(FetchError::Unavailable(_))));
}

#[tokio::test]
async fn universe_skips_bad_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/universe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            "BINANCE:BTCUSDT",
            "nasdaq:aapl",
            "no-exchange",
            ""
        ])))
        .mount(&server)
        .await;

    let universe = provider(&server).await.list().await.expect("universe");
    let names: Vec<String> = universe.iter().map(ToString::to_string).collect();
    assert_eq!(names, vec!["BINANCE:BTCUSDT", "NASDAQ:AAPL"]);
}

#[tokio::test]
async fn universe_outage_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/universe"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    tokio_test::assert_err!(provider(&server).await.list().await);
}
