//! Command dispatch and the sequential command loop

use crate::fakes::{FakeProvider, FakeUniverse, RecordingNotifier};
use screener_bot::cache::CacheConfig;
use screener_bot::core::runtime::{RuntimeConfig, ScreenerRuntime};
use screener_bot::core::scheduler::ScreenerConfig;
use screener_bot::metrics::Metrics;
use screener_bot::models::{Interval, SubscriberId};
use screener_bot::services::market_data::FetchError;
use screener_bot::services::telegram::Update;
use std::sync::Arc;
use std::time::Duration;

const ALICE: SubscriberId = SubscriberId(7);

struct TestRuntime {
    runtime: ScreenerRuntime,
    provider: Arc<FakeProvider>,
    notifier: Arc<RecordingNotifier>,
}

fn runtime() -> TestRuntime {
    let provider = FakeProvider::new();
    let universe = FakeUniverse::new(&["BTCUSDT"]);
    let notifier = RecordingNotifier::new();
    let config = RuntimeConfig {
        cache: CacheConfig {
            max_attempts: 1,
            ..CacheConfig::default()
        },
        screener: ScreenerConfig {
            cycle_period: Duration::from_secs(60),
            stop_timeout: Duration::from_secs(5),
        },
        default_interval: Interval::OneHour,
    };
    let metrics = Arc::new(Metrics::new().unwrap());
    let runtime = ScreenerRuntime::new(
        config,
        provider.clone(),
        universe,
        notifier.clone(),
        metrics,
    );
    TestRuntime {
        runtime,
        provider,
        notifier,
    }
}

fn update(update_id: i64, chat: i64, text: &str) -> Update {
    serde_json::from_value(serde_json::json!({
        "update_id": update_id,
        "message": {"message_id": update_id, "chat": {"id": chat}, "text": text}
    }))
    .unwrap()
}

#[tokio::test]
async fn set_rules_is_atomic() {
    let t = runtime();
    let dispatcher = t.runtime.dispatcher();

    let reply = dispatcher.handle_text(ALICE, "/rules RSI>60; EMA5 crossup EMA20").await;
    assert!(reply.contains("RSI > 60"));
    assert!(reply.contains("EMA5 crossup EMA20"));

    let reply = dispatcher.handle_text(ALICE, "/rules RSI<30; RSI<<90").await;
    assert!(reply.contains("Rules not changed"));
    assert!(reply.contains("position"));

    let status = dispatcher.handle_text(ALICE, "/status").await;
    assert!(status.contains("RSI > 60"));
    assert!(!status.contains("RSI < 30"));
}

#[tokio::test]
async fn interval_and_status() {
    let t = runtime();
    let dispatcher = t.runtime.dispatcher();

    let status = dispatcher.handle_text(ALICE, "/status").await;
    assert!(status.contains("State: idle"));
    assert!(status.contains("Interval: 1h"));
    assert!(status.contains("(none)"));

    assert_eq!(
        dispatcher.handle_text(ALICE, "/interval 1W").await,
        "Interval set to 1W."
    );
    assert!(dispatcher
        .handle_text(ALICE, "/interval 7d")
        .await
        .contains("unknown interval"));
    assert!(dispatcher
        .handle_text(ALICE, "/status")
        .await
        .contains("Interval: 1W"));
}

#[tokio::test]
async fn start_requires_rules_and_is_idempotent() {
    let t = runtime();
    let dispatcher = t.runtime.dispatcher();

    assert!(dispatcher
        .handle_text(ALICE, "/start")
        .await
        .contains("Set some rules first"));

    dispatcher.handle_text(ALICE, "/rules RSI>60").await;
    assert!(dispatcher.handle_text(ALICE, "/start").await.contains("started"));
    assert!(dispatcher
        .handle_text(ALICE, "/start")
        .await
        .contains("already running"));
    assert!(dispatcher
        .handle_text(ALICE, "/status")
        .await
        .contains("State: running"));

    assert!(dispatcher.handle_text(ALICE, "/stop").await.contains("stopped"));
    assert!(dispatcher
        .handle_text(ALICE, "/stop")
        .await
        .contains("not running"));
}

#[tokio::test]
async fn query_distinguishes_input_from_data_errors() {
    let t = runtime();
    let dispatcher = t.runtime.dispatcher();
    t.provider.set("BTCUSDT", &[("RSI", 65.0), ("EMA50", 5200.0)]);
    t.provider
        .fail("ETHUSDT", FetchError::Unavailable("502".to_string()));

    let report = dispatcher.handle_text(ALICE, "/query binance:btcusdt").await;
    assert!(report.contains("BINANCE:BTCUSDT [1h]"));
    assert!(report.contains("RSI = 65.00"));
    assert!(report.contains("EMA50 = 5200.00"));

    let bad_input = dispatcher.handle_text(ALICE, "/query BTCUSDT").await;
    assert!(bad_input.contains("invalid instrument"));

    let unavailable = dispatcher.handle_text(ALICE, "/query BINANCE:ETHUSDT").await;
    assert!(unavailable.contains("temporarily unavailable"));

    let missing = dispatcher.handle_text(ALICE, "/query BINANCE:NOPE").await;
    assert!(missing.contains("No indicator data"));
}

#[tokio::test]
async fn query_goes_through_the_cache() {
    let t = runtime();
    let dispatcher = t.runtime.dispatcher();
    t.provider.set("BTCUSDT", &[("RSI", 65.0)]);

    dispatcher.handle_text(ALICE, "/query BINANCE:BTCUSDT").await;
    dispatcher.handle_text(ALICE, "/query BINANCE:BTCUSDT").await;
    assert_eq!(t.provider.calls(), 1);

    dispatcher.handle_text(ALICE, "/interval 4h").await;
    dispatcher.handle_text(ALICE, "/query BINANCE:BTCUSDT").await;
    assert_eq!(t.provider.calls(), 2);
}

#[tokio::test]
async fn unknown_commands_and_plain_text_get_help() {
    let t = runtime();
    let dispatcher = t.runtime.dispatcher();

    let reply = dispatcher.handle_text(ALICE, "/launch").await;
    assert!(reply.contains("unknown command '/launch'"));
    assert!(reply.contains("/rules"));

    let reply = dispatcher.handle_text(ALICE, "what can you do?").await;
    assert!(reply.starts_with("Indicator screener commands"));
}

#[tokio::test]
async fn remove_tears_down_a_running_session() {
    let t = runtime();
    let dispatcher = t.runtime.dispatcher();
    dispatcher.handle_text(ALICE, "/rules RSI>60").await;
    dispatcher.handle_text(ALICE, "/start").await;
    let session = dispatcher.sessions().get(ALICE).unwrap();
    assert!(session.is_running().await);

    assert!(dispatcher.remove(ALICE).await);
    assert!(!session.is_running().await);
    assert!(dispatcher.sessions().get(ALICE).is_none());
    assert!(!dispatcher.remove(ALICE).await);
}

#[tokio::test]
async fn shutdown_stops_every_screener() {
    let t = runtime();
    let dispatcher = t.runtime.dispatcher();
    for id in 1..=3 {
        dispatcher.handle_text(SubscriberId(id), "/rules RSI>60").await;
        dispatcher.handle_text(SubscriberId(id), "/start").await;
    }
    dispatcher.handle_text(SubscriberId(4), "/status").await;

    assert_eq!(dispatcher.shutdown().await, 3);
    for session in dispatcher.sessions().all() {
        assert!(!session.is_running().await);
    }
}

#[tokio::test]
async fn command_loop_replies_and_drops_redeliveries() {
    let t = runtime();
    let mut commands = t.runtime.command_loop();

    let reply = commands.handle_update(update(10, 7, "/interval 4h")).await;
    assert_eq!(reply.as_deref(), Some("Interval set to 4h."));
    assert_eq!(t.notifier.messages_for(ALICE), vec!["Interval set to 4h."]);

    assert!(commands.handle_update(update(10, 7, "/interval 4h")).await.is_none());
    assert!(commands.handle_update(update(9, 7, "/interval 1d")).await.is_none());
    assert_eq!(t.notifier.messages_for(ALICE).len(), 1);

    let status = commands.handle_update(update(11, 7, "/status")).await.unwrap();
    assert!(status.contains("Interval: 4h"));
}

#[tokio::test]
async fn duplicate_start_delivery_starts_once() {
    let t = runtime();
    let mut commands = t.runtime.command_loop();
    commands.handle_update(update(1, 7, "/rules RSI>60")).await;

    let first = commands.handle_update(update(2, 7, "/start")).await.unwrap();
    assert!(first.contains("started"));
    assert!(commands.handle_update(update(2, 7, "/start")).await.is_none());

    let again = commands.handle_update(update(3, 7, "/start")).await.unwrap();
    assert!(again.contains("already running"));
    t.runtime.shutdown().await;
}

#[tokio::test]
async fn spawned_loop_processes_in_order() {
    let t = runtime();
    let (tx, handle) = t.runtime.spawn_command_loop(8);

    tx.send(update(1, 7, "/rules RSI>60")).await.unwrap();
    tx.send(update(2, 7, "/interval 15m")).await.unwrap();
    tx.send(update(3, 7, "/status")).await.unwrap();
    drop(tx);
    handle.await.unwrap();

    let messages = t.notifier.messages_for(ALICE);
    assert_eq!(messages.len(), 3);
    assert!(messages[0].starts_with("Rules set"));
    assert_eq!(messages[1], "Interval set to 15m.");
    assert!(messages[2].contains("Interval: 15m"));
}
