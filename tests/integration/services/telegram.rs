//! Telegram delivery against a mocked Bot API

use screener_bot::models::SubscriberId;
use screener_bot::services::notifier::{Notifier, NotifyError};
use screener_bot::services::telegram::TelegramNotifier;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "123:secret";

#[tokio::test]
async fn send_posts_chat_id_and_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:secret/sendMessage"))
        .and(body_json(json!({"chat_id": 42, "text": "hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(&server.uri(), TOKEN, Duration::from_secs(2)).unwrap();
    tokio_test::assert_ok!(notifier.send(SubscriberId(42), "hello").await);
}

#[tokio::test]
async fn rejected_message_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("bot was blocked by the user"))
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(&server.uri(), TOKEN, Duration::from_secs(2)).unwrap();
    let err = notifier.send(SubscriberId(42), "hello").await.unwrap_err();
    match err {
        NotifyError::Rejected { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("blocked"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn unreachable_api_is_a_transport_error() {
    let notifier =
        TelegramNotifier::new("http://127.0.0.1:9", TOKEN, Duration::from_millis(500)).unwrap();
    let err = notifier.send(SubscriberId(1), "hello").await.unwrap_err();
    assert!(matches!(err, NotifyError::Transport(_)));
}
