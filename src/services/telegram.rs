//! Telegram Bot API delivery and update decoding

use crate::models::SubscriberId;
use crate::services::notifier::{Notifier, NotifyError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Sends messages through `POST {api}/bot{token}/sendMessage`.
pub struct TelegramNotifier {
    send_url: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(api_url, token, client))
    }

    pub fn with_client(api_url: &str, token: &str, client: reqwest::Client) -> Self {
        Self {
            send_url: format!("{}/bot{}/sendMessage", api_url.trim_end_matches('/'), token),
            client,
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, subscriber: SubscriberId, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.send_url)
            .json(&SendMessageRequest {
                chat_id: subscriber.0,
                text,
            })
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(chat_id = subscriber.0, "Delivered message to {}", subscriber);
        Ok(())
    }
}

/// Subset of a Telegram `Update` the webhook cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    /// Chat id and text of a text message, if this update carries one.
    pub fn text_message(&self) -> Option<(SubscriberId, &str)> {
        let message = self.message.as_ref()?;
        let text = message.text.as_deref()?;
        Some((SubscriberId(message.chat.id), text))
    }
}
