//! Outbound message delivery to subscribers

use crate::models::SubscriberId;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport error: {0}")]
    Transport(String),

    #[error("notification rejected: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Fire-and-forget text delivery. Callers log failures and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subscriber: SubscriberId, text: &str) -> Result<(), NotifyError>;
}
