//! Market data provider interfaces consumed by the cache and screener.

use crate::models::{IndicatorSnapshot, Instrument, Interval};
use async_trait::async_trait;
use thiserror::Error;

/// Classified failure of a single indicator fetch.
///
/// `Clone` so that every caller coalesced onto one in-flight fetch receives
/// the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("rate limited by indicator provider")]
    RateLimited,

    #[error("indicator provider unavailable: {0}")]
    Unavailable(String),

    #[error("no indicator data for {0}")]
    NotFound(String),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::NotFound(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("universe unavailable: {0}")]
pub struct UniverseError(pub String);

/// Source of indicator snapshots for one (instrument, interval).
#[async_trait]
pub trait IndicatorProvider: Send + Sync {
    async fn fetch(
        &self,
        instrument: &Instrument,
        interval: Interval,
    ) -> Result<IndicatorSnapshot, FetchError>;
}

/// Source of the instruments to screen. An empty list is not an error.
#[async_trait]
pub trait UniverseProvider: Send + Sync {
    async fn list(&self) -> Result<Vec<Instrument>, UniverseError>;
}

/// Fixed universe taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticUniverse {
    instruments: Vec<Instrument>,
}

impl StaticUniverse {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self { instruments }
    }
}

#[async_trait]
impl UniverseProvider for StaticUniverse {
    async fn list(&self) -> Result<Vec<Instrument>, UniverseError> {
        Ok(self.instruments.clone())
    }
}
