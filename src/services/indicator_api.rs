//! HTTP indicator API client
//!
//! Serves both indicator snapshots and the screenable universe:
//! - `GET {base}/indicators?symbol=EX:SYM&interval=1h`
//! - `GET {base}/universe`

use crate::models::{IndicatorSnapshot, Instrument, Interval};
use crate::services::market_data::{FetchError, IndicatorProvider, UniverseError, UniverseProvider};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Deserialize)]
struct IndicatorResponse {
    #[serde(default)]
    indicators: HashMap<String, Option<f64>>,
    #[serde(default)]
    summary: Option<String>,
}

pub struct HttpIndicatorProvider {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpIndicatorProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(base_url, client)
    }

    pub fn with_client(
        base_url: &str,
        client: reqwest::Client,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        // A trailing slash keeps `join` from replacing the last path segment.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        Ok(Self {
            base_url: Url::parse(&normalized)?,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }
}

#[async_trait]
impl IndicatorProvider for HttpIndicatorProvider {
    async fn fetch(
        &self,
        instrument: &Instrument,
        interval: Interval,
    ) -> Result<IndicatorSnapshot, FetchError> {
        let mut url = self
            .endpoint("indicators")
            .map_err(|e| FetchError::Unavailable(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("symbol", &instrument.to_string())
            .append_pair("interval", interval.code());

        debug!(symbol = %instrument, interval = %interval, "Fetching indicators for {}", instrument);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(FetchError::RateLimited),
            StatusCode::NOT_FOUND => return Err(FetchError::NotFound(instrument.to_string())),
            status if !status.is_success() => {
                return Err(FetchError::Unavailable(format!("HTTP {}", status)))
            }
            _ => {}
        }

        let body: IndicatorResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Unavailable(format!("invalid response body: {}", e)))?;

        let values = body
            .indicators
            .into_iter()
            .filter_map(|(name, value)| value.filter(|v| v.is_finite()).map(|v| (name, v)));

        Ok(IndicatorSnapshot::new(
            instrument.clone(),
            values,
            body.summary.unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl UniverseProvider for HttpIndicatorProvider {
    async fn list(&self) -> Result<Vec<Instrument>, UniverseError> {
        let url = self
            .endpoint("universe")
            .map_err(|e| UniverseError(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UniverseError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(UniverseError(format!("HTTP {}", response.status())));
        }

        let symbols: Vec<String> = response
            .json()
            .await
            .map_err(|e| UniverseError(format!("invalid response body: {}", e)))?;

        let instruments = symbols
            .iter()
            .filter_map(|symbol| match symbol.parse::<Instrument>() {
                Ok(instrument) => Some(instrument),
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Skipping unparseable universe entry");
                    None
                }
            })
            .collect();

        Ok(instruments)
    }
}
