//! TTL cache in front of the indicator provider.
//!
//! - Fresh entries are served without touching the provider.
//! - Concurrent misses for the same (instrument, interval) share one
//!   in-flight fetch.
//! - Every provider attempt first waits out the shared backoff delay;
//!   rate-limited responses grow that delay, successes decay it.

use crate::cache::backoff::{BackoffConfig, BackoffState};
use crate::metrics::Metrics;
use crate::models::{IndicatorSnapshot, Instrument, Interval};
use crate::services::market_data::{FetchError, IndicatorProvider};
use backon::{ConstantBuilder, Retryable};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    /// Upper bound on a single provider call.
    pub fetch_timeout: Duration,
    /// Total provider attempts per fetch, including the first.
    pub max_attempts: usize,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
    pub backoff: BackoffConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
            backoff: BackoffConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub instrument: Instrument,
    pub interval: Interval,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub snapshot: Arc<IndicatorSnapshot>,
    pub fetched_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn is_stale(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) >= self.ttl
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<IndicatorSnapshot>, FetchError>>>;

/// Cheap to clone; all clones share entries, in-flight fetches and backoff.
#[derive(Clone)]
pub struct IndicatorCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    provider: Arc<dyn IndicatorProvider>,
    config: CacheConfig,
    backoff: BackoffState,
    entries: DashMap<CacheKey, CacheEntry>,
    in_flight: DashMap<CacheKey, SharedFetch>,
    metrics: Option<Arc<Metrics>>,
}

impl IndicatorCache {
    pub fn new(provider: Arc<dyn IndicatorProvider>, config: CacheConfig) -> Self {
        Self::build(provider, config, None)
    }

    pub fn with_metrics(
        provider: Arc<dyn IndicatorProvider>,
        config: CacheConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self::build(provider, config, Some(metrics))
    }

    fn build(
        provider: Arc<dyn IndicatorProvider>,
        config: CacheConfig,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                provider,
                backoff: BackoffState::new(config.backoff),
                config,
                entries: DashMap::new(),
                in_flight: DashMap::new(),
                metrics,
            }),
        }
    }

    /// Return a fresh snapshot, fetching (with retries) on a miss.
    pub async fn get(
        &self,
        instrument: &Instrument,
        interval: Interval,
    ) -> Result<Arc<IndicatorSnapshot>, FetchError> {
        let key = CacheKey {
            instrument: instrument.clone(),
            interval,
        };

        if let Some(snapshot) = self.inner.fresh(&key) {
            self.inner.record(|m| m.cache_hits_total.inc());
            debug!(symbol = %instrument, interval = %interval, "Cache hit for {}", instrument);
            return Ok(snapshot);
        }

        let fetch = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(pending) => {
                debug!(symbol = %instrument, "Joining in-flight fetch for {}", instrument);
                pending.get().clone()
            }
            Entry::Vacant(slot) => {
                // A fetch may have completed between the first check and
                // taking the slot; it stores its entry before leaving in_flight.
                if let Some(snapshot) = self.inner.fresh(&key) {
                    self.inner.record(|m| m.cache_hits_total.inc());
                    return Ok(snapshot);
                }
                self.inner.record(|m| m.cache_misses_total.inc());
                let fetch = Arc::clone(&self.inner).load(key).boxed().shared();
                slot.insert(fetch.clone());
                fetch
            }
        };

        fetch.await
    }

    pub fn backoff(&self) -> &BackoffState {
        &self.inner.backoff
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Drop entries whose TTL has elapsed.
    pub fn evict_stale(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.entries.len();
        self.inner.entries.retain(|_, entry| !entry.is_stale(now));
        before.saturating_sub(self.inner.entries.len())
    }
}

impl CacheInner {
    fn fresh(&self, key: &CacheKey) -> Option<Arc<IndicatorSnapshot>> {
        let entry = self.entries.get(key)?;
        if entry.is_stale(Instant::now()) {
            None
        } else {
            Some(Arc::clone(&entry.snapshot))
        }
    }

    fn record(&self, f: impl FnOnce(&Metrics)) {
        if let Some(ref metrics) = self.metrics {
            f(metrics);
        }
    }

    async fn load(self: Arc<Self>, key: CacheKey) -> Result<Arc<IndicatorSnapshot>, FetchError> {
        let result = self.fetch_with_retry(&key).await.map(Arc::new);

        match &result {
            Ok(snapshot) => {
                self.entries.insert(
                    key.clone(),
                    CacheEntry {
                        snapshot: Arc::clone(snapshot),
                        fetched_at: Instant::now(),
                        ttl: self.config.ttl,
                    },
                );
            }
            Err(e) => {
                self.record(|m| m.provider_failures_total.inc());
                debug!(symbol = %key.instrument, error = %e, "Fetch failed for {}", key.instrument);
            }
        }

        self.in_flight.remove(&key);
        result
    }

    async fn fetch_with_retry(&self, key: &CacheKey) -> Result<IndicatorSnapshot, FetchError> {
        let retries = ConstantBuilder::default()
            .with_delay(self.config.retry_delay)
            .with_max_times(self.config.max_attempts.saturating_sub(1));

        (|| self.fetch_once(key))
            .retry(retries)
            .sleep(tokio::time::sleep)
            .when(FetchError::is_retryable)
            .notify(|err: &FetchError, delay: Duration| {
                warn!(
                    symbol = %key.instrument,
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "Retrying indicator fetch for {}",
                    key.instrument
                );
            })
            .await
    }

    async fn fetch_once(&self, key: &CacheKey) -> Result<IndicatorSnapshot, FetchError> {
        let pause = self.backoff.current();
        if !pause.is_zero() {
            debug!(delay_ms = pause.as_millis() as u64, "Honoring provider backoff");
            tokio::time::sleep(pause).await;
        }

        self.record(|m| m.provider_requests_total.inc());
        let timeout = self.config.fetch_timeout;
        let result = match tokio::time::timeout(
            timeout,
            self.provider.fetch(&key.instrument, key.interval),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Unavailable(format!(
                "timed out after {}ms",
                timeout.as_millis()
            ))),
        };

        match &result {
            Ok(_) => {
                let delay = self.backoff.decay();
                self.record(|m| m.backoff_delay_seconds.set(delay.as_secs_f64()));
            }
            Err(FetchError::RateLimited) => {
                let delay = self.backoff.increase();
                self.record(|m| {
                    m.provider_rate_limited_total.inc();
                    m.backoff_delay_seconds.set(delay.as_secs_f64());
                });
                warn!(
                    symbol = %key.instrument,
                    backoff_ms = delay.as_millis() as u64,
                    "Provider rate limited, backoff now {}ms",
                    delay.as_millis()
                );
            }
            Err(_) => {}
        }

        result
    }
}
