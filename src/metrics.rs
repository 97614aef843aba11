//! Prometheus metrics for the cache, screener and HTTP surface

use prometheus::{Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,

    pub cache_hits_total: IntCounter,
    pub cache_misses_total: IntCounter,
    pub provider_requests_total: IntCounter,
    pub provider_rate_limited_total: IntCounter,
    pub provider_failures_total: IntCounter,
    pub backoff_delay_seconds: Gauge,

    pub screener_cycles_total: IntCounter,
    pub screener_cycle_duration_seconds: Histogram,
    pub screeners_running: IntGauge,
    pub notifications_sent_total: IntCounter,
    pub notifications_failed_total: IntCounter,

    pub http_requests_total: IntCounter,
    pub http_requests_in_flight: IntGauge,
    pub http_request_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cache_hits_total =
            IntCounter::new("cache_hits_total", "Indicator lookups served from cache")?;
        let cache_misses_total =
            IntCounter::new("cache_misses_total", "Indicator lookups that required a fetch")?;
        let provider_requests_total =
            IntCounter::new("provider_requests_total", "Calls made to the indicator provider")?;
        let provider_rate_limited_total = IntCounter::new(
            "provider_rate_limited_total",
            "Indicator provider responses classified as rate limited",
        )?;
        let provider_failures_total = IntCounter::new(
            "provider_failures_total",
            "Indicator fetches that failed after all retries",
        )?;
        let backoff_delay_seconds =
            Gauge::new("backoff_delay_seconds", "Current shared rate-limit backoff delay")?;

        let screener_cycles_total =
            IntCounter::new("screener_cycles_total", "Completed screener cycles")?;
        let screener_cycle_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "screener_cycle_duration_seconds",
            "Wall time of one screener pass over the universe",
        ))?;
        let screeners_running = IntGauge::new("screeners_running", "Sessions currently screening")?;
        let notifications_sent_total =
            IntCounter::new("notifications_sent_total", "Messages delivered to subscribers")?;
        let notifications_failed_total = IntCounter::new(
            "notifications_failed_total",
            "Messages whose delivery failed",
        )?;

        let http_requests_total = IntCounter::new("http_requests_total", "HTTP requests served")?;
        let http_requests_in_flight =
            IntGauge::new("http_requests_in_flight", "HTTP requests currently being served")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency",
        ))?;

        registry.register(Box::new(cache_hits_total.clone()))?;
        registry.register(Box::new(cache_misses_total.clone()))?;
        registry.register(Box::new(provider_requests_total.clone()))?;
        registry.register(Box::new(provider_rate_limited_total.clone()))?;
        registry.register(Box::new(provider_failures_total.clone()))?;
        registry.register(Box::new(backoff_delay_seconds.clone()))?;
        registry.register(Box::new(screener_cycles_total.clone()))?;
        registry.register(Box::new(screener_cycle_duration_seconds.clone()))?;
        registry.register(Box::new(screeners_running.clone()))?;
        registry.register(Box::new(notifications_sent_total.clone()))?;
        registry.register(Box::new(notifications_failed_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            cache_hits_total,
            cache_misses_total,
            provider_requests_total,
            provider_rate_limited_total,
            provider_failures_total,
            backoff_delay_seconds,
            screener_cycles_total,
            screener_cycle_duration_seconds,
            screeners_running,
            notifications_sent_total,
            notifications_failed_total,
            http_requests_total,
            http_requests_in_flight,
            http_request_duration_seconds,
        })
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
