//! Environment-driven configuration.
//!
//! `dotenvy` loads `.env` in the binary; everything here reads plain
//! environment variables, falling back to the documented defaults.

use crate::cache::{BackoffConfig, CacheConfig};
use crate::core::scheduler::ScreenerConfig;
use crate::models::{Instrument, Interval};
use crate::services::telegram::DEFAULT_API_URL;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Deployment environment, `sandbox` unless `APP_ENV` says otherwise.
pub fn get_environment() -> String {
    env::var("APP_ENV").unwrap_or_else(|_| "sandbox".to_string())
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub port: u16,
    pub indicator_api_url: String,
    pub telegram_token: String,
    pub telegram_api_url: String,
    /// Fixed universe; `None` means ask the indicator API.
    pub universe: Option<Vec<Instrument>>,
    pub default_interval: Interval,
    pub cache: CacheConfig,
    pub screener: ScreenerConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let universe = match vars.get("UNIVERSE") {
            Some(list) => Some(parse_universe(&list)?),
            None => None,
        };

        let cache = CacheConfig {
            ttl: Duration::from_secs(vars.parse_or("CACHE_TTL_SECONDS", 60)?),
            fetch_timeout: Duration::from_secs(vars.parse_or("FETCH_TIMEOUT_SECONDS", 10)?),
            max_attempts: vars.parse_or("FETCH_MAX_ATTEMPTS", 3usize)?.max(1),
            retry_delay: Duration::from_millis(vars.parse_or("RETRY_DELAY_MS", 500)?),
            backoff: BackoffConfig {
                floor: Duration::from_millis(vars.parse_or("BACKOFF_FLOOR_MS", 0)?),
                step: Duration::from_millis(vars.parse_or("BACKOFF_STEP_MS", 1_000)?),
                ceiling: Duration::from_millis(vars.parse_or("BACKOFF_CEILING_MS", 60_000)?),
            },
        };
        if cache.backoff.ceiling < cache.backoff.floor {
            return Err(ConfigError::Invalid {
                name: "BACKOFF_CEILING_MS",
                value: cache.backoff.ceiling.as_millis().to_string(),
                reason: "must not be below BACKOFF_FLOOR_MS".to_string(),
            });
        }

        let screener = ScreenerConfig {
            cycle_period: Duration::from_secs(vars.parse_or("CYCLE_SECONDS", 300)?),
            ..ScreenerConfig::default()
        };

        Ok(Self {
            environment: vars.get("APP_ENV").unwrap_or_else(|| "sandbox".to_string()),
            port: vars.parse_or("PORT", 8080)?,
            indicator_api_url: vars.required("INDICATOR_API_URL")?,
            telegram_token: vars.required("TELEGRAM_TOKEN")?,
            telegram_api_url: vars
                .get("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            universe,
            default_interval: vars.parse_or("DEFAULT_INTERVAL", Interval::default())?,
            cache,
            screener,
        })
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set and non-blank.
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn parse_or<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            }),
        }
    }
}

fn parse_universe(list: &str) -> Result<Vec<Instrument>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse().map_err(|e: crate::models::InstrumentError| ConfigError::Invalid {
                name: "UNIVERSE",
                value: item.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}
