//! Wires providers, cache, scheduler and dispatcher together and runs the
//! sequential command loop.

use crate::cache::{CacheConfig, IndicatorCache};
use crate::commands::CommandDispatcher;
use crate::config::Config;
use crate::core::scheduler::{Scheduler, ScreenerConfig};
use crate::core::session::SessionStore;
use crate::metrics::Metrics;
use crate::models::Interval;
use crate::services::indicator_api::HttpIndicatorProvider;
use crate::services::market_data::{IndicatorProvider, StaticUniverse, UniverseProvider};
use crate::services::notifier::Notifier;
use crate::services::telegram::{TelegramNotifier, Update};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Tunables for the runtime, independent of where data comes from.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub cache: CacheConfig,
    pub screener: ScreenerConfig,
    pub default_interval: Interval,
}

pub struct ScreenerRuntime {
    dispatcher: CommandDispatcher,
    notifier: Arc<dyn Notifier>,
    cache: IndicatorCache,
    metrics: Arc<Metrics>,
}

impl ScreenerRuntime {
    pub fn new(
        config: RuntimeConfig,
        provider: Arc<dyn IndicatorProvider>,
        universe: Arc<dyn UniverseProvider>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let cache = IndicatorCache::with_metrics(provider, config.cache, Arc::clone(&metrics));
        let scheduler = Scheduler::new(
            cache.clone(),
            universe,
            Arc::clone(&notifier),
            config.screener,
        )
        .with_metrics(Arc::clone(&metrics));
        let sessions = SessionStore::new(config.default_interval);
        let dispatcher = CommandDispatcher::new(sessions, scheduler, cache.clone());

        Self {
            dispatcher,
            notifier,
            cache,
            metrics,
        }
    }

    /// HTTP indicator API, Telegram delivery, and either the configured
    /// static universe or the API's universe endpoint.
    pub fn from_config(
        config: &Config,
        metrics: Arc<Metrics>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let api = Arc::new(HttpIndicatorProvider::new(
            &config.indicator_api_url,
            config.cache.fetch_timeout,
        )?);
        let universe: Arc<dyn UniverseProvider> = match config.universe {
            Some(ref instruments) => {
                info!(count = instruments.len(), "Using static universe of {} instruments", instruments.len());
                Arc::new(StaticUniverse::new(instruments.clone()))
            }
            None => {
                info!(url = %config.indicator_api_url, "Using universe from indicator API");
                api.clone()
            }
        };
        let notifier = Arc::new(TelegramNotifier::new(
            &config.telegram_api_url,
            &config.telegram_token,
            config.cache.fetch_timeout,
        )?);

        let runtime_config = RuntimeConfig {
            cache: config.cache.clone(),
            screener: config.screener.clone(),
            default_interval: config.default_interval,
        };
        Ok(Self::new(runtime_config, api, universe, notifier, metrics))
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn cache(&self) -> &IndicatorCache {
        &self.cache
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    pub fn command_loop(&self) -> CommandLoop {
        CommandLoop::new(self.dispatcher.clone(), Arc::clone(&self.notifier))
    }

    /// Spawn the command loop. It ends once every sender is dropped.
    pub fn spawn_command_loop(&self, capacity: usize) -> (mpsc::Sender<Update>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = tokio::spawn(self.command_loop().run(rx));
        (tx, handle)
    }

    /// Periodically drop expired cache entries.
    pub fn spawn_cache_janitor(&self, every: Duration) -> JoinHandle<()> {
        let cache = self.cache.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = cache.evict_stale();
                if evicted > 0 {
                    debug!(evicted = evicted, remaining = cache.len(), "Evicted {} stale cache entries", evicted);
                }
            }
        })
    }

    /// Stop every running screener and wait for them.
    pub async fn shutdown(&self) {
        info!("Stopping all screeners...");
        let stopped = self.dispatcher.shutdown().await;
        info!(stopped = stopped, "Runtime shut down");
    }
}

/// Processes updates one at a time, in arrival order.
pub struct CommandLoop {
    dispatcher: CommandDispatcher,
    notifier: Arc<dyn Notifier>,
    last_update_id: Option<i64>,
}

impl CommandLoop {
    pub fn new(dispatcher: CommandDispatcher, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            dispatcher,
            notifier,
            last_update_id: None,
        }
    }

    pub async fn run(mut self, mut updates: mpsc::Receiver<Update>) {
        info!("Command loop started");
        while let Some(update) = updates.recv().await {
            self.handle_update(update).await;
        }
        info!("Command loop stopped");
    }

    /// Apply one update and deliver the reply. Updates at or behind the
    /// cursor are redeliveries and are dropped. Returns the reply sent.
    pub async fn handle_update(&mut self, update: Update) -> Option<String> {
        if self.last_update_id.is_some_and(|last| update.update_id <= last) {
            debug!(update_id = update.update_id, "Dropping duplicate update {}", update.update_id);
            return None;
        }
        self.last_update_id = Some(update.update_id);

        let (subscriber, text) = update.text_message()?;
        debug!(subscriber = %subscriber, update_id = update.update_id, "Command from {}: {}", subscriber, text);

        let reply = self.dispatcher.handle_text(subscriber, text).await;
        if let Err(e) = self.notifier.send(subscriber, &reply).await {
            error!(subscriber = %subscriber, error = %e, "Failed to deliver reply to {}", subscriber);
        }
        Some(reply)
    }
}
