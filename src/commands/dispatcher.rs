//! Applies decoded commands to the session store and scheduler.
//!
//! Every command yields exactly one reply text. The dispatcher itself never
//! talks to the notifier, so the command loop decides how replies travel.

use crate::cache::IndicatorCache;
use crate::commands::{Command, CommandError};
use crate::core::scheduler::{Scheduler, StartOutcome, StopOutcome};
use crate::core::session::SessionStore;
use crate::models::{Instrument, Interval, SubscriberId};
use crate::services::market_data::FetchError;
use crate::signals::format::snapshot_report;
use crate::strategies::compile;
use futures_util::future::join_all;
use tracing::{debug, info, warn};

pub const HELP_TEXT: &str = "\
Indicator screener commands:
/rules <expr>; <expr>  set the rules, e.g. /rules RSI>60; EMA5 crossup EMA20
/interval <code>  timeframe: 1m 5m 15m 30m 1h 2h 4h 1d 1W 1M
/start  start screening
/stop  stop screening
/query <EXCHANGE:SYMBOL>  show current indicators for one instrument
/status  show rules, interval and state
/clear  remove all rules
/help  this message";

#[derive(Clone)]
pub struct CommandDispatcher {
    sessions: SessionStore,
    scheduler: Scheduler,
    cache: IndicatorCache,
}

impl CommandDispatcher {
    pub fn new(sessions: SessionStore, scheduler: Scheduler, cache: IndicatorCache) -> Self {
        Self {
            sessions,
            scheduler,
            cache,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Decode and apply one message from a subscriber.
    pub async fn handle_text(&self, subscriber: SubscriberId, text: &str) -> String {
        match Command::parse(text) {
            Ok(command) => self.dispatch(subscriber, command).await,
            Err(e) => {
                debug!(subscriber = %subscriber, error = %e, "Rejected command from {}", subscriber);
                command_error_reply(&e)
            }
        }
    }

    pub async fn dispatch(&self, subscriber: SubscriberId, command: Command) -> String {
        match command {
            Command::Start => self.start(subscriber).await,
            Command::Stop => self.stop(subscriber).await,
            Command::SetRules(expressions) => self.set_rules(subscriber, &expressions).await,
            Command::ClearRules => self.clear_rules(subscriber).await,
            Command::SetInterval(interval) => self.set_interval(subscriber, interval).await,
            Command::Query(instrument) => self.query_one(subscriber, &instrument).await,
            Command::Status => self.status(subscriber).await,
            Command::Help => HELP_TEXT.to_string(),
        }
    }

    /// Replace the rule set. A bad expression leaves the previous rules in place.
    pub async fn set_rules<S: AsRef<str>>(&self, subscriber: SubscriberId, expressions: &[S]) -> String {
        let rules = match compile(expressions) {
            Ok(rules) => rules,
            Err(e) => {
                debug!(subscriber = %subscriber, error = %e, "Rules rejected for {}", subscriber);
                return format!("⚠️ Rules not changed: {}", e);
            }
        };

        let session = self.sessions.get_or_create(subscriber);
        let text = rules.canonical().join("\n");
        session.set_rules(rules).await;
        info!(subscriber = %subscriber, "Rules updated for {}", subscriber);
        format!("Rules set:\n{}", text)
    }

    pub async fn clear_rules(&self, subscriber: SubscriberId) -> String {
        let session = self.sessions.get_or_create(subscriber);
        session.clear_rules().await;
        if session.is_running().await {
            "Rules cleared. The running screener will stop at its next cycle.".to_string()
        } else {
            "Rules cleared.".to_string()
        }
    }

    pub async fn set_interval(&self, subscriber: SubscriberId, interval: Interval) -> String {
        let session = self.sessions.get_or_create(subscriber);
        session.set_interval(interval).await;
        format!("Interval set to {}.", interval)
    }

    pub async fn start(&self, subscriber: SubscriberId) -> String {
        let session = self.sessions.get_or_create(subscriber);
        match self.scheduler.start(&session).await {
            StartOutcome::Started => {
                let interval = session.settings().await.interval;
                format!(
                    "▶️ Screener started on {}. You will be notified when instruments start or stop matching.",
                    interval
                )
            }
            StartOutcome::AlreadyRunning => "Screener is already running.".to_string(),
            StartOutcome::NoRules => "Set some rules first, e.g. /rules RSI>60".to_string(),
        }
    }

    pub async fn stop(&self, subscriber: SubscriberId) -> String {
        let Some(session) = self.sessions.get(subscriber) else {
            return "Screener is not running.".to_string();
        };
        match self.scheduler.stop(&session).await {
            StopOutcome::Stopped => "⏹ Screener stopped.".to_string(),
            StopOutcome::NotRunning => "Screener is not running.".to_string(),
        }
    }

    /// One-off fetch through the cache using the subscriber's interval.
    pub async fn query_one(&self, subscriber: SubscriberId, instrument: &Instrument) -> String {
        let interval = match self.sessions.get(subscriber) {
            Some(session) => session.settings().await.interval,
            None => self.sessions.default_interval(),
        };

        match self.cache.get(instrument, interval).await {
            Ok(snapshot) => snapshot_report(&snapshot, interval),
            Err(e) => {
                warn!(subscriber = %subscriber, symbol = %instrument, error = %e, "Query for {} failed", instrument);
                fetch_error_reply(instrument, &e)
            }
        }
    }

    pub async fn status(&self, subscriber: SubscriberId) -> String {
        let session = self.sessions.get_or_create(subscriber);
        let settings = session.settings().await;
        let state = if session.is_running().await {
            "running"
        } else {
            "idle"
        };
        let rules = match settings.rules {
            Some(ref rules) => rules.canonical().join("\n"),
            None => "(none)".to_string(),
        };
        format!(
            "State: {}\nInterval: {}\nRules:\n{}",
            state, settings.interval, rules
        )
    }

    /// Tear a session down: stop its screener and forget it.
    pub async fn remove(&self, subscriber: SubscriberId) -> bool {
        let Some(session) = self.sessions.remove(subscriber) else {
            return false;
        };
        self.scheduler.stop(&session).await;
        info!(subscriber = %subscriber, "Session {} removed", subscriber);
        true
    }

    /// Stop every running screener concurrently.
    pub async fn shutdown(&self) -> usize {
        let sessions = self.sessions.all();
        let outcomes = join_all(sessions.iter().map(|session| self.scheduler.stop(session))).await;
        let stopped = outcomes
            .into_iter()
            .filter(|outcome| *outcome == StopOutcome::Stopped)
            .count();
        info!(stopped = stopped, "Stopped {} screeners", stopped);
        stopped
    }
}

fn command_error_reply(error: &CommandError) -> String {
    match error {
        CommandError::Unknown(_) => format!("⚠️ {}\n\n{}", error, HELP_TEXT),
        _ => format!("⚠️ {}", error),
    }
}

/// Data-side failures, worded apart from input errors.
fn fetch_error_reply(instrument: &Instrument, error: &FetchError) -> String {
    match error {
        FetchError::NotFound(_) => format!("No indicator data available for {}.", instrument),
        FetchError::RateLimited => format!(
            "Indicator data for {} is temporarily unavailable (rate limited). Try again shortly.",
            instrument
        ),
        FetchError::Unavailable(_) => format!(
            "Indicator data for {} is temporarily unavailable. Try again shortly.",
            instrument
        ),
    }
}
