//! Per-session screener tasks.
//!
//! Each running session owns one task that repeatedly walks the universe,
//! evaluates the session's rules through the shared cache, and notifies the
//! subscriber of match transitions. A task runs its cycles back to back, so
//! two cycles of the same session never overlap.
//!
//! `stop` is observed between instruments and during the inter-cycle sleep.
//! A fetch already in flight completes and its result is discarded, so a
//! stop takes effect within one fetch (timeout × attempts) or immediately
//! when the task is sleeping, and always within one cycle period.

use crate::cache::IndicatorCache;
use crate::core::session::{ScreenTask, Session};
use crate::metrics::Metrics;
use crate::services::market_data::UniverseProvider;
use crate::services::notifier::Notifier;
use crate::signals::format::{no_matches_message, transition_message};
use crate::signals::MatchTracker;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ScreenerConfig {
    /// Pause between the end of one cycle and the start of the next.
    pub cycle_period: Duration,
    /// How long `stop` waits for the task to wind down before aborting it.
    pub stop_timeout: Duration,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            cycle_period: Duration::from_secs(300),
            stop_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    NoRules,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

/// Errors that end a screener run and return the session to idle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScreenerError {
    #[error("the rule set was cleared")]
    NoRules,
}

/// Outcome of one pass over the universe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub universe_size: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub matching: usize,
    pub notifications: usize,
    /// False when the universe was unavailable or empty, or a stop
    /// interrupted the pass.
    pub completed: bool,
}

#[derive(Clone)]
pub struct Scheduler {
    cache: IndicatorCache,
    universe: Arc<dyn UniverseProvider>,
    notifier: Arc<dyn Notifier>,
    config: ScreenerConfig,
    metrics: Option<Arc<Metrics>>,
}

impl Scheduler {
    pub fn new(
        cache: IndicatorCache,
        universe: Arc<dyn UniverseProvider>,
        notifier: Arc<dyn Notifier>,
        config: ScreenerConfig,
    ) -> Self {
        Self {
            cache,
            universe,
            notifier,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    /// Idle → Running. Starting a running session is a reported no-op.
    pub async fn start(&self, session: &Arc<Session>) -> StartOutcome {
        let mut screen = session.screen.lock().await;
        if screen.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            debug!(subscriber = %session.id(), "Screener already running for {}", session.id());
            return StartOutcome::AlreadyRunning;
        }
        if session.settings().await.rules.is_none() {
            return StartOutcome::NoRules;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let screener = Screener {
            session: Arc::clone(session),
            scheduler: self.clone(),
            tracker: MatchTracker::new(),
            announced_empty: false,
        };
        let handle = tokio::spawn(screener.run(stop_rx));
        *screen = Some(ScreenTask {
            stop: stop_tx,
            handle,
        });

        if let Some(ref metrics) = self.metrics {
            metrics.screeners_running.inc();
        }
        info!(subscriber = %session.id(), "Screener started for {}", session.id());
        StartOutcome::Started
    }

    /// Running → Idle. Waits for the task to reach a safe point, bounded by
    /// `stop_timeout`, after which it is aborted.
    pub async fn stop(&self, session: &Session) -> StopOutcome {
        let task = session.screen.lock().await.take();
        let Some(task) = task.filter(|task| !task.handle.is_finished()) else {
            return StopOutcome::NotRunning;
        };

        // Err only if the task already dropped its receiver, i.e. it is exiting.
        let _ = task.stop.send(true);
        let mut handle = task.handle;
        match tokio::time::timeout(self.config.stop_timeout, &mut handle).await {
            Ok(_) => {
                info!(subscriber = %session.id(), "Screener stopped for {}", session.id());
            }
            Err(_) => {
                warn!(
                    subscriber = %session.id(),
                    timeout_secs = self.config.stop_timeout.as_secs(),
                    "Screener for {} did not stop in time, aborting",
                    session.id()
                );
                handle.abort();
                // A task that finished before the abort already left the gauge.
                if let Err(e) = handle.await {
                    if e.is_cancelled() {
                        if let Some(ref metrics) = self.metrics {
                            metrics.screeners_running.dec();
                        }
                    }
                }
            }
        }
        StopOutcome::Stopped
    }

    async fn deliver(&self, session: &Session, text: &str) -> bool {
        match self.notifier.send(session.id(), text).await {
            Ok(()) => {
                if let Some(ref metrics) = self.metrics {
                    metrics.notifications_sent_total.inc();
                }
                true
            }
            Err(e) => {
                if let Some(ref metrics) = self.metrics {
                    metrics.notifications_failed_total.inc();
                }
                error!(subscriber = %session.id(), error = %e, "Failed to notify {}", session.id());
                false
            }
        }
    }
}

/// State owned by one session's screener task.
struct Screener {
    session: Arc<Session>,
    scheduler: Scheduler,
    tracker: MatchTracker,
    announced_empty: bool,
}

impl Screener {
    async fn run(mut self, mut stop: watch::Receiver<bool>) {
        let id = self.session.id();
        let period = self.scheduler.config.cycle_period;

        loop {
            if *stop.borrow() {
                break;
            }

            let started = Instant::now();
            match self.run_cycle(&stop).await {
                Ok(report) => {
                    if let Some(ref metrics) = self.scheduler.metrics {
                        metrics.screener_cycles_total.inc();
                        metrics
                            .screener_cycle_duration_seconds
                            .observe(started.elapsed().as_secs_f64());
                    }
                    debug!(
                        subscriber = %id,
                        universe = report.universe_size,
                        fetched = report.fetched,
                        skipped = report.skipped,
                        matching = report.matching,
                        notifications = report.notifications,
                        "Screener cycle for {} finished in {}ms",
                        id,
                        started.elapsed().as_millis()
                    );
                }
                Err(e) => {
                    error!(subscriber = %id, error = %e, "Screener for {} stopped: {}", id, e);
                    let text = format!("⛔ Screener stopped: {}. Send /start to resume.", e);
                    self.scheduler.deliver(&self.session, &text).await;
                    break;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.tracker.clear();
        if let Some(ref metrics) = self.scheduler.metrics {
            metrics.screeners_running.dec();
        }
        debug!(subscriber = %id, "Screener task for {} exited", id);
    }

    async fn run_cycle(&mut self, stop: &watch::Receiver<bool>) -> Result<CycleReport, ScreenerError> {
        let settings = self.session.settings().await;
        let rules = settings.rules.ok_or(ScreenerError::NoRules)?;
        let interval = settings.interval;
        let mut report = CycleReport::default();

        let universe = match self.scheduler.universe.list().await {
            Ok(universe) => universe,
            Err(e) => {
                warn!(subscriber = %self.session.id(), error = %e, "Universe unavailable, skipping cycle");
                return Ok(report);
            }
        };
        if universe.is_empty() {
            debug!(subscriber = %self.session.id(), "Universe is empty, nothing to screen");
            return Ok(report);
        }
        report.universe_size = universe.len();

        self.tracker.use_interval(interval);
        let mut transitions = self.tracker.retain_universe(&universe);
        let mut interrupted = false;

        for instrument in &universe {
            if *stop.borrow() {
                interrupted = true;
                break;
            }
            let result = self.scheduler.cache.get(instrument, interval).await;
            if *stop.borrow() {
                interrupted = true;
                break;
            }
            match result {
                Ok(snapshot) => {
                    report.fetched += 1;
                    if let Some(transition) = self.tracker.observe(&rules, snapshot) {
                        transitions.push(transition);
                    }
                }
                Err(e) => {
                    report.skipped += 1;
                    debug!(symbol = %instrument, error = %e, "Skipping {} this cycle", instrument);
                }
            }
        }

        report.matching = self.tracker.matching_count();
        if interrupted {
            // Stopped mid-pass: the subscriber already got the stop reply.
            return Ok(report);
        }
        report.completed = true;

        for transition in &transitions {
            let text = transition_message(transition, &rules, interval);
            if self.scheduler.deliver(&self.session, &text).await {
                report.notifications += 1;
            }
        }

        if report.fetched == 0 {
            warn!(
                subscriber = %self.session.id(),
                skipped = report.skipped,
                "No instrument could be fetched for {}, degraded cycle",
                self.session.id()
            );
        } else if report.matching > 0 {
            self.announced_empty = false;
        } else if !self.announced_empty {
            let text = no_matches_message(report.universe_size, interval);
            if self.scheduler.deliver(&self.session, &text).await {
                report.notifications += 1;
            }
            self.announced_empty = true;
        }

        Ok(report)
    }
}
