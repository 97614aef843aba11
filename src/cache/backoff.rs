//! Endpoint-wide adaptive delay for a rate-limited upstream.
//!
//! One `BackoffState` is shared by every caller of the same provider: a rate
//! limit seen while fetching one instrument slows down fetches for all of
//! them, since they draw on the same upstream quota.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay never drops below this.
    pub floor: Duration,
    /// Added on every rate-limited response.
    pub step: Duration,
    /// Delay never grows beyond this.
    pub ceiling: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            floor: Duration::ZERO,
            step: Duration::from_secs(1),
            ceiling: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
pub struct BackoffState {
    current_ms: AtomicU64,
    floor_ms: u64,
    step_ms: u64,
    ceiling_ms: u64,
}

impl BackoffState {
    pub fn new(config: BackoffConfig) -> Self {
        let floor_ms = duration_ms(config.floor);
        Self {
            current_ms: AtomicU64::new(floor_ms),
            floor_ms,
            step_ms: duration_ms(config.step),
            ceiling_ms: duration_ms(config.ceiling).max(floor_ms),
        }
    }

    pub fn current(&self) -> Duration {
        Duration::from_millis(self.current_ms.load(Ordering::Acquire))
    }

    pub fn floor(&self) -> Duration {
        Duration::from_millis(self.floor_ms)
    }

    /// Grow the delay by one step, capped at the ceiling. Returns the new delay.
    pub fn increase(&self) -> Duration {
        self.update(|current| {
            current
                .saturating_add(self.step_ms)
                .min(self.ceiling_ms)
                .max(self.floor_ms)
        })
    }

    /// Halve the distance to the floor. Strictly decreases while above it.
    pub fn decay(&self) -> Duration {
        self.update(|current| {
            let excess = current.saturating_sub(self.floor_ms);
            self.floor_ms + excess / 2
        })
    }

    pub fn reset(&self) {
        self.current_ms.store(self.floor_ms, Ordering::Release);
    }

    fn update(&self, f: impl Fn(u64) -> u64) -> Duration {
        let previous = self
            .current_ms
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| Some(f(current)))
            .unwrap_or_else(|current| current);
        Duration::from_millis(f(previous))
    }
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
