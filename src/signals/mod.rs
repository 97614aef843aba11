//! Match-state diffing and notification text

pub mod format;
pub mod transitions;

pub use transitions::{ExitReason, MatchTracker, Transition};
