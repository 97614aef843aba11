//! Subscriber-facing message text

use crate::models::{IndicatorSnapshot, Instrument, Interval, RuleSet};
use crate::signals::transitions::{ExitReason, Transition};
use std::fmt::Write;

pub fn transition_message(transition: &Transition, rules: &RuleSet, interval: Interval) -> String {
    match transition {
        Transition::Entered {
            instrument,
            snapshot,
        } => entered_message(instrument, snapshot, rules, interval),
        Transition::Exited {
            instrument, reason, ..
        } => exited_message(instrument, *reason, interval),
    }
}

/// Names and values of every indicator the rules reference.
pub fn entered_message(
    instrument: &Instrument,
    snapshot: &IndicatorSnapshot,
    rules: &RuleSet,
    interval: Interval,
) -> String {
    let mut text = format!("✅ {} now matches [{}]", instrument, interval);
    for name in rules.referenced_indicators() {
        let _ = write!(text, "\n{} = {}", name, format_value(snapshot.get(name)));
    }
    if !snapshot.summary.is_empty() {
        let _ = write!(text, "\nSummary: {}", snapshot.summary);
    }
    text
}

pub fn exited_message(instrument: &Instrument, reason: ExitReason, interval: Interval) -> String {
    match reason {
        ExitReason::NoLongerMatching => {
            format!("❌ {} no longer matches [{}]", instrument, interval)
        }
        ExitReason::LeftUniverse => {
            format!("❌ {} left the screened universe [{}]", instrument, interval)
        }
    }
}

pub fn no_matches_message(universe_size: usize, interval: Interval) -> String {
    format!(
        "No instruments match your rules ({} screened, {}).",
        universe_size, interval
    )
}

/// Full snapshot dump for a one-off query.
pub fn snapshot_report(snapshot: &IndicatorSnapshot, interval: Interval) -> String {
    let mut text = format!("📊 {} [{}]", snapshot.instrument, interval);
    if !snapshot.summary.is_empty() {
        let _ = write!(text, "\nSummary: {}", snapshot.summary);
    }
    for (name, value) in snapshot.indicators() {
        let _ = write!(text, "\n{} = {}", name, format_value(Some(value)));
    }
    let _ = write!(
        text,
        "\nFetched {}",
        snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    text
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.2}", v),
        Some(_) | None => "n/a".to_string(),
    }
}
