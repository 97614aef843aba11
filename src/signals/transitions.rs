//! Edge-triggered match tracking.
//!
//! A `MatchTracker` belongs to exactly one session's screener task. It keeps
//! the last known match result and the last successful snapshot of every
//! instrument, and reports only the false→true and true→false edges.

use crate::models::{IndicatorSnapshot, Instrument, Interval, RuleSet};
use crate::strategies::RuleEvaluator;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The rules stopped holding.
    NoLongerMatching,
    /// The instrument dropped out of the universe while matching.
    LeftUniverse,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Entered {
        instrument: Instrument,
        snapshot: Arc<IndicatorSnapshot>,
    },
    Exited {
        instrument: Instrument,
        reason: ExitReason,
        snapshot: Option<Arc<IndicatorSnapshot>>,
    },
}

impl Transition {
    pub fn instrument(&self) -> &Instrument {
        match self {
            Transition::Entered { instrument, .. } | Transition::Exited { instrument, .. } => {
                instrument
            }
        }
    }

    pub fn is_entered(&self) -> bool {
        matches!(self, Transition::Entered { .. })
    }
}

#[derive(Debug, Default)]
pub struct MatchTracker {
    matches: HashMap<Instrument, bool>,
    previous: HashMap<Instrument, Arc<IndicatorSnapshot>>,
    interval: Option<Interval>,
}

impl MatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interval of the snapshots about to be observed. Switching
    /// interval drops the previous snapshots, since a crossover must compare
    /// two points of the same series. Match results are kept.
    pub fn use_interval(&mut self, interval: Interval) {
        if self.interval.is_some_and(|current| current != interval) {
            self.previous.clear();
        }
        self.interval = Some(interval);
    }

    /// Forget every instrument absent from `universe`. Those that were
    /// matching produce one `Exited` each.
    pub fn retain_universe(&mut self, universe: &[Instrument]) -> Vec<Transition> {
        let current: HashSet<&Instrument> = universe.iter().collect();

        let mut departed: Vec<Instrument> = self
            .matches
            .keys()
            .chain(self.previous.keys())
            .filter(|instrument| !current.contains(instrument))
            .cloned()
            .collect();
        departed.sort();
        departed.dedup();

        let mut transitions = Vec::new();
        for instrument in departed {
            let snapshot = self.previous.remove(&instrument);
            if self.matches.remove(&instrument) == Some(true) {
                transitions.push(Transition::Exited {
                    instrument,
                    reason: ExitReason::LeftUniverse,
                    snapshot,
                });
            }
        }
        transitions
    }

    /// Evaluate a freshly fetched snapshot against the instrument's previous
    /// one and record the result. Returns the edge, if any.
    pub fn observe(
        &mut self,
        rules: &RuleSet,
        snapshot: Arc<IndicatorSnapshot>,
    ) -> Option<Transition> {
        let instrument = snapshot.instrument.clone();
        let previous = self.previous.get(&instrument).map(Arc::as_ref);
        let matched = RuleEvaluator::evaluate(rules, &snapshot, previous);
        let was_matching = self.matches.insert(instrument.clone(), matched).unwrap_or(false);
        self.previous.insert(instrument.clone(), Arc::clone(&snapshot));

        match (was_matching, matched) {
            (false, true) => Some(Transition::Entered {
                instrument,
                snapshot,
            }),
            (true, false) => Some(Transition::Exited {
                instrument,
                reason: ExitReason::NoLongerMatching,
                snapshot: Some(snapshot),
            }),
            _ => None,
        }
    }

    pub fn is_matching(&self, instrument: &Instrument) -> bool {
        self.matches.get(instrument).copied().unwrap_or(false)
    }

    pub fn matching_count(&self) -> usize {
        self.matches.values().filter(|m| **m).count()
    }

    /// Instruments currently matching, sorted.
    pub fn matching(&self) -> Vec<&Instrument> {
        let mut matching: Vec<&Instrument> = self
            .matches
            .iter()
            .filter_map(|(instrument, matched)| matched.then_some(instrument))
            .collect();
        matching.sort();
        matching
    }

    pub fn clear(&mut self) {
        self.matches.clear();
        self.previous.clear();
        self.interval = None;
    }
}
