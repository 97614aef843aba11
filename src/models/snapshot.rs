//! Fetched indicator values for one instrument at one point in time

use crate::models::instrument::Instrument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable set of indicator values plus the provider's recommendation.
///
/// Indicator names are stored upper-cased so rule identifiers, which are
/// case-normalized at compile time, resolve regardless of how the provider
/// spells them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub instrument: Instrument,
    indicators: BTreeMap<String, f64>,
    pub summary: String,
    pub fetched_at: DateTime<Utc>,
}

impl IndicatorSnapshot {
    pub fn new<I, K>(instrument: Instrument, indicators: I, summary: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        Self {
            instrument,
            indicators: indicators
                .into_iter()
                .map(|(name, value)| (normalize_name(name.as_ref()), value))
                .collect(),
            summary: summary.into(),
            fetched_at: Utc::now(),
        }
    }

    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    /// Look up an indicator by (case-insensitive) name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.indicators.get(&normalize_name(name)).copied()
    }

    pub fn indicators(&self) -> impl Iterator<Item = (&str, f64)> {
        self.indicators.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }
}

pub(crate) fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}
