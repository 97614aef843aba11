//! Indicator timeframes a subscriber can screen on

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown interval '{0}' (expected one of: 1m 5m 15m 30m 1h 2h 4h 1d 1W 1M)")]
pub struct IntervalError(pub String);

/// Timeframe of the candles an indicator snapshot is computed over.
///
/// Codes are case-sensitive only where it matters: `1m` is one minute and
/// `1M` is one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Interval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    FourHours,
    OneDay,
    OneWeek,
    OneMonth,
}

impl Interval {
    pub const ALL: [Interval; 10] = [
        Interval::OneMinute,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::OneHour,
        Interval::TwoHours,
        Interval::FourHours,
        Interval::OneDay,
        Interval::OneWeek,
        Interval::OneMonth,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
            Interval::TwoHours => "2h",
            Interval::FourHours => "4h",
            Interval::OneDay => "1d",
            Interval::OneWeek => "1W",
            Interval::OneMonth => "1M",
        }
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval::OneHour
    }
}

impl FromStr for Interval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        let interval = match code {
            "1m" => Interval::OneMinute,
            "5m" => Interval::FiveMinutes,
            "15m" => Interval::FifteenMinutes,
            "30m" => Interval::ThirtyMinutes,
            "1h" | "1H" => Interval::OneHour,
            "2h" | "2H" => Interval::TwoHours,
            "4h" | "4H" => Interval::FourHours,
            "1d" | "1D" => Interval::OneDay,
            "1w" | "1W" => Interval::OneWeek,
            "1M" => Interval::OneMonth,
            _ => return Err(IntervalError(code.to_string())),
        };
        Ok(interval)
    }
}

impl TryFrom<String> for Interval {
    type Error = IntervalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(interval: Interval) -> Self {
        interval.code().to_string()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
