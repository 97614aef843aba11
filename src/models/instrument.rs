//! Exchange-qualified instrument identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstrumentError {
    #[error("instrument '{0}' must look like EXCHANGE:SYMBOL")]
    MissingExchange(String),

    #[error("instrument '{0}' has an empty exchange or symbol")]
    EmptyPart(String),

    #[error("instrument '{0}' contains whitespace")]
    Whitespace(String),
}

/// A tradable symbol qualified by its exchange, e.g. `BINANCE:BTCUSDT`.
///
/// Both halves are upper-cased on parse so that `binance:btcusdt` and
/// `BINANCE:BTCUSDT` refer to the same cache entry and match state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Instrument {
    exchange: String,
    symbol: String,
}

impl Instrument {
    pub fn new(exchange: &str, symbol: &str) -> Result<Self, InstrumentError> {
        format!("{}:{}", exchange, symbol).parse()
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl FromStr for Instrument {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.chars().any(char::is_whitespace) {
            return Err(InstrumentError::Whitespace(trimmed.to_string()));
        }
        let (exchange, symbol) = trimmed
            .split_once(':')
            .ok_or_else(|| InstrumentError::MissingExchange(trimmed.to_string()))?;
        if exchange.is_empty() || symbol.is_empty() || symbol.contains(':') {
            return Err(InstrumentError::EmptyPart(trimmed.to_string()));
        }
        Ok(Self {
            exchange: exchange.to_ascii_uppercase(),
            symbol: symbol.to_ascii_uppercase(),
        })
    }
}

impl TryFrom<String> for Instrument {
    type Error = InstrumentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Instrument> for String {
    fn from(instrument: Instrument) -> Self {
        instrument.to_string()
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}
