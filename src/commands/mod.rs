//! Text command decoding and dispatch

pub mod dispatcher;

pub use dispatcher::CommandDispatcher;

use crate::models::{Instrument, InstrumentError, Interval, IntervalError};
use crate::strategies::ParseError;
use thiserror::Error;

/// A decoded subscriber command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    SetRules(Vec<String>),
    ClearRules,
    SetInterval(Interval),
    Query(Instrument),
    Status,
    Help,
}

/// Everything that can be wrong with a command before it reaches a session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("{command} needs {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },
    #[error("invalid rules: {0}")]
    Rules(#[from] ParseError),
    #[error(transparent)]
    Interval(#[from] IntervalError),
    #[error("invalid instrument: {0}")]
    Instrument(#[from] InstrumentError),
}

impl Command {
    /// Decode one message. Text that is not a command asks for help.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let text = text.trim();
        let Some(body) = text.strip_prefix('/') else {
            return Ok(Command::Help);
        };

        let (head, args) = match body.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (body, ""),
        };
        // Group chats address commands as /start@SomeBot.
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();

        match name.as_str() {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "clear" => Ok(Command::ClearRules),
            "status" => Ok(Command::Status),
            "help" => Ok(Command::Help),
            "rules" => {
                let rules = split_rules(args);
                if rules.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "/rules",
                        what: "at least one rule, e.g. /rules RSI>60; EMA5 crossup EMA20",
                    });
                }
                Ok(Command::SetRules(rules))
            }
            "interval" => {
                if args.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "/interval",
                        what: "a code, e.g. /interval 4h",
                    });
                }
                Ok(Command::SetInterval(args.parse()?))
            }
            "query" => {
                if args.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "/query",
                        what: "an instrument, e.g. /query BINANCE:BTCUSDT",
                    });
                }
                Ok(Command::Query(args.parse()?))
            }
            _ => Err(CommandError::Unknown(format!("/{}", name))),
        }
    }
}

/// Rule expressions are separated by `;`, `,` or line breaks.
fn split_rules(args: &str) -> Vec<String> {
    args.split([';', ',', '\n'])
        .map(str::trim)
        .filter(|rule| !rule.is_empty())
        .map(str::to_string)
        .collect()
}
