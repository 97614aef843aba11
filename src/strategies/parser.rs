//! Rule expression compiler.
//!
//! Each expression follows `IDENT op (IDENT | NUMBER)` where `op` is one of
//! `> < >= <= ==` or the keywords `crossup` / `crossdown`. Identifiers are
//! upper-cased. A list of expressions compiles atomically: the first bad
//! expression fails the whole list and no partial `RuleSet` is produced.

use crate::models::rule::{CompareOp, CrossDirection, Operand, Predicate, RuleSet};
use thiserror::Error;

/// Compilation failure with the offending expression and character offset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rule {} '{expression}': {message} (at position {position})", .index + 1)]
pub struct ParseError {
    pub index: usize,
    pub expression: String,
    pub position: usize,
    pub message: String,
}

impl ParseError {
    fn empty_list() -> Self {
        Self {
            index: 0,
            expression: String::new(),
            position: 0,
            message: "at least one rule is required".to_string(),
        }
    }
}

/// Compile a list of expressions into a `RuleSet`.
pub fn compile<S: AsRef<str>>(expressions: &[S]) -> Result<RuleSet, ParseError> {
    if expressions.is_empty() {
        return Err(ParseError::empty_list());
    }

    let predicates = expressions
        .iter()
        .enumerate()
        .map(|(index, expression)| {
            let expression = expression.as_ref();
            Parser::new(expression)
                .parse_predicate()
                .map_err(|(position, message)| ParseError {
                    index,
                    expression: expression.to_string(),
                    position,
                    message,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RuleSet::from_predicates(predicates))
}

/// Compile a single expression.
pub fn compile_one(expression: &str) -> Result<Predicate, ParseError> {
    let rules = compile(&[expression])?;
    // A one-element list compiles to exactly one predicate.
    Ok(rules.predicates()[0].clone())
}

enum Op {
    Compare(CompareOp),
    Cross(CrossDirection),
}

type Failure = (usize, String);

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.advance();
        }
    }

    fn fail<T>(&self, message: impl Into<String>) -> Result<T, Failure> {
        Err((self.pos, message.into()))
    }

    fn found(&self) -> String {
        self.peek()
            .map(|c| format!("'{}'", c))
            .unwrap_or_else(|| "end of input".to_string())
    }

    fn parse_predicate(&mut self) -> Result<Predicate, Failure> {
        self.skip_whitespace();
        if self.peek().is_none() {
            return self.fail("empty rule");
        }

        let left = self.parse_identifier()?;
        self.skip_whitespace();
        let op = self.parse_operator()?;
        self.skip_whitespace();

        let predicate = match op {
            Op::Compare(op) => Predicate::Comparison {
                indicator: left,
                op,
                right: self.parse_operand()?,
            },
            Op::Cross(direction) => {
                if !matches!(self.peek(), Some(ch) if is_ident_start(ch)) {
                    return self.fail(format!(
                        "{} needs an indicator on the right, found {}",
                        direction.keyword(),
                        self.found()
                    ));
                }
                Predicate::Crossover {
                    fast: left,
                    slow: self.parse_identifier()?,
                    direction,
                }
            }
        };

        self.skip_whitespace();
        if self.peek().is_some() {
            return self.fail(format!("unexpected trailing input {}", self.found()));
        }
        Ok(predicate)
    }

    fn parse_identifier(&mut self) -> Result<String, Failure> {
        match self.peek() {
            Some(ch) if is_ident_start(ch) => {}
            _ => return self.fail(format!("expected indicator name, found {}", self.found())),
        }
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if is_ident_char(ch)) {
            self.advance();
        }
        Ok(self.input[start..self.pos].to_ascii_uppercase())
    }

    fn parse_operator(&mut self) -> Result<Op, Failure> {
        const SYMBOLS: [(&str, CompareOp); 5] = [
            (">=", CompareOp::GreaterOrEqual),
            ("<=", CompareOp::LessOrEqual),
            ("==", CompareOp::Equal),
            (">", CompareOp::GreaterThan),
            ("<", CompareOp::LessThan),
        ];

        for (symbol, op) in SYMBOLS {
            if self.remaining().starts_with(symbol) {
                self.pos += symbol.len();
                return Ok(Op::Compare(op));
            }
        }

        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_alphabetic()) {
            self.advance();
        }
        let word = self.input[start..self.pos].to_ascii_lowercase();
        match word.as_str() {
            "crossup" => Ok(Op::Cross(CrossDirection::Up)),
            "crossdown" => Ok(Op::Cross(CrossDirection::Down)),
            "" => self.fail(format!("expected operator, found {}", self.found())),
            other => {
                self.pos = start;
                self.fail(format!("unknown operator '{}'", other))
            }
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, Failure> {
        match self.peek() {
            Some(ch) if is_ident_start(ch) => Ok(Operand::Indicator(self.parse_identifier()?)),
            Some(ch) if ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.') => {
                Ok(Operand::Literal(self.parse_number()?))
            }
            _ => self.fail(format!("expected number or indicator, found {}", self.found())),
        }
    }

    fn parse_number(&mut self) -> Result<f64, Failure> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.advance();
        }

        let mut digits = 0;
        let mut has_dot = false;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
            } else if ch == '.' && !has_dot {
                has_dot = true;
            } else {
                break;
            }
            self.advance();
        }

        if digits == 0 {
            self.pos = start;
            return self.fail("expected number");
        }
        if matches!(self.peek(), Some(ch) if is_ident_char(ch)) {
            return self.fail(format!("malformed number, unexpected {}", self.found()));
        }

        let text = &self.input[start..self.pos];
        match text.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err((start, format!("invalid number: {}", text))),
        }
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '|')
}
