//! Compiled rule AST: predicates over indicator values

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator of a `Predicate::Comparison`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Equal,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::GreaterThan => ">",
            CompareOp::LessThan => "<",
            CompareOp::GreaterOrEqual => ">=",
            CompareOp::LessOrEqual => "<=",
            CompareOp::Equal => "==",
        }
    }

    pub fn apply(&self, left: f64, right: f64) -> bool {
        if left.is_nan() || right.is_nan() {
            return false;
        }
        match self {
            CompareOp::GreaterThan => left > right,
            CompareOp::LessThan => left < right,
            CompareOp::GreaterOrEqual => left >= right,
            CompareOp::LessOrEqual => left <= right,
            CompareOp::Equal => left == right,
        }
    }
}

/// Direction of a crossover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossDirection {
    Up,
    Down,
}

impl CrossDirection {
    pub fn keyword(&self) -> &'static str {
        match self {
            CrossDirection::Up => "crossup",
            CrossDirection::Down => "crossdown",
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Literal(f64),
    Indicator(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(value) => write!(f, "{}", value),
            Operand::Indicator(name) => f.write_str(name),
        }
    }
}

/// A single boolean condition over a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Comparison {
        indicator: String,
        op: CompareOp,
        right: Operand,
    },
    Crossover {
        fast: String,
        slow: String,
        direction: CrossDirection,
    },
}

impl Predicate {
    /// Indicator names this predicate reads, in textual order.
    pub fn indicators(&self) -> Vec<&str> {
        match self {
            Predicate::Comparison {
                indicator, right, ..
            } => match right {
                Operand::Indicator(other) => vec![indicator.as_str(), other.as_str()],
                Operand::Literal(_) => vec![indicator.as_str()],
            },
            Predicate::Crossover { fast, slow, .. } => vec![fast.as_str(), slow.as_str()],
        }
    }

    pub fn is_crossover(&self) -> bool {
        matches!(self, Predicate::Crossover { .. })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Comparison {
                indicator,
                op,
                right,
            } => write!(f, "{} {} {}", indicator, op.symbol(), right),
            Predicate::Crossover {
                fast,
                slow,
                direction,
            } => write!(f, "{} {} {}", fast, direction.keyword(), slow),
        }
    }
}

/// Ordered conjunction of predicates. Never empty once compiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    predicates: Vec<Predicate>,
}

impl RuleSet {
    pub(crate) fn from_predicates(predicates: Vec<Predicate>) -> Self {
        Self { predicates }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Distinct indicator names referenced by any predicate, first use first.
    pub fn referenced_indicators(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.predicates.iter().flat_map(Predicate::indicators) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Canonical one-expression-per-entry text, accepted back by the compiler.
    pub fn canonical(&self) -> Vec<String> {
        self.predicates.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical().join("; "))
    }
}
