//! Rule set evaluation against indicator snapshots

use crate::models::rule::{CrossDirection, Operand, Predicate, RuleSet};
use crate::models::snapshot::IndicatorSnapshot;

pub struct RuleEvaluator;

impl RuleEvaluator {
    /// True when every predicate holds. Stops at the first false one.
    ///
    /// `previous` is the instrument's last successfully fetched snapshot;
    /// without it no crossover can match.
    pub fn evaluate(
        rules: &RuleSet,
        current: &IndicatorSnapshot,
        previous: Option<&IndicatorSnapshot>,
    ) -> bool {
        rules
            .predicates()
            .iter()
            .all(|predicate| Self::evaluate_predicate(predicate, current, previous))
    }

    pub fn evaluate_predicate(
        predicate: &Predicate,
        current: &IndicatorSnapshot,
        previous: Option<&IndicatorSnapshot>,
    ) -> bool {
        match predicate {
            Predicate::Comparison {
                indicator,
                op,
                right,
            } => {
                let (Some(left), Some(right)) = (current.get(indicator), resolve(right, current))
                else {
                    return false;
                };
                op.apply(left, right)
            }
            Predicate::Crossover {
                fast,
                slow,
                direction,
            } => {
                let Some(previous) = previous else {
                    return false;
                };
                let values = (
                    previous.get(fast),
                    previous.get(slow),
                    current.get(fast),
                    current.get(slow),
                );
                let (Some(prev_fast), Some(prev_slow), Some(cur_fast), Some(cur_slow)) = values
                else {
                    return false;
                };
                if [prev_fast, prev_slow, cur_fast, cur_slow]
                    .iter()
                    .any(|v| v.is_nan())
                {
                    return false;
                }
                match direction {
                    CrossDirection::Up => prev_fast <= prev_slow && cur_fast > cur_slow,
                    CrossDirection::Down => prev_fast >= prev_slow && cur_fast < cur_slow,
                }
            }
        }
    }
}

fn resolve(operand: &Operand, snapshot: &IndicatorSnapshot) -> Option<f64> {
    match operand {
        Operand::Literal(value) => Some(*value),
        Operand::Indicator(name) => snapshot.get(name),
    }
}
