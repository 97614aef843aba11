//! Rule compilation and evaluation through the public API

use screener_bot::models::{IndicatorSnapshot, Instrument, Predicate};
use screener_bot::strategies::{compile, RuleEvaluator};

fn snapshot(values: &[(&str, f64)]) -> IndicatorSnapshot {
    let instrument: Instrument = "NASDAQ:AAPL".parse().unwrap();
    IndicatorSnapshot::new(instrument, values.iter().copied(), "NEUTRAL")
}

#[test]
fn conjunction_of_comparisons() {
    let rules = compile(&["RSI>60", "RSI<90", "EMA50>5000"]).unwrap();

    assert!(RuleEvaluator::evaluate(
        &rules,
        &snapshot(&[("RSI", 65.0), ("EMA50", 5200.0)]),
        None
    ));
    assert!(!RuleEvaluator::evaluate(
        &rules,
        &snapshot(&[("RSI", 95.0), ("EMA50", 5200.0)]),
        None
    ));
}

#[test]
fn crossover_up_against_previous_observation() {
    let rules = compile(&["EMA5 crossup EMA20"]).unwrap();
    let previous = snapshot(&[("EMA5", 10.0), ("EMA20", 12.0)]);

    assert!(RuleEvaluator::evaluate(
        &rules,
        &snapshot(&[("EMA5", 13.0), ("EMA20", 12.0)]),
        Some(&previous)
    ));
    assert!(!RuleEvaluator::evaluate(
        &rules,
        &snapshot(&[("EMA5", 11.0), ("EMA20", 12.0)]),
        Some(&previous)
    ));
}

#[test]
fn crossover_down_is_the_mirror() {
    let rules = compile(&["ema5 CROSSDOWN ema20"]).unwrap();
    let previous = snapshot(&[("EMA5", 13.0), ("EMA20", 12.0)]);

    assert!(RuleEvaluator::evaluate(
        &rules,
        &snapshot(&[("EMA5", 11.0), ("EMA20", 12.0)]),
        Some(&previous)
    ));
    assert!(!RuleEvaluator::evaluate(
        &rules,
        &snapshot(&[("EMA5", 12.5), ("EMA20", 12.0)]),
        Some(&previous)
    ));
}

#[test]
fn crossover_never_matches_without_history() {
    let rules = compile(&["EMA5 crossup EMA20"]).unwrap();
    for (fast, slow) in [(13.0, 12.0), (1.0, 100.0), (12.0, 12.0)] {
        assert!(!RuleEvaluator::evaluate(
            &rules,
            &snapshot(&[("EMA5", fast), ("EMA20", slow)]),
            None
        ));
    }
}

#[test]
fn indicator_on_the_right_hand_side() {
    let rules = compile(&["CLOSE >= EMA200"]).unwrap();
    assert!(RuleEvaluator::evaluate(
        &rules,
        &snapshot(&[("close", 200.0), ("ema200", 200.0)]),
        None
    ));
    assert!(
        !RuleEvaluator::evaluate(&rules, &snapshot(&[("CLOSE", 200.0)]), None),
        "missing right operand is a non-match"
    );
}

#[test]
fn nan_operands_never_match() {
    let rules = compile(&["RSI < 90"]).unwrap();
    assert!(!RuleEvaluator::evaluate(
        &rules,
        &snapshot(&[("RSI", f64::NAN)]),
        None
    ));
}

#[test]
fn canonical_text_is_a_fixed_point() {
    let sources = [
        vec!["rsi>60", "Rsi <= 90.5", "ema50==5000"],
        vec!["EMA5 crossUp EMA20", "MACD.macd > MACD.signal"],
        vec!["close > -1.25"],
    ];

    for source in sources {
        let first = compile(&source).unwrap();
        let canonical = first.canonical();
        let second = compile(&canonical).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.canonical(), canonical);
    }
}

#[test]
fn one_bad_expression_rejects_the_list() {
    let err = compile(&["RSI>60", "RSI >> 90", "EMA50>5000"]).unwrap_err();
    assert_eq!(err.index, 1);
    assert_eq!(err.expression, "RSI >> 90");

    for bad in ["", "RSI", "> 60", "RSI > ", "RSI crossup 5", "RSI > 60 extra", "1RSI > 3"] {
        assert!(compile(&[bad]).is_err(), "'{}' should not compile", bad);
    }
}

#[test]
fn referenced_indicators_are_distinct() {
    let rules = compile(&["RSI>60", "RSI<90", "EMA5 crossup EMA20", "EMA5 > 0"]).unwrap();
    assert_eq!(rules.referenced_indicators(), vec!["RSI", "EMA5", "EMA20"]);
    assert!(rules.predicates()[2].is_crossover());
    assert!(matches!(rules.predicates()[0], Predicate::Comparison { .. }));
}
