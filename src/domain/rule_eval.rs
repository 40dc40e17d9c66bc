//! Rule evaluation against an indicator series.
//!
//! # Evaluation semantics
//!
//! - A rule evaluates at one bar index against the pre-computed series
//! - Unavailable indicator value (warm-up) → `false`, never an error
//! - Unrecognized rule type or indicator name → `false`
//! - Entry groups are conjunctions: every rule must hold, and an empty
//!   group never enters
//! - Exit groups are disjunctions: one holding rule is enough, and an
//!   empty group never exits

use crate::domain::rule::Rule;

/// Evaluate a single rule at `index`. Returns `false` for anything the
/// engine cannot interpret rather than failing the whole run.
pub fn evaluate(rule: &Rule, series: &[Option<f64>], index: usize) -> bool {
    if !rule.is_rsi() {
        return false;
    }
    match series.get(index) {
        Some(Some(value)) => rule.comparison().apply(*value, rule.threshold()),
        _ => false,
    }
}

/// True when every entry rule holds at `index`. Empty → never.
pub fn entry_satisfied(rules: &[Rule], series: &[Option<f64>], index: usize) -> bool {
    if rules.is_empty() {
        return false;
    }
    rules.iter().all(|r| evaluate(r, series, index))
}

/// True when at least one exit rule holds at `index`. Empty → never.
pub fn exit_satisfied(rules: &[Rule], series: &[Option<f64>], index: usize) -> bool {
    rules.iter().any(|r| evaluate(r, series, index))
}
