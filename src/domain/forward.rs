//! Incremental signal evaluation for forward testing.
//!
//! Unlike the simulator, the forward evaluator looks at one bar only: the
//! most recent one. Whether the strategy is currently in a position comes
//! entirely from the last persisted signal, never from in-process state.
//! That keeps concurrent or re-run evaluations harmless: two evaluations
//! of the same bar reach the same decision, and the storage uniqueness
//! constraint absorbs the duplicate insert.

use serde::{Deserialize, Serialize};

use crate::domain::bar::{closes, Bar};
use crate::domain::definition::StrategyDefinition;
use crate::domain::error::StratlabError;
use crate::domain::indicator::rsi;
use crate::domain::rule_eval::{entry_satisfied, exit_satisfied};

/// Fewest recent bars the evaluator will accept. Below this the indicator
/// window is too thin to trust, and the caller gets a hard error rather
/// than a silent "no signal".
pub const MIN_FORWARD_BARS: usize = 50;

/// Persisted signal kind. Serialized as the storage tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalType {
    #[serde(rename = "ENTRY")]
    Entry,
    #[serde(rename = "EXIT")]
    Exit,
}

impl SignalType {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::Entry => "ENTRY",
            SignalType::Exit => "EXIT",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "ENTRY" => Some(SignalType::Entry),
            "EXIT" => Some(SignalType::Exit),
            _ => None,
        }
    }
}

/// A new signal produced at the most recent bar, with the context the
/// caller persists alongside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalDecision {
    pub signal: SignalType,
    /// Bar open time of the evaluated bar, ms since epoch.
    pub t: i64,
    /// Close of the evaluated bar.
    pub price: f64,
    /// RSI value the decision was made on.
    pub rsi: f64,
}

/// Evaluate the most recent bar. Returns `Ok(None)` when there is nothing
/// to do: the indicator is still warming up, or no rule fired. Too few
/// bars is an error, distinct from the no-signal case.
pub fn evaluate_latest(
    bars: &[Bar],
    definition: &StrategyDefinition,
    last_signal: Option<SignalType>,
) -> Result<Option<SignalDecision>, StratlabError> {
    if bars.len() < MIN_FORWARD_BARS {
        return Err(StratlabError::InsufficientBars {
            have: bars.len(),
            need: MIN_FORWARD_BARS,
        });
    }

    let params = definition.params()?;
    let series = rsi(&closes(bars), params.rsi_length);

    let last = bars.len() - 1;
    let Some(value) = series[last] else {
        return Ok(None);
    };

    let in_position = last_signal == Some(SignalType::Entry);
    let signal = if in_position {
        if exit_satisfied(definition.exit_rules(), &series, last) {
            Some(SignalType::Exit)
        } else {
            None
        }
    } else if entry_satisfied(definition.entry_rules(), &series, last) {
        Some(SignalType::Entry)
    } else {
        None
    };

    Ok(signal.map(|signal| SignalDecision {
        signal,
        t: bars[last].t,
        price: bars[last].c,
        rsi: value,
    }))
}
