//! Declarative rule data structures.
//!
//! Rules arrive as JSON from the strategy builder:
//!
//! ```json
//! { "type": "indicator", "name": "RSI", "length": 14, "source": "close",
//!   "op": "<", "value": 30 }
//! ```
//!
//! Deserialization is deliberately tolerant: unknown `type`/`name` values
//! parse fine and simply never match during evaluation, and a missing or
//! unrecognized operator falls back to `<`. Out-of-range periods are
//! clamped to the supported range at evaluation time.

use serde::{Deserialize, Serialize};

use crate::domain::indicator::{clamp_rsi_length, DEFAULT_RSI_LENGTH};

/// Comparison operators a rule may use against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

/// Tolerance for `==`/`!=` on computed indicator values.
pub const EPSILON: f64 = 1e-9;

impl ComparisonOp {
    /// Parse an operator token. Unrecognized or empty input falls back to
    /// `<`, the documented default for indicator rules.
    pub fn parse_lossy(token: &str) -> Self {
        match token.trim() {
            "<" => ComparisonOp::Lt,
            "<=" => ComparisonOp::Le,
            ">" => ComparisonOp::Gt,
            ">=" => ComparisonOp::Ge,
            "==" => ComparisonOp::Eq,
            "!=" => ComparisonOp::Ne,
            _ => ComparisonOp::Lt,
        }
    }

    pub fn apply(self, left: f64, right: f64) -> bool {
        match self {
            ComparisonOp::Lt => left < right,
            ComparisonOp::Le => left <= right,
            ComparisonOp::Gt => left > right,
            ComparisonOp::Ge => left >= right,
            ComparisonOp::Eq => (left - right).abs() < EPSILON,
            ComparisonOp::Ne => (left - right).abs() >= EPSILON,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Eq => "==",
            ComparisonOp::Ne => "!=",
        }
    }
}

/// One comparison rule as stored in a strategy definition. Only
/// `type: "indicator"` with `name: "RSI"` is evaluated today; anything
/// else deserializes but never fires.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// Threshold used when a rule omits `value`.
pub const DEFAULT_THRESHOLD: f64 = 50.0;

impl Rule {
    /// True when this rule targets the RSI indicator (the name match is
    /// case-insensitive, as builder exports have varied over time).
    pub fn is_rsi(&self) -> bool {
        self.kind == "indicator" && self.name.eq_ignore_ascii_case("RSI")
    }

    /// The rule's period, defaulted and clamped to the supported range.
    pub fn effective_length(&self) -> usize {
        match self.length {
            Some(raw) => clamp_rsi_length(raw),
            None => DEFAULT_RSI_LENGTH,
        }
    }

    pub fn comparison(&self) -> ComparisonOp {
        ComparisonOp::parse_lossy(self.op.as_deref().unwrap_or(""))
    }

    pub fn threshold(&self) -> f64 {
        self.value.unwrap_or(DEFAULT_THRESHOLD)
    }
}

/// Entry and exit rule groups. Entry is a conjunction (`all`), exit a
/// disjunction (`any`): entries require every confirmation, while any
/// single exit condition is enough to de-risk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSets {
    #[serde(default)]
    pub entry: EntryRules,
    #[serde(default)]
    pub exit: ExitRules,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryRules {
    #[serde(default)]
    pub all: Vec<Rule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExitRules {
    #[serde(default)]
    pub any: Vec<Rule>,
}

impl RuleSets {
    /// All rules, entry first. Used to locate the strategy's RSI period.
    pub fn iter_all(&self) -> impl Iterator<Item = &Rule> {
        self.entry.all.iter().chain(self.exit.any.iter())
    }
}
