//! Persistence port trait: strategies, signals, forward configurations.

use crate::domain::error::StratlabError;
use crate::domain::forward::SignalType;

/// A stored strategy. The definition is kept as raw JSON and parsed at
/// the point of use, so one malformed strategy fails only its own
/// evaluation rather than every read of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRecord {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub timeframe: String,
    pub definition: String,
}

/// A persisted signal row.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRecord {
    pub id: i64,
    pub strategy_id: String,
    /// Bar open time the signal was decided on, ms since epoch.
    pub t: i64,
    pub signal_type: SignalType,
    pub price: f64,
    /// Provider, RSI value and timeframe at decision time.
    pub meta: Option<serde_json::Value>,
    pub created_at: i64,
}

/// A signal about to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSignal {
    pub strategy_id: String,
    pub t: i64,
    pub signal_type: SignalType,
    pub price: f64,
    pub meta: serde_json::Value,
}

/// Outcome of a signal insert. A duplicate is a benign no-op: the
/// uniqueness constraint on (strategy, bar time, type) is how concurrent
/// sweeps stay idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Per-strategy forward-testing switch and bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardConfigRecord {
    pub strategy_id: String,
    pub enabled: bool,
    pub frequency_seconds: i64,
    pub last_checked_at: Option<i64>,
    pub last_error: Option<String>,
    pub updated_at: i64,
}

pub trait SignalStorePort {
    fn put_strategy(&self, record: &StrategyRecord) -> Result<(), StratlabError>;
    fn get_strategy(&self, id: &str) -> Result<StrategyRecord, StratlabError>;
    fn list_strategies(&self) -> Result<Vec<StrategyRecord>, StratlabError>;

    fn insert_signal(&self, signal: &NewSignal) -> Result<InsertOutcome, StratlabError>;
    fn latest_signal(&self, strategy_id: &str) -> Result<Option<SignalRecord>, StratlabError>;
    /// Signals newest-first, optionally restricted to one strategy.
    fn list_signals(&self, strategy_id: Option<&str>) -> Result<Vec<SignalRecord>, StratlabError>;

    fn upsert_forward_config(
        &self,
        strategy_id: &str,
        enabled: bool,
        frequency_seconds: i64,
    ) -> Result<(), StratlabError>;
    fn get_forward_config(
        &self,
        strategy_id: &str,
    ) -> Result<Option<ForwardConfigRecord>, StratlabError>;
    fn list_enabled_forward_configs(&self) -> Result<Vec<ForwardConfigRecord>, StratlabError>;
    /// Record the outcome of one evaluation pass, success or failure.
    fn mark_checked(
        &self,
        strategy_id: &str,
        checked_at: i64,
        error: Option<&str>,
    ) -> Result<(), StratlabError>;
}
