//! Request-level orchestration shared by the web adapter and the CLI.
//!
//! The domain stays pure; everything that touches providers, the store
//! or wall-clock time funnels through here so both entry points behave
//! identically.

use crate::adapters::binance;
use crate::domain::definition::StrategyDefinition;
use crate::domain::error::StratlabError;
use crate::domain::forward::evaluate_latest;
use crate::domain::metrics::Summary;
use crate::domain::simulator::{simulate, EquityPoint, Trade};
use crate::ports::bar_port::{BarBatch, BarSeriesPort};
use crate::ports::store_port::{InsertOutcome, NewSignal, SignalStorePort};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

pub const DEFAULT_SYMBOL: &str = "BTCUSDT";
pub const DEFAULT_TIMEFRAME: &str = "1h";
pub const DEFAULT_INITIAL_CAPITAL: f64 = 1000.0;

/// Backtests refuse to run on fewer bars than this.
pub const MIN_BACKTEST_BARS: usize = 50;
/// Window fetched for a forward evaluation.
pub const FORWARD_FETCH_BARS: usize = 300;

const MIN_BARS_LIMIT: i64 = 200;
const MAX_BARS_LIMIT: i64 = 1500;
const DEFAULT_BARS_LIMIT: i64 = 1000;

const MIN_MARKET_LIMIT: i64 = 50;
const MAX_MARKET_LIMIT: i64 = 1500;
const DEFAULT_MARKET_LIMIT: i64 = 500;

const MIN_FREQUENCY_SECONDS: i64 = 60;
const MAX_FREQUENCY_SECONDS: i64 = 3600;
const DEFAULT_FREQUENCY_SECONDS: i64 = 300;

/// Uppercases and strips pair separators; an empty symbol falls back
/// to the default market.
pub fn normalize_symbol(raw: &str) -> String {
    let s: String = raw.trim().to_uppercase().replace(['-', '/'], "");
    if s.is_empty() {
        DEFAULT_SYMBOL.to_string()
    } else {
        s
    }
}

fn normalize_timeframe(raw: Option<&str>) -> String {
    match raw {
        Some(tf) if !tf.trim().is_empty() => tf.trim().to_string(),
        _ => DEFAULT_TIMEFRAME.to_string(),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestRequest {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub definition: Option<Value>,
    #[serde(default)]
    pub initial_capital: Option<f64>,
    #[serde(default)]
    pub bars_limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestResponse {
    pub symbol: String,
    /// The interval actually requested upstream, not the raw input.
    pub timeframe: String,
    #[serde(rename = "initialCapital")]
    pub initial_capital: f64,
    #[serde(flatten)]
    pub summary: Summary,
    pub trades: Vec<Trade>,
    pub equity: Vec<EquityPoint>,
}

pub async fn run_backtest(
    bars: &(dyn BarSeriesPort + Send + Sync),
    request: BacktestRequest,
) -> Result<BacktestResponse, StratlabError> {
    let symbol = normalize_symbol(request.symbol.as_deref().unwrap_or(""));
    let timeframe = normalize_timeframe(request.timeframe.as_deref());
    let interval = binance::normalize_interval(&timeframe);

    let definition_value = request.definition.ok_or_else(|| StratlabError::Definition {
        reason: "missing definition in request body".to_string(),
    })?;
    let definition = StrategyDefinition::from_value(&definition_value)?;

    let initial_capital = request
        .initial_capital
        .unwrap_or(DEFAULT_INITIAL_CAPITAL);
    let limit = request
        .bars_limit
        .unwrap_or(DEFAULT_BARS_LIMIT)
        .clamp(MIN_BARS_LIMIT, MAX_BARS_LIMIT) as usize;

    let batch = bars.fetch_bars(&symbol, &timeframe, limit).await?;
    if batch.bars.len() < MIN_BACKTEST_BARS {
        return Err(StratlabError::InsufficientBars {
            have: batch.bars.len(),
            need: MIN_BACKTEST_BARS,
        });
    }

    info!(
        symbol,
        timeframe = interval,
        provider = batch.provider,
        bars = batch.bars.len(),
        "running backtest"
    );

    let report = simulate(&batch.bars, &definition, initial_capital)?;

    Ok(BacktestResponse {
        symbol,
        timeframe: interval.to_string(),
        initial_capital,
        summary: report.summary,
        trades: report.trades,
        equity: report.equity,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketBarsRequest {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn fetch_market_bars(
    bars: &(dyn BarSeriesPort + Send + Sync),
    request: MarketBarsRequest,
) -> Result<BarBatch, StratlabError> {
    let symbol = normalize_symbol(request.symbol.as_deref().unwrap_or(""));
    let timeframe = normalize_timeframe(request.timeframe.as_deref());
    let limit = request
        .limit
        .unwrap_or(DEFAULT_MARKET_LIMIT)
        .clamp(MIN_MARKET_LIMIT, MAX_MARKET_LIMIT) as usize;

    bars.fetch_bars(&symbol, &timeframe, limit).await
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepError {
    pub strategy_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub processed: usize,
    pub skipped: usize,
    pub inserted: usize,
    pub errors: Vec<SweepError>,
}

impl SweepReport {
    pub fn to_json(&self) -> Value {
        json!({
            "ok": true,
            "processed": self.processed,
            "skipped": self.skipped,
            "inserted": self.inserted,
            "errorsCount": self.errors.len(),
            "errors": self.errors,
        })
    }
}

fn clamp_frequency(raw: i64) -> i64 {
    let freq = if raw > 0 { raw } else { DEFAULT_FREQUENCY_SECONDS };
    freq.clamp(MIN_FREQUENCY_SECONDS, MAX_FREQUENCY_SECONDS)
}

/// Evaluates every enabled forward config that is due. One strategy's
/// failure is recorded against that strategy and never aborts the rest
/// of the sweep.
pub async fn run_forward_sweep(
    bars: &(dyn BarSeriesPort + Send + Sync),
    store: &(dyn SignalStorePort + Send + Sync),
    now_ms: i64,
) -> Result<SweepReport, StratlabError> {
    let configs = store.list_enabled_forward_configs()?;
    let mut report = SweepReport::default();

    for cfg in configs {
        let freq = clamp_frequency(cfg.frequency_seconds);
        let last = cfg.last_checked_at.unwrap_or(0);
        if last > 0 && now_ms - last < freq * 1000 {
            report.skipped += 1;
            continue;
        }

        sweep_one(bars, store, &cfg.strategy_id, now_ms, &mut report).await;
    }

    Ok(report)
}

/// On-demand evaluation of one strategy, ignoring its frequency gate and
/// enabled flag. Failures land in the report, never in a top-level error.
pub async fn run_forward_single(
    bars: &(dyn BarSeriesPort + Send + Sync),
    store: &(dyn SignalStorePort + Send + Sync),
    strategy_id: &str,
    now_ms: i64,
) -> SweepReport {
    let mut report = SweepReport::default();
    sweep_one(bars, store, strategy_id, now_ms, &mut report).await;
    report
}

async fn sweep_one(
    bars: &(dyn BarSeriesPort + Send + Sync),
    store: &(dyn SignalStorePort + Send + Sync),
    strategy_id: &str,
    now_ms: i64,
    report: &mut SweepReport,
) {
    match run_forward_for_strategy(bars, store, strategy_id).await {
        Ok(outcome) => {
            if outcome == Some(InsertOutcome::Inserted) {
                report.inserted += 1;
            }
            report.processed += 1;
            if let Err(e) = store.mark_checked(strategy_id, now_ms, None) {
                warn!(strategy = strategy_id, error = %e, "failed to record check");
            }
        }
        Err(e) => {
            let message = e.to_string();
            warn!(strategy = strategy_id, error = %message, "forward evaluation failed");
            if let Err(me) = store.mark_checked(strategy_id, now_ms, Some(&message)) {
                warn!(strategy = strategy_id, error = %me, "failed to record error");
            }
            report.errors.push(SweepError {
                strategy_id: strategy_id.to_string(),
                error: message,
            });
        }
    }
}

/// One forward evaluation: fetch a recent window, decide against the
/// last persisted signal, persist anything new. A duplicate insert is
/// success.
pub async fn run_forward_for_strategy(
    bars: &(dyn BarSeriesPort + Send + Sync),
    store: &(dyn SignalStorePort + Send + Sync),
    strategy_id: &str,
) -> Result<Option<InsertOutcome>, StratlabError> {
    let strategy = store.get_strategy(strategy_id)?;
    let symbol = normalize_symbol(&strategy.symbol);
    let timeframe = normalize_timeframe(Some(&strategy.timeframe));
    let definition = StrategyDefinition::from_json(&strategy.definition)?;

    let batch = bars.fetch_bars(&symbol, &timeframe, FORWARD_FETCH_BARS).await?;
    let last_signal = store.latest_signal(strategy_id)?.map(|s| s.signal_type);

    let Some(decision) = evaluate_latest(&batch.bars, &definition, last_signal)? else {
        return Ok(None);
    };

    let outcome = store.insert_signal(&NewSignal {
        strategy_id: strategy_id.to_string(),
        t: decision.t,
        signal_type: decision.signal,
        price: decision.price,
        meta: json!({
            "provider": batch.provider,
            "rsi": decision.rsi,
            "timeframe": timeframe,
        }),
    })?;

    info!(
        strategy = strategy_id,
        signal = decision.signal.as_str(),
        duplicate = outcome == InsertOutcome::Duplicate,
        "forward signal"
    );

    Ok(Some(outcome))
}
