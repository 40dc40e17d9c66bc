//! Long-only single-position backtest simulator.
//!
//! Replays a bar series against a strategy definition. At most one
//! position is ever open; entries are only considered while flat, and
//! exits are checked in a fixed priority order per bar:
//!
//! 1. stop-loss (bar low against the stop price)
//! 2. take-profit (bar high against the take price)
//! 3. signal exit (exit rule set at the close)
//!
//! Stop before take-profit is a conservative intrabar policy: when a bar's
//! range straddles both thresholds, OHLC data cannot tell which was hit
//! first, and the simulator assumes the worse outcome.
//!
//! Degenerate inputs (no bars, no trades, insufficient history) are valid
//! runs with degenerate outputs, never errors. The only error path is a
//! malformed definition. Output is fully determined by the inputs.

use serde::{Deserialize, Serialize};

use crate::domain::bar::{closes, Bar};
use crate::domain::definition::StrategyDefinition;
use crate::domain::error::StratlabError;
use crate::domain::indicator::rsi;
use crate::domain::metrics::Summary;
use crate::domain::rule_eval::{entry_satisfied, exit_satisfied};

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitReason {
    Stop,
    TakeProfit,
    Signal,
}

/// One completed round-trip. Field names follow the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(rename = "entryTime")]
    pub entry_time: i64,
    #[serde(rename = "entryPrice")]
    pub entry_price: f64,
    #[serde(rename = "exitTime")]
    pub exit_time: i64,
    #[serde(rename = "exitPrice")]
    pub exit_price: f64,
    pub qty: f64,
    pub pnl: f64,
    pub reason: ExitReason,
}

/// Mark-to-market account value at one bar: cash while flat, cash plus
/// quantity times close while in position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub t: i64,
    pub v: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub trades: Vec<Trade>,
    pub equity: Vec<EquityPoint>,
    pub summary: Summary,
}

/// First bar index at which entries and exits are evaluated. The floor of
/// 10 keeps very short periods from trading on a barely seeded series.
pub fn start_index(rsi_length: usize) -> usize {
    (rsi_length + 2).max(10)
}

struct OpenPosition {
    qty: f64,
    entry_price: f64,
    entry_time: i64,
}

impl OpenPosition {
    fn stop_price(&self, stop_loss_pct: f64) -> Option<f64> {
        if stop_loss_pct > 0.0 {
            Some(self.entry_price * (1.0 - stop_loss_pct / 100.0))
        } else {
            None
        }
    }

    fn take_price(&self, take_profit_pct: f64) -> Option<f64> {
        if take_profit_pct > 0.0 {
            Some(self.entry_price * (1.0 + take_profit_pct / 100.0))
        } else {
            None
        }
    }
}

/// Replay `bars` against `definition` starting from `initial_capital`.
pub fn simulate(
    bars: &[Bar],
    definition: &StrategyDefinition,
    initial_capital: f64,
) -> Result<BacktestReport, StratlabError> {
    let params = definition.params()?;
    let series = rsi(&closes(bars), params.rsi_length);

    let mut cash = initial_capital;
    let mut position: Option<OpenPosition> = None;
    let mut trades: Vec<Trade> = Vec::new();
    let mut equity: Vec<EquityPoint> = Vec::with_capacity(bars.len());

    let start = start_index(params.rsi_length);

    for (i, bar) in bars.iter().enumerate() {
        let held = position.as_ref().map_or(0.0, |p| p.qty);
        equity.push(EquityPoint { t: bar.t, v: cash + held * bar.c });

        if i < start {
            continue;
        }

        position = match position.take() {
            None => {
                if entry_satisfied(definition.entry_rules(), &series, i)
                    && params.fixed_quote <= cash
                {
                    let fill = bar.c * (1.0 + params.slip_rate);
                    cash -= params.fixed_quote + params.fixed_quote * params.fee_rate;
                    Some(OpenPosition {
                        qty: params.fixed_quote / fill,
                        entry_price: fill,
                        entry_time: bar.t,
                    })
                } else {
                    None
                }
            }
            Some(pos) => {
                let exit = if let Some(stop) = pos
                    .stop_price(params.stop_loss_pct)
                    .filter(|stop| bar.l <= *stop)
                {
                    Some((stop * (1.0 - params.slip_rate), ExitReason::Stop))
                } else if let Some(take) = pos
                    .take_price(params.take_profit_pct)
                    .filter(|take| bar.h >= *take)
                {
                    Some((take * (1.0 - params.slip_rate), ExitReason::TakeProfit))
                } else if exit_satisfied(definition.exit_rules(), &series, i) {
                    Some((bar.c * (1.0 - params.slip_rate), ExitReason::Signal))
                } else {
                    None
                };

                match exit {
                    Some((exit_price, reason)) => {
                        let proceeds = pos.qty * exit_price;
                        let entry_fee = params.fixed_quote * params.fee_rate;
                        let exit_fee = proceeds * params.fee_rate;
                        cash += proceeds - exit_fee;

                        trades.push(Trade {
                            entry_time: pos.entry_time,
                            entry_price: pos.entry_price,
                            exit_time: bar.t,
                            exit_price,
                            qty: pos.qty,
                            pnl: (exit_price - pos.entry_price) * pos.qty - entry_fee - exit_fee,
                            reason,
                        });
                        None
                    }
                    None => Some(pos),
                }
            }
        };
    }

    let summary = Summary::compute(&trades, &equity, initial_capital);
    Ok(BacktestReport {
        trades,
        equity,
        summary,
    })
}
