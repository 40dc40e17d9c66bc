//! Summary statistics over a completed simulation.

use serde::{Deserialize, Serialize};

use crate::domain::simulator::{EquityPoint, Trade};

/// Aggregate outcome of one backtest run. Field names follow the wire
/// contract of the backtest response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(rename = "finalEquity")]
    pub final_equity: f64,
    #[serde(rename = "totalReturn")]
    pub total_return: f64,
    #[serde(rename = "maxDrawdown")]
    pub max_drawdown: f64,
    #[serde(rename = "tradesCount")]
    pub trades_count: usize,
    pub wins: usize,
    pub losses: usize,
    #[serde(rename = "winRate")]
    pub win_rate: f64,
    /// Gross profit over gross loss. `None` (wire `null`) when there are
    /// no losing trades, since the ratio is meaningless rather than
    /// infinite.
    #[serde(rename = "profitFactor")]
    pub profit_factor: Option<f64>,
}

impl Summary {
    pub fn compute(trades: &[Trade], equity: &[EquityPoint], initial_capital: f64) -> Self {
        let final_equity = equity.last().map(|p| p.v).unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut gross_win = 0.0_f64;
        let mut gross_loss = 0.0_f64;

        for trade in trades {
            if trade.pnl >= 0.0 {
                wins += 1;
                gross_win += trade.pnl;
            } else {
                losses += 1;
                gross_loss += -trade.pnl;
            }
        }

        let win_rate = if trades.is_empty() {
            0.0
        } else {
            wins as f64 / trades.len() as f64
        };

        let profit_factor = if gross_loss > 0.0 {
            Some(gross_win / gross_loss)
        } else {
            None
        };

        Summary {
            final_equity,
            total_return,
            max_drawdown: max_drawdown(equity.iter().map(|p| p.v)),
            trades_count: trades.len(),
            wins,
            losses,
            win_rate,
            profit_factor,
        }
    }
}

/// Greatest peak-to-trough relative decline over an equity series.
/// Drawdown is only measured against a positive running peak.
pub fn max_drawdown(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut iter = values.into_iter();
    let Some(first) = iter.next() else {
        return 0.0;
    };

    let mut peak = first;
    let mut mdd = dd_against(peak, first);
    for x in iter {
        if x > peak {
            peak = x;
        }
        let dd = dd_against(peak, x);
        if dd > mdd {
            mdd = dd;
        }
    }
    mdd
}

fn dd_against(peak: f64, x: f64) -> f64 {
    if peak > 0.0 { (peak - x) / peak } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::simulator::ExitReason;
    use approx::assert_abs_diff_eq;

    fn trade(pnl: f64) -> Trade {
        Trade {
            entry_time: 0,
            entry_price: 100.0,
            exit_time: 1000,
            exit_price: 100.0,
            qty: 1.0,
            pnl,
            reason: ExitReason::Signal,
        }
    }

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| EquityPoint { t: i as i64 * 1000, v: *v })
            .collect()
    }

    #[test]
    fn empty_run_keeps_initial_capital() {
        let s = Summary::compute(&[], &[], 1000.0);
        assert_abs_diff_eq!(s.final_equity, 1000.0);
        assert_abs_diff_eq!(s.total_return, 0.0);
        assert_abs_diff_eq!(s.max_drawdown, 0.0);
        assert_eq!(s.trades_count, 0);
        assert_abs_diff_eq!(s.win_rate, 0.0);
        assert_eq!(s.profit_factor, None);
    }

    #[test]
    fn total_return_from_final_equity() {
        let s = Summary::compute(&[], &curve(&[1000.0, 1100.0]), 1000.0);
        assert_abs_diff_eq!(s.total_return, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn zero_initial_capital_reports_zero_return() {
        let s = Summary::compute(&[], &curve(&[0.0, 50.0]), 0.0);
        assert_abs_diff_eq!(s.total_return, 0.0);
    }

    #[test]
    fn breakeven_trade_counts_as_win() {
        let s = Summary::compute(&[trade(0.0)], &curve(&[1000.0]), 1000.0);
        assert_eq!(s.wins, 1);
        assert_eq!(s.losses, 0);
        assert_abs_diff_eq!(s.win_rate, 1.0);
    }

    #[test]
    fn profit_factor_none_without_losses() {
        let s = Summary::compute(&[trade(5.0), trade(3.0)], &curve(&[1000.0]), 1000.0);
        assert_eq!(s.profit_factor, None);
    }

    #[test]
    fn profit_factor_ratio() {
        let s = Summary::compute(&[trade(6.0), trade(-2.0)], &curve(&[1000.0]), 1000.0);
        assert_abs_diff_eq!(s.profit_factor.unwrap(), 3.0, epsilon = 1e-12);
        assert_eq!(s.wins, 1);
        assert_eq!(s.losses, 1);
        assert_abs_diff_eq!(s.win_rate, 0.5);
    }

    #[test]
    fn max_drawdown_simple_dip() {
        // peak 120, trough 90 → 25%
        let mdd = max_drawdown([100.0, 120.0, 90.0, 110.0]);
        assert_abs_diff_eq!(mdd, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn max_drawdown_monotonic_rise_is_zero() {
        let mdd = max_drawdown([100.0, 110.0, 120.0]);
        assert_abs_diff_eq!(mdd, 0.0);
    }

    #[test]
    fn max_drawdown_empty_is_zero() {
        assert_abs_diff_eq!(max_drawdown([]), 0.0);
    }

    #[test]
    fn max_drawdown_ignores_non_positive_peak() {
        // no positive peak, nothing to measure against
        assert_abs_diff_eq!(max_drawdown([0.0, 0.0]), 0.0);
    }

    #[test]
    fn profit_factor_serializes_as_null() {
        let s = Summary::compute(&[], &[], 1000.0);
        let json = serde_json::to_value(&s).unwrap();
        assert!(json["profitFactor"].is_null());
        assert_eq!(json["finalEquity"], 1000.0);
        assert_eq!(json["tradesCount"], 0);
    }
}
