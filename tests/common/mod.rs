#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use stratlab::domain::bar::Bar;
use stratlab::domain::error::StratlabError;
use stratlab::ports::bar_port::{BarBatch, BarSeriesPort};
use stratlab::ports::store_port::StrategyRecord;

/// Canned market-data source keyed by symbol. Unknown symbols return an
/// empty batch; symbols registered with an error fail the fetch.
pub struct ScriptedBars {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl ScriptedBars {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

#[async_trait]
impl BarSeriesPort for ScriptedBars {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        _timeframe: &str,
        limit: usize,
    ) -> Result<BarBatch, StratlabError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(StratlabError::Provider {
                provider: "scripted".to_string(),
                reason: reason.clone(),
            });
        }
        let mut bars = self.data.get(symbol).cloned().unwrap_or_default();
        if bars.len() > limit {
            bars.drain(..bars.len() - limit);
        }
        Ok(BarBatch {
            provider: "scripted".to_string(),
            bars,
        })
    }
}

/// Source that records every fetch it serves, for asserting on the
/// symbol, timeframe and limit that actually reach the provider.
pub struct RecordingBars {
    pub bars: Vec<Bar>,
    pub calls: Mutex<Vec<(String, String, usize)>>,
}

impl RecordingBars {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self {
            bars,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn requested_limits(&self) -> Vec<usize> {
        self.calls.lock().unwrap().iter().map(|c| c.2).collect()
    }
}

#[async_trait]
impl BarSeriesPort for RecordingBars {
    fn provider_name(&self) -> &str {
        "recording"
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<BarBatch, StratlabError> {
        self.calls
            .lock()
            .unwrap()
            .push((symbol.to_string(), timeframe.to_string(), limit));
        Ok(BarBatch {
            provider: "recording".to_string(),
            bars: self.bars.clone(),
        })
    }
}

/// Bar with a trivial range, so stop and take-profit triggers stay inert
/// unless a test widens the range itself.
pub fn make_bar(t: i64, close: f64) -> Bar {
    Bar { t, o: close, h: close, l: close, c: close }
}

pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, c)| make_bar(i as i64 * 60_000, *c))
        .collect()
}

pub fn flat_series(count: usize, price: f64) -> Vec<Bar> {
    bars_from_closes(&vec![price; count])
}

/// 61 bars: a long flat stretch, one decline that drops RSI(14) to 0 at
/// index 55, then a rally that lifts it back above 70 at index 58. With
/// [`rsi_mean_reversion`] this produces exactly one winning trade.
pub fn dip_and_rally_series() -> Vec<Bar> {
    let mut closes = vec![100.0; 55];
    closes.push(99.0);
    closes.extend([100.0, 101.0, 102.0, 103.0, 104.0]);
    bars_from_closes(&closes)
}

/// 60 bars: flat, then a single decline leaving RSI(14) at 0 on the
/// last bar.
pub fn oversold_series() -> Vec<Bar> {
    let mut closes = vec![100.0; 59];
    closes.push(99.0);
    bars_from_closes(&closes)
}

/// 60 monotonically rising closes: RSI pinned at 100 on the last bar.
pub fn overbought_series() -> Vec<Bar> {
    bars_from_closes(&(0..60).map(|i| 100.0 + i as f64).collect::<Vec<_>>())
}

/// RSI(14) mean reversion as the strategy builder emits it: enter below
/// 30, exit above 70, 25 quote units per position, no stops, no costs.
pub fn rsi_mean_reversion() -> Value {
    json!({
        "name": "RSI mean reversion",
        "rules": {
            "entry": { "all": [
                { "type": "indicator", "name": "RSI", "length": 14, "source": "close", "op": "<", "value": 30 }
            ]},
            "exit": { "any": [
                { "type": "indicator", "name": "RSI", "length": 14, "source": "close", "op": ">", "value": 70 }
            ]}
        },
        "risk": { "positionSizing": { "type": "fixedQuote", "amount": 25 } }
    })
}

pub fn make_strategy(id: &str, symbol: &str) -> StrategyRecord {
    StrategyRecord {
        id: id.to_string(),
        name: format!("{id} strategy"),
        symbol: symbol.to_string(),
        timeframe: "1h".to_string(),
        definition: rsi_mean_reversion().to_string(),
    }
}
