//! Binance spot klines provider.

use crate::domain::bar::Bar;
use crate::domain::error::StratlabError;
use crate::ports::bar_port::{BarBatch, BarSeriesPort, MIN_PROVIDER_BARS};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const PROVIDER_NAME: &str = "binance";
pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

const USER_AGENT: &str = "stratlab/0.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Maps a requested timeframe onto Binance's kline interval vocabulary.
/// Anything unrecognized falls back to "1h".
pub fn normalize_interval(timeframe: &str) -> &'static str {
    match timeframe.trim() {
        "1m" => "1m",
        "3m" => "3m",
        "5m" => "5m",
        "15m" => "15m",
        "30m" => "30m",
        "1h" => "1h",
        "2h" => "2h",
        "4h" => "4h",
        "6h" => "6h",
        "8h" => "8h",
        "12h" => "12h",
        "1d" => "1d",
        "3d" => "3d",
        "1w" => "1w",
        "1M" => "1M",
        _ => "1h",
    }
}

pub struct BinanceAdapter {
    client: Client,
    base_url: String,
}

impl BinanceAdapter {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn error(reason: String) -> StratlabError {
        StratlabError::Provider {
            provider: PROVIDER_NAME.to_string(),
            reason,
        }
    }
}

/// Klines arrive as arrays mixing numbers and numeric strings:
/// `[openTime, "open", "high", "low", "close", ...]`.
fn field_as_f64(row: &Value, index: usize) -> f64 {
    match row.get(index) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn parse_klines(raw: &Value) -> Result<Vec<Bar>, StratlabError> {
    let rows = raw
        .as_array()
        .ok_or_else(|| BinanceAdapter::error("unexpected response shape".to_string()))?;

    Ok(rows
        .iter()
        .map(|k| Bar {
            t: field_as_f64(k, 0) as i64,
            o: field_as_f64(k, 1),
            h: field_as_f64(k, 2),
            l: field_as_f64(k, 3),
            c: field_as_f64(k, 4),
        })
        .collect())
}

#[async_trait]
impl BarSeriesPort for BinanceAdapter {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<BarBatch, StratlabError> {
        let interval = normalize_interval(timeframe);
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );

        debug!(provider = PROVIDER_NAME, %url, "fetching klines");

        let resp = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| Self::error(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Self::error(format!("HTTP {}", status)));
        }

        let raw: Value = resp
            .json()
            .await
            .map_err(|e| Self::error(format!("invalid JSON: {}", e)))?;
        let bars = parse_klines(&raw)?;

        if bars.len() < MIN_PROVIDER_BARS {
            return Err(Self::error(format!(
                "not enough data ({} bars)",
                bars.len()
            )));
        }

        Ok(BarBatch {
            provider: PROVIDER_NAME.to_string(),
            bars,
        })
    }
}
