//! CryptoCompare histo-series provider, the fallback behind Binance.
//!
//! CryptoCompare wants a split base/quote pair and an endpoint choice
//! per timeframe unit, so the Binance-style concatenated symbol and
//! interval both need translating before the request goes out.

use crate::domain::bar::Bar;
use crate::domain::error::StratlabError;
use crate::ports::bar_port::{BarBatch, BarSeriesPort, MIN_PROVIDER_BARS};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const PROVIDER_NAME: &str = "cryptocompare";
pub const DEFAULT_BASE_URL: &str = "https://min-api.cryptocompare.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Quote assets recognized when splitting a concatenated pair, matched
/// longest-first so USDT wins over USD.
const QUOTE_ASSETS: [&str; 7] = ["USDT", "USDC", "BUSD", "USD", "EUR", "BTC", "ETH"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoEndpoint {
    Minute,
    Hour,
    Day,
}

impl HistoEndpoint {
    fn as_str(self) -> &'static str {
        match self {
            HistoEndpoint::Minute => "histominute",
            HistoEndpoint::Hour => "histohour",
            HistoEndpoint::Day => "histoday",
        }
    }
}

/// Picks the histo endpoint and aggregate for a timeframe. The
/// aggregate is clamped to what each endpoint accepts; anything that
/// does not look like `<n><unit>` falls back to hourly bars.
fn interval_to_endpoint(timeframe: &str) -> (HistoEndpoint, i64) {
    let s = timeframe.trim().to_lowercase();
    if let Some((n, endpoint, max)) = split_interval(&s) {
        return (endpoint, n.clamp(1, max));
    }
    (HistoEndpoint::Hour, 1)
}

fn split_interval(s: &str) -> Option<(i64, HistoEndpoint, i64)> {
    let (digits, endpoint, max) = if let Some(rest) = s.strip_suffix('m') {
        (rest, HistoEndpoint::Minute, 1440)
    } else if let Some(rest) = s.strip_suffix('h') {
        (rest, HistoEndpoint::Hour, 168)
    } else if let Some(rest) = s.strip_suffix('d') {
        (rest, HistoEndpoint::Day, 365)
    } else {
        return None;
    };

    let digits = digits.trim_end();
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    let n = digits.parse().ok()?;
    Some((n, endpoint, max))
}

/// Splits a concatenated pair such as BTCUSDT into base and quote. An
/// unrecognized or bare symbol keeps the whole string as base and
/// assumes USDT.
pub fn parse_symbol(symbol: &str) -> (String, String) {
    let s = symbol.to_uppercase().replace(['-', '/'], "");
    let mut quotes = QUOTE_ASSETS;
    quotes.sort_by_key(|q| std::cmp::Reverse(q.len()));
    for q in quotes {
        if s.ends_with(q) && s.len() > q.len() {
            return (s[..s.len() - q.len()].to_string(), q.to_string());
        }
    }
    (s, "USDT".to_string())
}

#[derive(Debug, Deserialize)]
struct HistoResponse {
    #[serde(rename = "Data", default)]
    data: Option<HistoData>,
}

#[derive(Debug, Deserialize)]
struct HistoData {
    #[serde(rename = "Data", default)]
    rows: Vec<HistoRow>,
}

#[derive(Debug, Deserialize)]
struct HistoRow {
    /// Seconds since epoch, unlike the ms used everywhere else.
    #[serde(default)]
    time: i64,
    #[serde(default)]
    open: f64,
    #[serde(default)]
    high: f64,
    #[serde(default)]
    low: f64,
    #[serde(default)]
    close: f64,
}

impl HistoRow {
    fn to_bar(&self) -> Bar {
        Bar {
            t: self.time * 1000,
            o: self.open,
            h: self.high,
            l: self.low,
            c: self.close,
        }
    }
}

pub struct CryptoCompareAdapter {
    client: Client,
    base_url: String,
}

impl CryptoCompareAdapter {
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

#[async_trait]
impl BarSeriesPort for CryptoCompareAdapter {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<BarBatch, StratlabError> {
        let (base, quote) = parse_symbol(symbol);
        let (endpoint, aggregate) = interval_to_endpoint(timeframe);

        let url = format!(
            "{}/data/v2/{}?fsym={}&tsym={}&limit={}&aggregate={}",
            self.base_url,
            endpoint.as_str(),
            base,
            quote,
            limit,
            aggregate
        );

        debug!(provider = PROVIDER_NAME, %url, "fetching histo series");

        let resp = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| Self::error(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Self::error(format!("HTTP {}", status)));
        }

        let parsed: HistoResponse = resp
            .json()
            .await
            .map_err(|e| Self::error(format!("invalid JSON: {}", e)))?;

        let rows = parsed.data.map(|d| d.rows).unwrap_or_default();
        if rows.len() < MIN_PROVIDER_BARS {
            return Err(Self::error(format!(
                "not enough data ({} bars)",
                rows.len()
            )));
        }

        Ok(BarBatch {
            provider: PROVIDER_NAME.to_string(),
            bars: rows.iter().map(HistoRow::to_bar).collect(),
        })
    }
}
