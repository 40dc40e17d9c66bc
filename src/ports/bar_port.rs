//! Market-data access port trait.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::bar::Bar;
use crate::domain::error::StratlabError;

/// A provider response with fewer bars than this counts as a failed
/// fetch, so a thin upstream answer triggers failover instead of
/// producing a useless series.
pub const MIN_PROVIDER_BARS: usize = 10;

/// Bars plus the name of the provider that actually served them. The
/// provider label travels into signal metadata and API responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarBatch {
    pub provider: String,
    pub bars: Vec<Bar>,
}

/// Source of OHLC candles for a symbol and timeframe. `limit` is the
/// number of most recent bars requested; implementations may return
/// fewer, and callers enforce their own minimums.
#[async_trait]
pub trait BarSeriesPort {
    fn provider_name(&self) -> &str;

    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<BarBatch, StratlabError>;
}
