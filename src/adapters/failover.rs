//! Ordered provider chain with first-success semantics.

use crate::domain::error::StratlabError;
use crate::ports::bar_port::{BarBatch, BarSeriesPort};
use crate::ports::config_port::ConfigPort;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::binance::{self, BinanceAdapter};
use super::cryptocompare::{self, CryptoCompareAdapter};

pub struct FailoverBarSource {
    providers: Vec<Arc<dyn BarSeriesPort + Send + Sync>>,
}

impl FailoverBarSource {
    pub fn new(providers: Vec<Arc<dyn BarSeriesPort + Send + Sync>>) -> Self {
        Self { providers }
    }

    /// Binance first, CryptoCompare as fallback.
    pub fn default_chain() -> Self {
        Self::new(vec![
            Arc::new(BinanceAdapter::new(binance::DEFAULT_BASE_URL)),
            Arc::new(CryptoCompareAdapter::new(cryptocompare::DEFAULT_BASE_URL)),
        ])
    }

    /// Same chain, with `[providers]` base URL overrides for self-hosted
    /// proxies or test servers.
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let binance_base = config
            .get_string("providers", "binance_base")
            .unwrap_or_else(|| binance::DEFAULT_BASE_URL.to_string());
        let cryptocompare_base = config
            .get_string("providers", "cryptocompare_base")
            .unwrap_or_else(|| cryptocompare::DEFAULT_BASE_URL.to_string());
        Self::new(vec![
            Arc::new(BinanceAdapter::new(&binance_base)),
            Arc::new(CryptoCompareAdapter::new(&cryptocompare_base)),
        ])
    }
}

#[async_trait]
impl BarSeriesPort for FailoverBarSource {
    fn provider_name(&self) -> &str {
        "failover"
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<BarBatch, StratlabError> {
        let mut failures = Vec::new();

        for provider in &self.providers {
            match provider.fetch_bars(symbol, timeframe, limit).await {
                Ok(batch) => {
                    info!(
                        provider = provider.provider_name(),
                        symbol,
                        bars = batch.bars.len(),
                        "fetched bars"
                    );
                    return Ok(batch);
                }
                Err(e) => {
                    warn!(
                        provider = provider.provider_name(),
                        symbol,
                        error = %e,
                        "provider failed, trying next"
                    );
                    failures.push(format!("{}: {}", provider.provider_name(), e));
                }
            }
        }

        let summary = if failures.is_empty() {
            "no providers configured".to_string()
        } else {
            failures.join("; ")
        };
        Err(StratlabError::AllProvidersFailed { summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::Bar;

    struct ScriptedSource {
        name: &'static str,
        batch: Option<BarBatch>,
    }

    impl ScriptedSource {
        fn ok(name: &'static str) -> Arc<Self> {
            let bars = vec![Bar {
                t: 1700000000000,
                o: 1.0,
                h: 2.0,
                l: 0.5,
                c: 1.5,
            }];
            Arc::new(Self {
                name,
                batch: Some(BarBatch {
                    provider: name.to_string(),
                    bars,
                }),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self { name, batch: None })
        }
    }

    #[async_trait]
    impl BarSeriesPort for ScriptedSource {
        fn provider_name(&self) -> &str {
            self.name
        }

        async fn fetch_bars(
            &self,
            _symbol: &str,
            _timeframe: &str,
            _limit: usize,
        ) -> Result<BarBatch, StratlabError> {
            self.batch.clone().ok_or_else(|| StratlabError::Provider {
                provider: self.name.to_string(),
                reason: "scripted failure".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn first_success_wins() {
        let chain = FailoverBarSource::new(vec![
            ScriptedSource::ok("primary"),
            ScriptedSource::ok("secondary"),
        ]);

        let batch = chain.fetch_bars("BTCUSDT", "1h", 100).await.unwrap();
        assert_eq!(batch.provider, "primary");
    }

    #[tokio::test]
    async fn falls_over_to_next_provider() {
        let chain = FailoverBarSource::new(vec![
            ScriptedSource::failing("primary"),
            ScriptedSource::ok("secondary"),
        ]);

        let batch = chain.fetch_bars("BTCUSDT", "1h", 100).await.unwrap();
        assert_eq!(batch.provider, "secondary");
    }

    #[tokio::test]
    async fn aggregates_all_failures() {
        let chain = FailoverBarSource::new(vec![
            ScriptedSource::failing("primary"),
            ScriptedSource::failing("secondary"),
        ]);

        let err = chain.fetch_bars("BTCUSDT", "1h", 100).await.unwrap_err();
        match err {
            StratlabError::AllProvidersFailed { summary } => {
                assert!(summary.contains("primary"));
                assert!(summary.contains("secondary"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_chain_reports_no_providers() {
        let chain = FailoverBarSource::new(Vec::new());
        let err = chain.fetch_bars("BTCUSDT", "1h", 100).await.unwrap_err();
        match err {
            StratlabError::AllProvidersFailed { summary } => {
                assert_eq!(summary, "no providers configured");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
