//! CSV file bar source and signal export.
//!
//! Bars live in `{SYMBOL}_{TIMEFRAME}.csv` files with a
//! `t,open,high,low,close` header, timestamps in ms since epoch. Useful
//! for offline backtests and for tests that must not touch the network.

use crate::domain::bar::Bar;
use crate::domain::error::StratlabError;
use crate::ports::bar_port::{BarBatch, BarSeriesPort};
use crate::ports::store_port::SignalRecord;
use async_trait::async_trait;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

pub const PROVIDER_NAME: &str = "csv";

pub struct CsvBarAdapter {
    base_path: PathBuf,
}

impl CsvBarAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, timeframe))
    }

    fn parse_field<T: std::str::FromStr>(
        record: &csv::StringRecord,
        index: usize,
        name: &str,
    ) -> Result<T, StratlabError>
    where
        T::Err: std::fmt::Display,
    {
        record
            .get(index)
            .ok_or_else(|| StratlabError::Provider {
                provider: PROVIDER_NAME.to_string(),
                reason: format!("missing {} column", name),
            })?
            .trim()
            .parse()
            .map_err(|e| StratlabError::Provider {
                provider: PROVIDER_NAME.to_string(),
                reason: format!("invalid {} value: {}", name, e),
            })
    }
}

#[async_trait]
impl BarSeriesPort for CsvBarAdapter {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<BarBatch, StratlabError> {
        let path = self.csv_path(symbol, timeframe);
        let content = fs::read_to_string(&path).map_err(|e| StratlabError::Provider {
            provider: PROVIDER_NAME.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| StratlabError::Provider {
                provider: PROVIDER_NAME.to_string(),
                reason: format!("CSV parse error: {}", e),
            })?;

            bars.push(Bar {
                t: Self::parse_field(&record, 0, "t")?,
                o: Self::parse_field(&record, 1, "open")?,
                h: Self::parse_field(&record, 2, "high")?,
                l: Self::parse_field(&record, 3, "low")?,
                c: Self::parse_field(&record, 4, "close")?,
            });
        }

        bars.sort_by_key(|b| b.t);
        if bars.len() > limit {
            bars.drain(..bars.len() - limit);
        }

        Ok(BarBatch {
            provider: PROVIDER_NAME.to_string(),
            bars,
        })
    }
}

/// Write signals as CSV, newest rows in whatever order the caller passed.
pub fn write_signals_csv<W: Write>(
    writer: W,
    signals: &[SignalRecord],
) -> Result<(), StratlabError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["id", "strategy_id", "t", "signal_type", "price", "created_at"])
        .map_err(|e| StratlabError::Io(std::io::Error::other(e)))?;

    for signal in signals {
        wtr.write_record([
            signal.id.to_string(),
            signal.strategy_id.clone(),
            signal.t.to_string(),
            signal.signal_type.as_str().to_string(),
            signal.price.to_string(),
            signal.created_at.to_string(),
        ])
        .map_err(|e| StratlabError::Io(std::io::Error::other(e)))?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::forward::SignalType;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "t,open,high,low,close\n\
            1700003600000,105.0,115.0,100.0,110.0\n\
            1700000000000,100.0,110.0,90.0,105.0\n\
            1700007200000,110.0,120.0,105.0,115.0\n";

        fs::write(path.join("BTCUSDT_1h.csv"), csv_content).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn fetch_bars_parses_and_sorts_by_time() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvBarAdapter::new(path);

        let batch = adapter.fetch_bars("BTCUSDT", "1h", 500).await.unwrap();

        assert_eq!(batch.provider, "csv");
        assert_eq!(batch.bars.len(), 3);
        assert_eq!(batch.bars[0].t, 1700000000000);
        assert_eq!(batch.bars[1].t, 1700003600000);
        assert_eq!(batch.bars[2].t, 1700007200000);
        assert_eq!(batch.bars[0].o, 100.0);
        assert_eq!(batch.bars[0].h, 110.0);
        assert_eq!(batch.bars[0].l, 90.0);
        assert_eq!(batch.bars[0].c, 105.0);
    }

    #[tokio::test]
    async fn fetch_bars_keeps_most_recent_when_over_limit() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvBarAdapter::new(path);

        let batch = adapter.fetch_bars("BTCUSDT", "1h", 2).await.unwrap();

        assert_eq!(batch.bars.len(), 2);
        assert_eq!(batch.bars[0].t, 1700003600000);
        assert_eq!(batch.bars[1].t, 1700007200000);
    }

    #[tokio::test]
    async fn fetch_bars_errors_for_missing_file() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvBarAdapter::new(path);

        let result = adapter.fetch_bars("ETHUSDT", "1h", 500).await;
        assert!(matches!(
            result,
            Err(StratlabError::Provider { ref provider, .. }) if provider == "csv"
        ));
    }

    #[tokio::test]
    async fn fetch_bars_errors_for_bad_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        fs::write(
            path.join("BTCUSDT_1h.csv"),
            "t,open,high,low,close\n1700000000000,oops,110.0,90.0,105.0\n",
        )
        .unwrap();
        let adapter = CsvBarAdapter::new(path);

        let result = adapter.fetch_bars("BTCUSDT", "1h", 500).await;
        assert!(result.is_err());
    }

    #[test]
    fn write_signals_csv_emits_header_and_rows() {
        let signals = vec![SignalRecord {
            id: 7,
            strategy_id: "strat-1".to_string(),
            t: 1700000000000,
            signal_type: SignalType::Entry,
            price: 105.5,
            meta: None,
            created_at: 1700000060000,
        }];

        let mut out = Vec::new();
        write_signals_csv(&mut out, &signals).unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,strategy_id,t,signal_type,price,created_at"
        );
        assert_eq!(
            lines.next().unwrap(),
            "7,strat-1,1700000000000,ENTRY,105.5,1700000060000"
        );
        assert!(lines.next().is_none());
    }
}
