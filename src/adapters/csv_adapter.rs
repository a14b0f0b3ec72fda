//! CSV file market-data adapter.
//!
//! One file per symbol: `{code}_{exchange}_{timeframe}.csv`, or for daily bars
//! also the plain `{code}_{exchange}.csv`. Columns are
//! `timestamp,open,high,low,close,volume`; rows are returned in file order so
//! that out-of-order data is caught by series validation rather than hidden.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::domain::error::ScreenerError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::MarketDataPort;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn candidate_paths(&self, code: &str, exchange: &str, timeframe: Timeframe) -> Vec<PathBuf> {
        let mut paths = vec![
            self.base_path
                .join(format!("{}_{}_{}.csv", code, exchange, timeframe)),
        ];
        if timeframe == Timeframe::Daily {
            paths.push(self.base_path.join(format!("{}_{}.csv", code, exchange)));
        }
        paths
    }
}

#[async_trait]
impl MarketDataPort for CsvAdapter {
    async fn fetch_bars(
        &self,
        code: &str,
        exchange: &str,
        timeframe: Timeframe,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScreenerError> {
        for path in self.candidate_paths(code, exchange, timeframe) {
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(fetch_error(
                        code,
                        exchange,
                        format!("failed to read {}: {}", path.display(), e),
                    ));
                }
            };
            debug!(path = %path.display(), "reading bars");
            return parse_bars(&content, code, exchange, start, end)
                .map_err(|reason| fetch_error(code, exchange, format!("{}: {}", path.display(), reason)));
        }

        Err(ScreenerError::NoData {
            code: code.to_string(),
            exchange: exchange.to_string(),
        })
    }

    async fn list_symbols(&self, exchange: &str) -> Result<Vec<String>, ScreenerError> {
        let mut entries = tokio::fs::read_dir(&self.base_path).await.map_err(|e| {
            ScreenerError::Database {
                reason: format!(
                    "failed to read directory {}: {}",
                    self.base_path.display(),
                    e
                ),
            }
        })?;

        let mut symbols = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| ScreenerError::Database {
            reason: format!("directory entry error: {}", e),
        })? {
            let name = entry.file_name();
            if let Some(code) = symbol_from_file_name(&name.to_string_lossy(), exchange) {
                symbols.push(code);
            }
        }

        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }
}

fn symbol_from_file_name(name: &str, exchange: &str) -> Option<String> {
    let stem = name.strip_suffix(".csv")?;
    if let Some(code) = stem.strip_suffix(&format!("_{}", exchange)) {
        return Some(code.to_string());
    }
    Timeframe::ALL.iter().find_map(|tf| {
        stem.strip_suffix(&format!("_{}_{}", exchange, tf))
            .map(str::to_string)
    })
}

fn fetch_error(code: &str, exchange: &str, reason: String) -> ScreenerError {
    ScreenerError::DataFetch {
        code: code.to_string(),
        exchange: exchange.to_string(),
        reason,
    }
}

/// Parses CSV content, keeping rows whose calendar day is on `start..=end`.
pub fn parse_bars(
    content: &str,
    code: &str,
    exchange: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<OhlcvBar>, String> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| format!("CSV parse error: {}", e))?;
        let line = row + 2;

        let timestamp = parse_timestamp(column(&record, 0, "timestamp", line)?)
            .ok_or_else(|| format!("line {}: invalid timestamp", line))?;
        let day = timestamp.date();
        if day < start || day > end {
            continue;
        }

        bars.push(OhlcvBar {
            code: code.to_string(),
            exchange: exchange.to_string(),
            timestamp,
            open: number(&record, 1, "open", line)?,
            high: number(&record, 2, "high", line)?,
            low: number(&record, 3, "low", line)?,
            close: number(&record, 4, "close", line)?,
            volume: number(&record, 5, "volume", line)?,
        });
    }

    Ok(bars)
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn column<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<&'r str, String> {
    record
        .get(index)
        .ok_or_else(|| format!("line {}: missing {} column", line, name))
}

fn number<T: FromStr>(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    column(record, index, name, line)?
        .parse()
        .map_err(|e| format!("line {}: invalid {} value: {}", line, name, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "timestamp,open,high,low,close,volume\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n";

        fs::write(path.join("BHP_ASX.csv"), csv_content).unwrap();
        fs::write(
            path.join("BHP_ASX_1h.csv"),
            "timestamp,open,high,low,close,volume\n\
             2024-01-15 10:00:00,100.0,101.0,99.0,100.5,1000\n\
             2024-01-15 11:00:00,100.5,102.0,100.0,101.5,1200\n",
        )
        .unwrap();
        fs::write(path.join("CBA_ASX_1D.csv"), "timestamp,open,high,low,close,volume\n").unwrap();
        fs::write(path.join("AAPL_NYSE.csv"), "timestamp,open,high,low,close,volume\n").unwrap();

        (dir, path)
    }

    #[tokio::test]
    async fn fetch_daily_bars() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter
            .fetch_bars("BHP", "ASX", Timeframe::Daily, date(2024, 1, 15), date(2024, 1, 17))
            .await
            .unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].timestamp, date(2024, 1, 15).and_time(NaiveTime::MIN));
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000);
    }

    #[tokio::test]
    async fn fetch_filters_by_window() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter
            .fetch_bars("BHP", "ASX", Timeframe::Daily, date(2024, 1, 16), date(2024, 1, 16))
            .await
            .unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 110.0);
    }

    #[tokio::test]
    async fn fetch_intraday_uses_timeframe_file() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter
            .fetch_bars("BHP", "ASX", Timeframe::Hour1, date(2024, 1, 15), date(2024, 1, 15))
            .await
            .unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].timestamp.format("%H:%M").to_string(), "11:00");
    }

    #[tokio::test]
    async fn missing_file_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let result = adapter
            .fetch_bars("XYZ", "ASX", Timeframe::Daily, date(2024, 1, 1), date(2024, 1, 31))
            .await;

        assert!(matches!(result, Err(ScreenerError::NoData { .. })));
    }

    #[test]
    fn bad_value_reports_line() {
        let err = parse_bars(
            "timestamp,open,high,low,close,volume\n2024-01-15,1,2,1,abc,10\n",
            "A",
            "X",
            date(2024, 1, 1),
            date(2024, 12, 31),
        )
        .unwrap_err();
        assert!(err.contains("line 2"));
        assert!(err.contains("close"));
    }

    #[test]
    fn rows_keep_file_order() {
        let bars = parse_bars(
            "timestamp,open,high,low,close,volume\n\
             2024-01-16,1,1,1,2,10\n\
             2024-01-15,1,1,1,1,10\n",
            "A",
            "X",
            date(2024, 1, 1),
            date(2024, 12, 31),
        )
        .unwrap();
        assert_eq!(bars[0].close, 2.0);
    }

    #[tokio::test]
    async fn list_symbols_returns_exchange_symbols() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        assert_eq!(adapter.list_symbols("ASX").await.unwrap(), vec!["BHP", "CBA"]);
        assert_eq!(adapter.list_symbols("NYSE").await.unwrap(), vec!["AAPL"]);
    }
}
