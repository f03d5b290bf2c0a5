//! CSV file market data adapter.
//!
//! Reads `{base_path}/{SYMBOL}_{timeframe}.csv` where the symbol has its `/`
//! removed (`ETH/USDT` at `1h` → `ETHUSDT_1h.csv`). Columns:
//! `timestamp,open,high,low,close,volume`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::domain::error::TechSignalError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", symbol.replace('/', ""), timeframe))
    }
}

/// Unix milliseconds, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        let millis: i64 = raw.parse().ok()?;
        return DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn field<'a>(
    record: &'a csv::StringRecord,
    index: usize,
    name: &str,
    source_name: &str,
) -> Result<&'a str, TechSignalError> {
    record.get(index).ok_or_else(|| TechSignalError::MalformedData {
        source_name: source_name.to_string(),
        reason: format!("missing {} column", name),
    })
}

fn number(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    source_name: &str,
) -> Result<f64, TechSignalError> {
    let raw = field(record, index, name, source_name)?;
    raw.trim()
        .parse()
        .map_err(|e| TechSignalError::MalformedData {
            source_name: source_name.to_string(),
            reason: format!("invalid {} value '{}': {}", name, raw, e),
        })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, TechSignalError> {
        let path = self.csv_path(symbol, timeframe);
        let source_name = path.display().to_string();
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TechSignalError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            },
            _ => TechSignalError::Fetch {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
                reason: format!("failed to read {}: {}", source_name, e),
            },
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| TechSignalError::MalformedData {
                source_name: source_name.clone(),
                reason: format!("CSV parse error: {}", e),
            })?;

            let raw_ts = field(&record, 0, "timestamp", &source_name)?;
            let timestamp =
                parse_timestamp(raw_ts).ok_or_else(|| TechSignalError::MalformedData {
                    source_name: source_name.clone(),
                    reason: format!("invalid timestamp '{}'", raw_ts),
                })?;

            bars.push(Bar {
                timestamp,
                open: number(&record, 1, "open", &source_name)?,
                high: number(&record, 2, "high", &source_name)?,
                low: number(&record, 3, "low", &source_name)?,
                close: number(&record, 4, "close", &source_name)?,
                volume: number(&record, 5, "volume", &source_name)?,
            });
        }

        if bars.is_empty() {
            return Err(TechSignalError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        if bars.len() > limit {
            bars.drain(..bars.len() - limit);
        }
        Ok(bars)
    }
}
