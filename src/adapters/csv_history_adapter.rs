//! Append-only CSV decision history, one file per instrument.
//!
//! Columns: `Date,Price,Signal,Action,Profit`. Profit is the realized return in
//! percent with two decimals, blank when nothing closed on that bar.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use crate::adapters::csv_adapter::parse_timestamp;
use crate::domain::error::TechSignalError;
use crate::ports::history_port::{HistoryPort, HistoryRow};

const HEADER: [&str; 5] = ["Date", "Price", "Signal", "Action", "Profit"];

pub struct CsvHistoryLog {
    dir: PathBuf,
}

impl CsvHistoryLog {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn history_path(&self, instrument: &str) -> PathBuf {
        self.dir.join(format!("{}_history.csv", instrument))
    }
}

fn history_error(path: &std::path::Path, e: impl std::fmt::Display) -> TechSignalError {
    TechSignalError::History {
        reason: format!("{}: {}", path.display(), e),
    }
}

impl HistoryPort for CsvHistoryLog {
    fn append(&self, instrument: &str, row: &HistoryRow) -> Result<(), TechSignalError> {
        fs::create_dir_all(&self.dir).map_err(|e| history_error(&self.dir, e))?;
        let path = self.history_path(instrument);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| history_error(&path, e))?;
        let is_new = file.metadata().map_err(|e| history_error(&path, e))?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer
                .write_record(HEADER)
                .map_err(|e| history_error(&path, e))?;
        }
        let date = row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
        let price = format!("{:.2}", row.price);
        let profit = row
            .profit_pct
            .map(|p| format!("{:.2}", p))
            .unwrap_or_default();
        writer
            .write_record([
                date.as_str(),
                price.as_str(),
                row.signal.as_str(),
                row.action.as_str(),
                profit.as_str(),
            ])
            .map_err(|e| history_error(&path, e))?;
        writer.flush().map_err(|e| history_error(&path, e))?;
        Ok(())
    }

    fn last_row(&self, instrument: &str) -> Result<Option<HistoryRow>, TechSignalError> {
        let path = self.history_path(instrument);
        if !path.exists() {
            return Ok(None);
        }
        let mut reader = csv::Reader::from_path(&path).map_err(|e| history_error(&path, e))?;
        let mut last = None;
        for record in reader.records() {
            last = Some(record.map_err(|e| history_error(&path, e))?);
        }
        let Some(record) = last else {
            return Ok(None);
        };

        let get = |i: usize| record.get(i).unwrap_or("").trim();
        let timestamp =
            parse_timestamp(get(0)).ok_or_else(|| history_error(&path, "invalid Date"))?;
        let price = get(1)
            .parse()
            .map_err(|e| history_error(&path, format!("invalid Price: {e}")))?;
        let profit_pct = match get(4) {
            "" => None,
            raw => Some(
                raw.parse()
                    .map_err(|e| history_error(&path, format!("invalid Profit: {e}")))?,
            ),
        };
        Ok(Some(HistoryRow {
            timestamp,
            price,
            signal: get(2).to_string(),
            action: get(3).to_string(),
            profit_pct,
        }))
    }
}
