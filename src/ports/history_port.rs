//! Append-only decision history port trait.

use chrono::NaiveDateTime;

use crate::domain::backtest::HistoryRecord;
use crate::domain::error::TechSignalError;
use crate::domain::live::LiveStep;

/// Signal label recorded for bars whose indicators were still undefined.
pub const WARMUP_LABEL: &str = "WARMUP";

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub signal: String,
    pub action: String,
    /// Realized profit in percent; `None` when nothing closed on this bar.
    pub profit_pct: Option<f64>,
}

impl From<&HistoryRecord> for HistoryRow {
    fn from(record: &HistoryRecord) -> Self {
        HistoryRow {
            timestamp: record.timestamp,
            price: record.price,
            signal: record
                .signal
                .map_or_else(|| WARMUP_LABEL.to_string(), |s| s.to_string()),
            action: record.action.to_string(),
            profit_pct: (record.pnl != 0.0).then_some(record.pnl * 100.0),
        }
    }
}

impl From<&LiveStep> for HistoryRow {
    fn from(step: &LiveStep) -> Self {
        HistoryRow {
            timestamp: step.timestamp,
            price: step.price,
            signal: step.classification.signal.to_string(),
            action: step.action.to_string(),
            profit_pct: step
                .trade
                .as_ref()
                .map(|t| t.pnl_fraction)
                .filter(|pnl| *pnl != 0.0)
                .map(|pnl| pnl * 100.0),
        }
    }
}

pub trait HistoryPort {
    fn append(&self, instrument: &str, row: &HistoryRow) -> Result<(), TechSignalError>;
    fn last_row(&self, instrument: &str) -> Result<Option<HistoryRow>, TechSignalError>;
}
