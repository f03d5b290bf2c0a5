#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
pub use techsignal::domain::ohlcv::Bar;
use techsignal::domain::error::TechSignalError;
use techsignal::domain::state_machine::ExitMode;
use techsignal::domain::strategy::StrategyConfig;
use techsignal::ports::data_port::DataPort;
use techsignal::ports::notify_port::NotifyPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
    pub calls: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            calls: Cell::new(0),
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

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, TechSignalError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(reason) = self.errors.get(symbol) {
            return Err(TechSignalError::Fetch {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
                reason: reason.clone(),
            });
        }
        match self.data.get(symbol) {
            Some(bars) => Ok(bars[bars.len().saturating_sub(limit)..].to_vec()),
            None => Err(TechSignalError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            }),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: RefCell<Vec<(String, Option<String>)>>,
}

impl NotifyPort for RecordingNotifier {
    fn notify(&self, message: &str, attachment: Option<&str>) -> Result<(), TechSignalError> {
        self.messages
            .borrow_mut()
            .push((message.to_string(), attachment.map(str::to_string)));
        Ok(())
    }
}

pub struct FailingNotifier;

impl NotifyPort for FailingNotifier {
    fn notify(&self, _: &str, _: Option<&str>) -> Result<(), TechSignalError> {
        Err(TechSignalError::Notify {
            reason: "channel unavailable".to_string(),
        })
    }
}

pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Hourly uptrend of 0.3 per bar with a 20-bar sine wave of amplitude 6.
/// Each bar opens at the previous close; high/low sit 0.5 outside the body.
pub fn wave_bars(n: usize) -> Vec<Bar> {
    let mut prev_close = 100.0;
    (0..n)
        .map(|i| {
            let close =
                100.0 + 0.3 * i as f64 + 6.0 * (2.0 * std::f64::consts::PI * i as f64 / 20.0).sin();
            let open = prev_close;
            prev_close = close;
            Bar {
                timestamp: start() + Duration::hours(i as i64),
                open,
                high: open.max(close) + 0.5,
                low: open.min(close) - 0.5,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

pub fn strategy(name: &str, symbol: &str, exit_mode: ExitMode) -> StrategyConfig {
    StrategyConfig::new(name, symbol, exit_mode)
}

/// Write bars as `{dir}/{SYMBOL}_{timeframe}.csv` in the input format.
pub fn write_bars_csv(dir: &Path, symbol: &str, timeframe: &str, bars: &[Bar]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        let _ = writeln!(
            content,
            "{},{},{},{},{},{}",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        );
    }
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join(format!("{}_{}.csv", symbol.replace('/', ""), timeframe)),
        content,
    )
    .unwrap();
}

/// Config text with one `[instrument:<name>]` section per `(name, symbol)`.
pub fn config_text(root: &Path, instruments: &[(&str, &str)]) -> String {
    let mut text = format!(
        "[general]\ndata_dir = {}\nstate_dir = {}\nhistory_dir = {}\nchart_dir = {}\n\n[retry]\nmax_retries = 0\nbackoff_ms = 0\n",
        root.join("data").display(),
        root.join("state").display(),
        root.join("history").display(),
        root.join("charts").display(),
    );
    for (name, symbol) in instruments {
        let _ = write!(
            text,
            "\n[instrument:{}]\nsymbol = {}\ntimeframes = 1h\nexit_mode = any_change\n",
            name, symbol
        );
    }
    text
}
