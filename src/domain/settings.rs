//! Run-wide settings shared by every instrument.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneralSettings {
    pub data_dir: PathBuf,
    pub state_dir: PathBuf,
    pub history_dir: PathBuf,
    pub chart_dir: PathBuf,
    /// Starting balance for the compounded backtest equity figure.
    pub initial_balance: f64,
    /// Bars requested from the data source per fetch.
    pub bar_limit: usize,
    pub retry: RetrySettings,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            state_dir: PathBuf::from("state"),
            history_dir: PathBuf::from("history"),
            chart_dir: PathBuf::from("charts"),
            initial_balance: 1000.0,
            bar_limit: 500,
            retry: RetrySettings::default(),
        }
    }
}
