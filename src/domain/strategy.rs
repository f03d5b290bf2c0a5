//! Per-instrument strategy configuration.

use std::fmt;

use crate::domain::signal::ScoringConfig;
use crate::domain::snapshot::IndicatorParams;
use crate::domain::state_machine::ExitMode;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    /// Instrument name; keys state, history, and chart artifacts.
    pub name: String,
    /// Market symbol passed to the data source, e.g. `ETH/USDT`.
    pub symbol: String,
    /// Candidate timeframes. Live runs use the first one.
    pub timeframes: Vec<String>,
    pub exit_mode: ExitMode,
    /// Stage entries for one bar before committing them (live runs only).
    pub confirm_entries: bool,
    pub indicators: IndicatorParams,
    pub scoring: ScoringConfig,
    pub atr_multiplier: f64,
    pub volatility: Option<VolatilityBands>,
}

impl StrategyConfig {
    pub fn new(name: &str, symbol: &str, exit_mode: ExitMode) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            timeframes: vec!["1h".to_string()],
            exit_mode,
            confirm_entries: true,
            indicators: IndicatorParams::default(),
            scoring: ScoringConfig::default(),
            atr_multiplier: 2.0,
            volatility: None,
        }
    }

    pub fn primary_timeframe(&self) -> &str {
        self.timeframes.first().map(String::as_str).unwrap_or("1h")
    }
}

/// ATR levels that separate HIGH/MODERATE/LOW volatility labels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilityBands {
    pub high: f64,
    pub low: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolatilityLevel {
    High,
    Moderate,
    Low,
}

impl VolatilityBands {
    pub fn classify(&self, atr: f64) -> VolatilityLevel {
        if atr > self.high {
            VolatilityLevel::High
        } else if atr < self.low {
            VolatilityLevel::Low
        } else {
            VolatilityLevel::Moderate
        }
    }
}

impl fmt::Display for VolatilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolatilityLevel::High => write!(f, "HIGH"),
            VolatilityLevel::Moderate => write!(f, "MODERATE"),
            VolatilityLevel::Low => write!(f, "LOW"),
        }
    }
}

/// Split a comma-separated timeframe list, dropping blanks.
pub fn parse_timeframes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
