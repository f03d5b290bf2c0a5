//! Configuration validation.
//!
//! Runs before any data is fetched and reports the first offending
//! `[section] key`. Values that are absent fall back to the same defaults the
//! builders use, so only explicit bad values fail here.

use std::str::FromStr;

use crate::domain::error::TechSignalError;
use crate::domain::signal::{ScoringThresholds, ScoringWeights};
use crate::domain::snapshot::IndicatorParams;
use crate::domain::state_machine::ExitMode;
use crate::domain::strategy::parse_timeframes;
use crate::ports::config_port::ConfigPort;

pub const INSTRUMENT_PREFIX: &str = "instrument:";

const GENERAL_INTS: &[&str] = &["bar_limit"];
const GENERAL_FLOATS: &[&str] = &["initial_balance"];
const RETRY_INTS: &[&str] = &["max_retries", "backoff_ms"];
const INSTRUMENT_INTS: &[&str] = &[
    "rsi_period",
    "ema_fast",
    "ema_slow",
    "macd_fast",
    "macd_slow",
    "macd_signal",
    "bb_period",
    "stoch_period",
    "stoch_k_smooth",
    "stoch_d_smooth",
    "atr_period",
    "weight_trend",
    "weight_macd",
    "weight_rsi",
    "weight_bollinger",
    "weight_stochastic",
    "signal_threshold",
    "high_confidence",
    "medium_confidence",
];
const INSTRUMENT_FLOATS: &[&str] = &[
    "bb_stddev",
    "rsi_oversold",
    "rsi_overbought",
    "stoch_oversold",
    "stoch_overbought",
    "atr_multiplier",
    "atr_high",
    "atr_low",
];
const INSTRUMENT_FLAGS: &[&str] = &["confirm_entries"];

/// `(name, section)` for every `[instrument:<name>]` section, sorted by name.
pub fn instrument_sections(config: &dyn ConfigPort) -> Vec<(String, String)> {
    let mut found: Vec<(String, String)> = config
        .sections()
        .into_iter()
        .filter_map(|section| {
            let name = section.strip_prefix(INSTRUMENT_PREFIX)?.trim().to_string();
            Some((name, section))
        })
        .collect();
    found.sort();
    found
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TechSignalError> {
    validate_general(config)?;
    validate_retry(config)?;

    let instruments = instrument_sections(config);
    if instruments.is_empty() {
        return Err(TechSignalError::ConfigMissing {
            section: format!("{}<name>", INSTRUMENT_PREFIX),
            key: "symbol".to_string(),
        });
    }
    for (name, section) in &instruments {
        if name.is_empty() {
            return Err(invalid(section, "", "instrument name must not be empty"));
        }
        validate_instrument(config, section)?;
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TechSignalError {
    TechSignalError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Present values must parse as their type; the typed getters fall back to the
/// default on a parse failure.
fn validate_types(
    config: &dyn ConfigPort,
    section: &str,
    ints: &[&str],
    floats: &[&str],
    flags: &[&str],
) -> Result<(), TechSignalError> {
    let present = |key: &str| config.get_string(section, key).map(|v| v.trim().to_string());
    for &key in ints {
        if let Some(raw) = present(key) {
            if raw.parse::<i64>().is_err() {
                return Err(invalid(section, key, format!("'{}' is not an integer", raw)));
            }
        }
    }
    for &key in floats {
        if let Some(raw) = present(key) {
            if !raw.parse::<f64>().is_ok_and(f64::is_finite) {
                return Err(invalid(section, key, format!("'{}' is not a number", raw)));
            }
        }
    }
    for &key in flags {
        if let Some(raw) = present(key) {
            let known = matches!(
                raw.to_lowercase().as_str(),
                "true" | "yes" | "1" | "on" | "false" | "no" | "0" | "off"
            );
            if !known {
                return Err(invalid(section, key, format!("'{}' is not a boolean", raw)));
            }
        }
    }
    Ok(())
}

fn validate_general(config: &dyn ConfigPort) -> Result<(), TechSignalError> {
    validate_types(config, "general", GENERAL_INTS, GENERAL_FLOATS, &[])?;
    if config.get_double("general", "initial_balance", 1000.0) <= 0.0 {
        return Err(invalid(
            "general",
            "initial_balance",
            "initial_balance must be positive",
        ));
    }
    if config.get_int("general", "bar_limit", 500) < 1 {
        return Err(invalid("general", "bar_limit", "bar_limit must be at least 1"));
    }
    Ok(())
}

fn validate_retry(config: &dyn ConfigPort) -> Result<(), TechSignalError> {
    validate_types(config, "retry", RETRY_INTS, &[], &[])?;
    if config.get_int("retry", "max_retries", 2) < 0 {
        return Err(invalid("retry", "max_retries", "max_retries must be non-negative"));
    }
    if config.get_int("retry", "backoff_ms", 2000) < 0 {
        return Err(invalid("retry", "backoff_ms", "backoff_ms must be non-negative"));
    }
    Ok(())
}

pub fn validate_instrument(config: &dyn ConfigPort, section: &str) -> Result<(), TechSignalError> {
    match config.get_string(section, "symbol") {
        Some(s) if !s.trim().is_empty() => {}
        Some(_) => return Err(invalid(section, "symbol", "symbol must not be empty")),
        None => {
            return Err(TechSignalError::ConfigMissing {
                section: section.to_string(),
                key: "symbol".to_string(),
            });
        }
    }

    validate_types(
        config,
        section,
        INSTRUMENT_INTS,
        INSTRUMENT_FLOATS,
        INSTRUMENT_FLAGS,
    )?;

    let timeframes = config.get_string(section, "timeframes");
    if timeframes.is_some_and(|raw| parse_timeframes(&raw).is_empty()) {
        return Err(invalid(section, "timeframes", "at least one timeframe is required"));
    }

    match config.get_string(section, "exit_mode") {
        None => {
            return Err(TechSignalError::ConfigMissing {
                section: section.to_string(),
                key: "exit_mode".to_string(),
            });
        }
        Some(raw) => {
            ExitMode::from_str(raw.trim()).map_err(|reason| invalid(section, "exit_mode", reason))?;
        }
    }

    validate_periods(config, section)?;
    validate_scoring(config, section)?;

    if config.get_double(section, "atr_multiplier", 2.0) <= 0.0 {
        return Err(invalid(
            section,
            "atr_multiplier",
            "atr_multiplier must be positive",
        ));
    }

    let atr_high = config.get_string(section, "atr_high");
    let atr_low = config.get_string(section, "atr_low");
    match (atr_high, atr_low) {
        (None, None) => {}
        (Some(_), Some(_)) => {
            let high = config.get_double(section, "atr_high", f64::NAN);
            let low = config.get_double(section, "atr_low", f64::NAN);
            if !(low.is_finite() && high.is_finite() && low >= 0.0 && low < high) {
                return Err(invalid(
                    section,
                    "atr_low",
                    "atr_low and atr_high must be numbers with 0 <= atr_low < atr_high",
                ));
            }
        }
        (Some(_), None) => {
            return Err(TechSignalError::ConfigMissing {
                section: section.to_string(),
                key: "atr_low".to_string(),
            });
        }
        (None, Some(_)) => {
            return Err(TechSignalError::ConfigMissing {
                section: section.to_string(),
                key: "atr_high".to_string(),
            });
        }
    }
    Ok(())
}

fn validate_periods(config: &dyn ConfigPort, section: &str) -> Result<(), TechSignalError> {
    let d = IndicatorParams::default();
    let periods = [
        ("rsi_period", d.rsi_period, 1),
        ("ema_fast", d.ema_fast, 1),
        ("ema_slow", d.ema_slow, 1),
        ("macd_fast", d.macd_fast, 1),
        ("macd_slow", d.macd_slow, 1),
        ("macd_signal", d.macd_signal, 1),
        ("bb_period", d.bb_period, 2),
        ("stoch_period", d.stoch_period, 1),
        ("stoch_k_smooth", d.stoch_k_smooth, 1),
        ("stoch_d_smooth", d.stoch_d_smooth, 1),
        ("atr_period", d.atr_period, 1),
    ];
    for (key, default, min) in periods {
        if config.get_int(section, key, default as i64) < min {
            return Err(invalid(section, key, format!("{} must be at least {}", key, min)));
        }
    }

    let ema_fast = config.get_int(section, "ema_fast", d.ema_fast as i64);
    let ema_slow = config.get_int(section, "ema_slow", d.ema_slow as i64);
    if ema_fast >= ema_slow {
        return Err(invalid(section, "ema_fast", "ema_fast must be less than ema_slow"));
    }
    let macd_fast = config.get_int(section, "macd_fast", d.macd_fast as i64);
    let macd_slow = config.get_int(section, "macd_slow", d.macd_slow as i64);
    if macd_fast >= macd_slow {
        return Err(invalid(section, "macd_fast", "macd_fast must be less than macd_slow"));
    }
    if config.get_double(section, "bb_stddev", d.bb_stddev) <= 0.0 {
        return Err(invalid(section, "bb_stddev", "bb_stddev must be positive"));
    }
    Ok(())
}

fn validate_scoring(config: &dyn ConfigPort, section: &str) -> Result<(), TechSignalError> {
    let w = ScoringWeights::default();
    let weights = [
        ("weight_trend", w.trend),
        ("weight_macd", w.macd),
        ("weight_rsi", w.rsi),
        ("weight_bollinger", w.bollinger),
        ("weight_stochastic", w.stochastic),
    ];
    for (key, default) in weights {
        if config.get_int(section, key, default as i64) < 0 {
            return Err(invalid(section, key, format!("{} must be non-negative", key)));
        }
    }

    let t = ScoringThresholds::default();
    let bands = [
        ("rsi_oversold", t.rsi_oversold, "rsi_overbought", t.rsi_overbought),
        ("stoch_oversold", t.stoch_oversold, "stoch_overbought", t.stoch_overbought),
    ];
    for (low_key, low_default, high_key, high_default) in bands {
        let low = config.get_double(section, low_key, low_default);
        let high = config.get_double(section, high_key, high_default);
        for (key, value) in [(low_key, low), (high_key, high)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(invalid(section, key, format!("{} must lie within [0, 100]", key)));
            }
        }
        if low >= high {
            return Err(invalid(
                section,
                low_key,
                format!("{} must be less than {}", low_key, high_key),
            ));
        }
    }

    let signal = config.get_int(section, "signal_threshold", t.signal_threshold as i64);
    if signal < 1 {
        return Err(invalid(
            section,
            "signal_threshold",
            "signal_threshold must be at least 1",
        ));
    }
    let high = config.get_int(section, "high_confidence", t.high_confidence as i64);
    let medium = config.get_int(section, "medium_confidence", t.medium_confidence as i64);
    if medium < 0 || medium > high {
        return Err(invalid(
            section,
            "medium_confidence",
            "medium_confidence must be between 0 and high_confidence",
        ));
    }
    Ok(())
}
