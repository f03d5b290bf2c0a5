//! Shared helper functions for indicator calculations.
//!
//! These operate on plain value sequences so the calculators can chain them
//! (MACD signal is an EMA of the MACD line, %D is an SMA of %K). `None` marks an
//! undefined value and propagates through any window that contains it.

use chrono::NaiveDateTime;

use crate::domain::indicator::{IndicatorPoint, IndicatorValue};
use crate::domain::ohlcv::Bar;

/// Recursive EMA seeded at the first value, alpha = 2/(period+1).
///
/// Every index gets a value; callers decide where the warm-up ends.
pub fn ema_values(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// Simple moving average over a trailing window. Any undefined value inside
/// the window makes the result undefined.
pub fn rolling_mean(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if period == 0 || i + 1 < period {
            out.push(None);
            continue;
        }
        let window = &values[i + 1 - period..=i];
        let sum: Option<f64> = window.iter().copied().sum();
        out.push(sum.map(|s| s / period as f64));
    }
    out
}

/// Sample standard deviation (n-1 denominator) over a trailing window.
pub fn rolling_sample_stddev(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if period < 2 || i + 1 < period {
            out.push(None);
            continue;
        }
        let window = &values[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance =
            window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (period - 1) as f64;
        out.push(Some(variance.sqrt()));
    }
    out
}

/// True range per bar; the first bar has no previous close and uses high - low.
pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

pub fn simple_point(timestamp: NaiveDateTime, value: Option<f64>) -> IndicatorPoint {
    match value {
        Some(v) if v.is_finite() => IndicatorPoint {
            timestamp,
            valid: true,
            value: IndicatorValue::Simple(v),
        },
        _ => IndicatorPoint {
            timestamp,
            valid: false,
            value: IndicatorValue::Simple(0.0),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ema_values_seeds_at_first_value() {
        let out = ema_values(&[10.0, 20.0, 30.0], 3);
        // alpha = 0.5
        assert_relative_eq!(out[0], 10.0);
        assert_relative_eq!(out[1], 15.0);
        assert_relative_eq!(out[2], 22.5);
    }

    #[test]
    fn ema_values_constant_input() {
        let out = ema_values(&[7.0; 10], 4);
        assert!(out.iter().all(|v| (v - 7.0).abs() < f64::EPSILON));
    }

    #[test]
    fn rolling_mean_warmup_and_values() {
        let input: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0].iter().map(|v| Some(*v)).collect();
        let out = rolling_mean(&input, 2);
        assert_eq!(out[0], None);
        assert_relative_eq!(out[1].unwrap(), 1.5);
        assert_relative_eq!(out[3].unwrap(), 3.5);
    }

    #[test]
    fn rolling_mean_propagates_undefined() {
        let input = vec![Some(1.0), None, Some(3.0), Some(5.0)];
        let out = rolling_mean(&input, 2);
        assert_eq!(out[1], None);
        assert_eq!(out[2], None);
        assert_relative_eq!(out[3].unwrap(), 4.0);
    }

    #[test]
    fn sample_stddev_uses_n_minus_one() {
        let out = rolling_sample_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8);
        // Sum of squared deviations = 32, / 7
        assert_relative_eq!(out[7].unwrap(), (32.0_f64 / 7.0).sqrt());
        assert!(out[6].is_none());
    }

    #[test]
    fn simple_point_rejects_non_finite() {
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(!simple_point(ts, Some(f64::NAN)).valid);
        assert!(!simple_point(ts, None).valid);
        assert!(simple_point(ts, Some(1.0)).valid);
    }
}
