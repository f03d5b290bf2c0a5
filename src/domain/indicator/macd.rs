//! Moving Average Convergence Divergence.
//!
//! line = EMA(fast) - EMA(slow), signal = EMA(signal) of the line, both using
//! the recursion seeded at the first value. A point is valid once the slow EMA
//! and the signal EMA have both warmed up.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::ema_values;
use crate::domain::ohlcv::{Bar, closes};

pub fn calculate_macd(bars: &[Bar], fast: usize, slow: usize, signal: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd { fast, slow, signal };
    if fast == 0 || slow == 0 || signal == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let prices = closes(bars);
    let fast_ema = ema_values(&prices, fast);
    let slow_ema = ema_values(&prices, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ema_values(&line, signal);
    let first_valid = slow.max(fast) - 1 + signal - 1;

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| IndicatorPoint {
            timestamp: bar.timestamp,
            valid: i >= first_valid,
            value: IndicatorValue::Macd {
                line: line[i],
                signal: signal_line[i],
                histogram: line[i] - signal_line[i],
            },
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
