//! Exponential Moving Average indicator.
//!
//! alpha = 2/(n+1), EMA[0] = C[0], EMA[i] = alpha*C[i] + (1-alpha)*EMA[i-1].
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::{ema_values, simple_point};
use crate::domain::ohlcv::{Bar, closes};

pub fn calculate_ema(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type: IndicatorType::Ema(period),
            values: Vec::new(),
        };
    }

    let ema = ema_values(&closes(bars), period);
    let values = bars
        .iter()
        .zip(ema)
        .enumerate()
        .map(|(i, (bar, v))| simple_point(bar.timestamp, (i + 1 >= period).then_some(v)))
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}
