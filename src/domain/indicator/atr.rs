//! Average True Range as a simple moving average of true range.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::{rolling_mean, simple_point, true_ranges};
use crate::domain::ohlcv::Bar;

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type: IndicatorType::Atr(period),
            values: Vec::new(),
        };
    }

    let tr: Vec<Option<f64>> = true_ranges(bars).into_iter().map(Some).collect();
    let atr = rolling_mean(&tr, period);
    let values = bars
        .iter()
        .zip(atr)
        .map(|(bar, v)| simple_point(bar.timestamp, v))
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}
