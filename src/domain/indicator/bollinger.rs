//! Bollinger Bands: SMA(period) ± k × sample standard deviation.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::{rolling_mean, rolling_sample_stddev};
use crate::domain::ohlcv::{Bar, closes};

pub fn calculate_bollinger(bars: &[Bar], period: usize, stddev_mult: f64) -> IndicatorSeries {
    let indicator_type = IndicatorType::Bollinger {
        period,
        stddev_mult_x100: (stddev_mult * 100.0).round() as u32,
    };
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let prices = closes(bars);
    let wrapped: Vec<Option<f64>> = prices.iter().map(|p| Some(*p)).collect();
    let middle = rolling_mean(&wrapped, period);
    let stddev = rolling_sample_stddev(&prices, period);

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| match (middle[i], stddev[i]) {
            (Some(mid), Some(sd)) => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Bollinger {
                    upper: mid + stddev_mult * sd,
                    middle: mid,
                    lower: mid - stddev_mult * sd,
                },
            },
            _ => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: false,
                value: IndicatorValue::Bollinger {
                    upper: 0.0,
                    middle: 0.0,
                    lower: 0.0,
                },
            },
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
