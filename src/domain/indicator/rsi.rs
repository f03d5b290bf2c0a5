//! Relative Strength Index.
//!
//! Uses simple averages of gains and losses over the trailing `period` price
//! changes. RSI = 100 - 100/(1 + avg_gain/avg_loss). When the average loss is
//! zero the ratio is undefined and the point is invalid.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::simple_point;
use crate::domain::ohlcv::Bar;

pub fn calculate_rsi(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type: IndicatorType::Rsi(period),
            values: Vec::new(),
        };
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let rsi = if i >= period {
                let (gain_sum, loss_sum) = bars[i + 1 - period..=i]
                    .iter()
                    .zip(&bars[i - period..i])
                    .fold((0.0, 0.0), |(g, l), (cur, prev)| {
                        let delta = cur.close - prev.close;
                        (g + delta.max(0.0), l + (-delta).max(0.0))
                    });
                let avg_gain = gain_sum / period as f64;
                let avg_loss = loss_sum / period as f64;
                if avg_loss == 0.0 {
                    None
                } else {
                    Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
                }
            } else {
                None
            };
            simple_point(bar.timestamp, rsi)
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}
