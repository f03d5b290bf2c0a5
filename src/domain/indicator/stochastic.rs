//! Stochastic oscillator.
//!
//! raw = 100 × (close - lowest low) / (highest high - lowest low) over `period`
//! bars, undefined when the range is flat. %K = SMA(k_smooth) of raw,
//! %D = SMA(d_smooth) of %K.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::rolling_mean;
use crate::domain::ohlcv::Bar;

pub fn calculate_stochastic(
    bars: &[Bar],
    period: usize,
    k_smooth: usize,
    d_smooth: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Stochastic {
        period,
        k_smooth,
        d_smooth,
    };
    if period == 0 || k_smooth == 0 || d_smooth == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let raw: Vec<Option<f64>> = (0..bars.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &bars[i + 1 - period..=i];
            let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            let highest = window
                .iter()
                .map(|b| b.high)
                .fold(f64::NEG_INFINITY, f64::max);
            let range = highest - lowest;
            if range == 0.0 {
                None
            } else {
                Some(100.0 * (bars[i].close - lowest) / range)
            }
        })
        .collect();

    let k_line = rolling_mean(&raw, k_smooth);
    let d_line = rolling_mean(&k_line, d_smooth);

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| match (k_line[i], d_line[i]) {
            (Some(k), Some(d)) => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Stochastic { k, d },
            },
            _ => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: false,
                value: IndicatorValue::Stochastic { k: 0.0, d: 0.0 },
            },
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn make_bar(i: usize, high: f64, low: f64, close: f64) -> Bar {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Bar {
            timestamp: start + Duration::hours(i as i64),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    fn k_d(point: &IndicatorPoint) -> (f64, f64) {
        match point.value {
            IndicatorValue::Stochastic { k, d } => (k, d),
            _ => panic!("expected Stochastic value"),
        }
    }

    #[test]
    fn stochastic_warmup_period_plus_smoothing() {
        let bars: Vec<Bar> = (0..10)
            .map(|i| make_bar(i, 10.0 + i as f64, 5.0 + i as f64, 8.0 + i as f64))
            .collect();
        let series = calculate_stochastic(&bars, 3, 2, 2);
        // raw valid from 2, K from 3, D from 4
        assert!(!series.values[3].valid);
        assert!(series.values[4].valid);
    }

    #[test]
    fn stochastic_smoothing_values() {
        let bars = vec![
            make_bar(0, 10.0, 0.0, 5.0),
            make_bar(1, 10.0, 0.0, 10.0),
            make_bar(2, 10.0, 0.0, 0.0),
        ];
        let series = calculate_stochastic(&bars, 1, 2, 2);
        // raw: 50, 100, 0; K: -, 75, 50; D: -, -, 62.5
        let (k, d) = k_d(&series.values[2]);
        assert_relative_eq!(k, 50.0);
        assert_relative_eq!(d, 62.5);
    }

    #[test]
    fn stochastic_flat_range_undefined() {
        let bars: Vec<Bar> = (0..8).map(|i| make_bar(i, 10.0, 10.0, 10.0)).collect();
        let series = calculate_stochastic(&bars, 3, 1, 1);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn stochastic_bounded() {
        let bars: Vec<Bar> = (0..30)
            .map(|i| {
                let c = 50.0 + (i as f64 * 0.7).sin() * 10.0;
                make_bar(i, c + 1.0, c - 1.0, c)
            })
            .collect();
        let series = calculate_stochastic(&bars, 14, 3, 3);
        for point in series.values.iter().filter(|p| p.valid) {
            let (k, d) = k_d(point);
            assert!((0.0..=100.0).contains(&k));
            assert!((0.0..=100.0).contains(&d));
        }
    }
}
