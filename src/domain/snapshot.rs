//! Per-bar indicator snapshots.
//!
//! `compute_snapshots` runs every indicator over the bar history and zips the
//! results into one `IndicatorSnapshot` per bar. A bar whose indicators are not
//! all defined yields `None`, which the scorer treats as "still warming up".

use crate::domain::indicator::{
    IndicatorValue, calculate_atr, calculate_bollinger, calculate_ema, calculate_macd,
    calculate_rsi, calculate_stochastic,
};
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_stddev: f64,
    pub stoch_period: usize,
    pub stoch_k_smooth: usize,
    pub stoch_d_smooth: usize,
    pub atr_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            ema_fast: 50,
            ema_slow: 200,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_stddev: 2.0,
            stoch_period: 14,
            stoch_k_smooth: 3,
            stoch_d_smooth: 3,
            atr_period: 14,
        }
    }
}

impl IndicatorParams {
    /// Index of the first bar whose snapshot is defined on a well-behaved series.
    pub fn first_defined_index(&self) -> usize {
        [
            self.ema_fast.saturating_sub(1),
            self.ema_slow.saturating_sub(1),
            self.rsi_period,
            (self.macd_fast.max(self.macd_slow) + self.macd_signal).saturating_sub(2),
            self.bb_period.saturating_sub(1),
            (self.stoch_period + self.stoch_k_smooth + self.stoch_d_smooth).saturating_sub(3),
            self.atr_period.saturating_sub(1),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Index of the first bar that can be scored: its snapshot and the previous
    /// one must both be defined. With the default periods this is 200.
    pub fn warmup_bars(&self) -> usize {
        self.first_defined_index() + 1
    }

    /// Smallest history that yields at least one scorable bar.
    pub fn minimum_bars(&self) -> usize {
        self.warmup_bars() + 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub rsi: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub atr: f64,
}

pub fn compute_snapshots(bars: &[Bar], params: &IndicatorParams) -> Vec<Option<IndicatorSnapshot>> {
    let rsi = calculate_rsi(bars, params.rsi_period);
    let ema_fast = calculate_ema(bars, params.ema_fast);
    let ema_slow = calculate_ema(bars, params.ema_slow);
    let macd = calculate_macd(bars, params.macd_fast, params.macd_slow, params.macd_signal);
    let bollinger = calculate_bollinger(bars, params.bb_period, params.bb_stddev);
    let stochastic = calculate_stochastic(
        bars,
        params.stoch_period,
        params.stoch_k_smooth,
        params.stoch_d_smooth,
    );
    let atr = calculate_atr(bars, params.atr_period);

    (0..bars.len())
        .map(|i| {
            let rsi = rsi.valid_at(i)?.simple()?;
            let ema_fast = ema_fast.valid_at(i)?.simple()?;
            let ema_slow = ema_slow.valid_at(i)?.simple()?;
            let atr = atr.valid_at(i)?.simple()?;
            let (macd, macd_signal) = match macd.valid_at(i)?.value {
                IndicatorValue::Macd { line, signal, .. } => (line, signal),
                _ => return None,
            };
            let (bb_upper, bb_middle, bb_lower) = match bollinger.valid_at(i)?.value {
                IndicatorValue::Bollinger {
                    upper,
                    middle,
                    lower,
                } => (upper, middle, lower),
                _ => return None,
            };
            let (stoch_k, stoch_d) = match stochastic.valid_at(i)?.value {
                IndicatorValue::Stochastic { k, d } => (k, d),
                _ => return None,
            };
            Some(IndicatorSnapshot {
                close: bars[i].close,
                rsi,
                ema_fast,
                ema_slow,
                macd,
                macd_signal,
                bb_upper,
                bb_middle,
                bb_lower,
                stoch_k,
                stoch_d,
                atr,
            })
        })
        .collect()
}
