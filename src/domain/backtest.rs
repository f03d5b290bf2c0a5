//! Backtest engine.
//!
//! Replays a bar history through the scorer and the position state machine.
//! Scoring starts at the warm-up index; earlier bars only feed the indicators.
//! Entries commit on the signal bar's close (no confirmation delay).

use chrono::NaiveDateTime;

use crate::domain::error::TechSignalError;
use crate::domain::ohlcv::Bar;
use crate::domain::position::{Position, Trade};
use crate::domain::signal::{Classification, Evaluation, Signal, classify};
use crate::domain::snapshot::{IndicatorSnapshot, compute_snapshots};
use crate::domain::state_machine::{Action, BarReading, PositionStateMachine};
use crate::domain::strategy::StrategyConfig;

/// One processed bar.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    /// `None` while the bar's indicators are undefined.
    pub signal: Option<Signal>,
    pub score: Option<i32>,
    pub action: Action,
    /// Realized fractional PnL on this bar, 0 when nothing closed.
    pub pnl: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub instrument: String,
    pub start_index: usize,
    pub history: Vec<HistoryRecord>,
    pub trades: Vec<Trade>,
    pub open_position: Option<Position>,
    pub last_classification: Option<Classification>,
    pub last_snapshot: Option<IndicatorSnapshot>,
}

pub fn run_backtest(
    bars: &[Bar],
    config: &StrategyConfig,
) -> Result<BacktestResult, TechSignalError> {
    let minimum = config.indicators.minimum_bars();
    if bars.len() < minimum {
        return Err(TechSignalError::InsufficientData {
            instrument: config.name.clone(),
            bars: bars.len(),
            minimum,
        });
    }

    let snapshots = compute_snapshots(bars, &config.indicators);
    let start_index = config.indicators.warmup_bars();
    let mut machine = PositionStateMachine::new(config.exit_mode, config.atr_multiplier);
    let mut history = Vec::with_capacity(bars.len() - start_index);
    let mut trades = Vec::new();
    let mut last_classification = None;

    for i in start_index..bars.len() {
        let bar = &bars[i];
        let evaluation = classify(
            snapshots[i].as_ref(),
            snapshots[i - 1].as_ref(),
            &config.scoring,
        );
        let reading = match (&evaluation, &snapshots[i]) {
            (Evaluation::Ready(c), Some(snap)) => Some(BarReading {
                signal: c.signal,
                atr: snap.atr,
            }),
            _ => None,
        };

        let transition = machine.step(bar, reading);
        let pnl = transition.trade.as_ref().map_or(0.0, |t| t.pnl_fraction);
        if let Some(trade) = transition.trade {
            trades.push(trade);
        }

        let classification = evaluation.classification();
        history.push(HistoryRecord {
            timestamp: bar.timestamp,
            price: bar.close,
            signal: classification.map(|c| c.signal),
            score: classification.map(|c| c.score),
            action: transition.action,
            pnl,
        });
        if let Evaluation::Ready(c) = evaluation {
            last_classification = Some(c);
        }
    }

    Ok(BacktestResult {
        instrument: config.name.clone(),
        start_index,
        history,
        trades,
        open_position: machine.position().cloned(),
        last_classification,
        last_snapshot: snapshots.last().cloned().flatten(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::tests::wave_bars;
    use crate::domain::position::{ExitReason, Side};
    use crate::domain::snapshot::IndicatorParams;
    use crate::domain::state_machine::ExitMode;

    #[test]
    fn insufficient_history_rejected() {
        let config = StrategyConfig::new("eth", "ETH/USDT", ExitMode::AnyChange);
        let err = run_backtest(&wave_bars(200), &config).unwrap_err();
        assert!(matches!(
            err,
            TechSignalError::InsufficientData {
                bars: 200,
                minimum: 201,
                ..
            }
        ));
    }

    #[test]
    fn minimum_history_scores_one_bar() {
        let config = StrategyConfig::new("eth", "ETH/USDT", ExitMode::AnyChange);
        let result = run_backtest(&wave_bars(201), &config).unwrap();
        assert_eq!(result.start_index, 200);
        assert_eq!(result.history.len(), 1);
        assert!(result.history[0].signal.is_some());
    }

    #[test]
    fn wave_any_change_trades() {
        let config = StrategyConfig::new("eth", "ETH/USDT", ExitMode::AnyChange);
        let result = run_backtest(&wave_bars(250), &config).unwrap();
        assert_eq!(result.history.len(), 50);
        assert_eq!(result.trades.len(), 2);
        for trade in &result.trades {
            assert_eq!(trade.side, Side::Long);
            assert_eq!(trade.exit_reason, ExitReason::NeutralExit);
            assert!(trade.pnl_fraction > 0.0);
        }
        // Entry at bar 217 is the 18th scored bar.
        assert_eq!(result.history[17].action, Action::Enter(Side::Long));
        assert!(matches!(result.history[18].action, Action::Exit { .. }));
        assert!(result.history[18].pnl > 0.0);
        assert!(result.open_position.is_none());
    }

    #[test]
    fn one_transition_per_bar() {
        let config = StrategyConfig::new("eth", "ETH/USDT", ExitMode::AnyChange);
        let result = run_backtest(&wave_bars(250), &config).unwrap();
        let transitions = result
            .history
            .iter()
            .filter(|r| r.action != Action::Hold)
            .count();
        // Two entries and two exits, each on its own bar.
        assert_eq!(transitions, 4);
    }

    #[test]
    fn small_periods_shift_warmup() {
        let mut config = StrategyConfig::new("sol", "SOL/USDT", ExitMode::StrictReversal);
        config.indicators = IndicatorParams {
            ema_fast: 5,
            ema_slow: 20,
            ..IndicatorParams::default()
        };
        let result = run_backtest(&wave_bars(60), &config).unwrap();
        assert_eq!(result.start_index, 34);
        assert_eq!(result.history.len(), 26);
    }
}
