//! Live (incremental) stepping.
//!
//! A live run evaluates only the latest bar against the persisted
//! `StrategyState`. With entry confirmation enabled a new directional signal is
//! first staged as pending and committed on the following bar at that bar's
//! close and ATR, regardless of what the signal says by then. The stop-loss
//! check always runs first.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::error::TechSignalError;
use crate::domain::ohlcv::Bar;
use crate::domain::position::{Position, Side, Trade};
use crate::domain::signal::{Classification, Evaluation, Signal, classify};
use crate::domain::snapshot::{IndicatorSnapshot, compute_snapshots};
use crate::domain::state_machine::{Action, BarReading, PositionStateMachine};
use crate::domain::strategy::StrategyConfig;

/// Persisted per-instrument record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyState {
    #[serde(alias = "signal")]
    pub current_signal: Signal,
    #[serde(default)]
    pub entry_price: f64,
    #[serde(default)]
    pub entry_atr: f64,
    #[serde(default)]
    pub pending_signal: Option<Signal>,
}

impl Default for StrategyState {
    fn default() -> Self {
        Self {
            current_signal: Signal::Neutral,
            entry_price: 0.0,
            entry_atr: 0.0,
            pending_signal: None,
        }
    }
}

impl StrategyState {
    pub fn from_position(position: Option<&Position>, pending: Option<Side>) -> Self {
        match position {
            Some(p) => Self {
                current_signal: p.side.signal(),
                entry_price: p.entry_price,
                entry_atr: p.entry_atr,
                pending_signal: None,
            },
            None => Self {
                pending_signal: pending.map(Side::signal),
                ..Self::default()
            },
        }
    }

    pub fn position(&self) -> Option<Position> {
        Side::from_signal(self.current_signal).map(|side| Position {
            side,
            entry_price: self.entry_price,
            entry_atr: self.entry_atr,
            entry_timestamp: None,
        })
    }

    pub fn pending_side(&self) -> Option<Side> {
        self.pending_signal.and_then(Side::from_signal)
    }

    /// Reject records that decode but cannot describe a real position.
    pub fn validate(&self) -> Result<(), String> {
        if self.current_signal != Signal::Neutral {
            if !(self.entry_price.is_finite() && self.entry_price > 0.0) {
                return Err(format!(
                    "held {} position has entry_price {}",
                    self.current_signal, self.entry_price
                ));
            }
            if !(self.entry_atr.is_finite() && self.entry_atr >= 0.0) {
                return Err(format!(
                    "held {} position has entry_atr {}",
                    self.current_signal, self.entry_atr
                ));
            }
        }
        match self.pending_signal {
            Some(Signal::Neutral) => Err("pending_signal cannot be NEUTRAL".to_string()),
            Some(pending) if self.current_signal != Signal::Neutral => Err(format!(
                "pending {} while holding {}",
                pending, self.current_signal
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveStep {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub classification: Classification,
    pub snapshot: IndicatorSnapshot,
    pub action: Action,
    /// Side staged for confirmation on the next bar.
    pub staged: Option<Side>,
    pub trade: Option<Trade>,
    pub state: StrategyState,
    /// Whether `state` differs from the prior record and must be saved.
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiveOutcome {
    Stepped(Box<LiveStep>),
    /// The latest bar has undefined indicators; nothing was decided.
    IndicatorsUndefined { timestamp: NaiveDateTime, price: f64 },
    /// The latest bar was already decided by an earlier run.
    AlreadyProcessed { timestamp: NaiveDateTime },
}

/// Evaluate the latest bar of `bars` against `state`.
pub fn advance(
    state: &StrategyState,
    bars: &[Bar],
    config: &StrategyConfig,
) -> Result<LiveOutcome, TechSignalError> {
    let minimum = config.indicators.minimum_bars();
    let Some(bar) = bars.last().filter(|_| bars.len() >= minimum) else {
        return Err(TechSignalError::InsufficientData {
            instrument: config.name.clone(),
            bars: bars.len(),
            minimum,
        });
    };

    let snapshots = compute_snapshots(bars, &config.indicators);
    let last = bars.len() - 1;
    let evaluation = classify(
        snapshots[last].as_ref(),
        snapshots[last - 1].as_ref(),
        &config.scoring,
    );
    let (classification, snapshot) = match (evaluation, &snapshots[last]) {
        (Evaluation::Ready(c), Some(snap)) => (c, snap.clone()),
        _ => {
            return Ok(LiveOutcome::IndicatorsUndefined {
                timestamp: bar.timestamp,
                price: bar.close,
            });
        }
    };

    let reading = BarReading {
        signal: classification.signal,
        atr: snapshot.atr,
    };
    let mut machine = PositionStateMachine::new(config.exit_mode, config.atr_multiplier)
        .with_position(state.position());

    let (action, trade, staged) = if config.confirm_entries {
        step_confirmed(&mut machine, state, bar, reading)
    } else {
        let transition = machine.step(bar, Some(reading));
        (transition.action, transition.trade, None)
    };

    let next = StrategyState::from_position(machine.position(), staged);
    let changed = next != *state;
    Ok(LiveOutcome::Stepped(Box::new(LiveStep {
        timestamp: bar.timestamp,
        price: bar.close,
        classification,
        snapshot,
        action,
        staged,
        trade,
        state: next,
        changed,
    })))
}

fn step_confirmed(
    machine: &mut PositionStateMachine,
    state: &StrategyState,
    bar: &Bar,
    reading: BarReading,
) -> (Action, Option<Trade>, Option<Side>) {
    if let Some(trade) = machine.check_stop_loss(bar) {
        let action = Action::Exit {
            side: trade.side,
            reason: trade.exit_reason,
        };
        return (action, Some(trade), None);
    }

    if let Some(side) = state.pending_side().filter(|_| machine.is_flat()) {
        machine.open(side, bar, reading.atr);
        return (Action::Enter(side), None, None);
    }

    let trade = machine.check_signal_exit(bar, reading.signal);
    let staged = if machine.is_flat() {
        Side::from_signal(reading.signal)
    } else {
        None
    };
    let action = match (&trade, staged) {
        (Some(t), _) => Action::Exit {
            side: t.side,
            reason: t.exit_reason,
        },
        (None, Some(side)) => Action::Stage(side),
        (None, None) => Action::Hold,
    };
    (action, trade, staged)
}
