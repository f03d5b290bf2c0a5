//! Position state machine.
//!
//! Holds at most one open position. Each bar is processed in a fixed order:
//! stop-loss check, then signal-driven exit, then entry. At most one transition
//! happens per bar, so a position closed on a bar is never reopened on that
//! same bar.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::ohlcv::Bar;
use crate::domain::position::{ExitReason, Position, Side, Trade};
use crate::domain::signal::Signal;

/// When a NEUTRAL signal closes an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitMode {
    /// Only an opposite directional signal exits.
    StrictReversal,
    /// Any signal other than the held side exits, including NEUTRAL.
    AnyChange,
}

impl fmt::Display for ExitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitMode::StrictReversal => write!(f, "strict_reversal"),
            ExitMode::AnyChange => write!(f, "any_change"),
        }
    }
}

impl FromStr for ExitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict_reversal" => Ok(ExitMode::StrictReversal),
            "any_change" => Ok(ExitMode::AnyChange),
            other => Err(format!(
                "unknown exit mode '{other}' (expected strict_reversal or any_change)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Hold,
    Enter(Side),
    Exit { side: Side, reason: ExitReason },
    /// A signal was staged for confirmation on the next bar.
    Stage(Side),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Hold => write!(f, "HOLD"),
            Action::Enter(side) => write!(f, "ENTER_{side}"),
            Action::Exit { side, reason } => write!(f, "EXIT_{side}({reason})"),
            Action::Stage(side) => write!(f, "SIGNAL_{side}(PENDING)"),
        }
    }
}

impl Action {
    pub fn is_entry_or_exit(&self) -> bool {
        matches!(self, Action::Enter(_) | Action::Exit { .. })
    }
}

/// Classified signal plus the ATR used to size a new stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarReading {
    pub signal: Signal,
    pub atr: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub action: Action,
    pub trade: Option<Trade>,
}

impl Transition {
    fn hold() -> Self {
        Transition {
            action: Action::Hold,
            trade: None,
        }
    }

    fn exit(trade: Trade) -> Self {
        Transition {
            action: Action::Exit {
                side: trade.side,
                reason: trade.exit_reason,
            },
            trade: Some(trade),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PositionStateMachine {
    position: Option<Position>,
    exit_mode: ExitMode,
    atr_multiplier: f64,
}

impl PositionStateMachine {
    pub fn new(exit_mode: ExitMode, atr_multiplier: f64) -> Self {
        Self {
            position: None,
            exit_mode,
            atr_multiplier,
        }
    }

    pub fn with_position(mut self, position: Option<Position>) -> Self {
        self.position = position;
        self
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Close the position if this bar reaches its stop.
    ///
    /// A bar that opens beyond the stop fills at the open instead of the stop.
    pub fn check_stop_loss(&mut self, bar: &Bar) -> Option<Trade> {
        let position = self.position.as_ref()?;
        let stop = position.stop_price(self.atr_multiplier);
        let exit_price = match position.side {
            Side::Long if bar.low <= stop => bar.open.min(stop),
            Side::Short if bar.high >= stop => bar.open.max(stop),
            _ => return None,
        };
        let trade = Trade::close(position, exit_price, ExitReason::StopLoss, bar.timestamp);
        self.position = None;
        Some(trade)
    }

    /// Close the position at the bar's close if the signal calls for it.
    pub fn check_signal_exit(&mut self, bar: &Bar, signal: Signal) -> Option<Trade> {
        let position = self.position.as_ref()?;
        let reason = match (Side::from_signal(signal), self.exit_mode) {
            (Some(side), _) if side == position.side => return None,
            (Some(_), _) => ExitReason::SignalFlip,
            (None, ExitMode::AnyChange) => ExitReason::NeutralExit,
            (None, ExitMode::StrictReversal) => return None,
        };
        let trade = Trade::close(position, bar.close, reason, bar.timestamp);
        self.position = None;
        Some(trade)
    }

    pub fn open(&mut self, side: Side, bar: &Bar, atr: f64) {
        self.position = Some(Position {
            side,
            entry_price: bar.close,
            entry_atr: atr,
            entry_timestamp: Some(bar.timestamp),
        });
    }

    /// Process one bar. `reading` is `None` while indicators are undefined; the
    /// stop is still honoured but no signal transition happens.
    pub fn step(&mut self, bar: &Bar, reading: Option<BarReading>) -> Transition {
        if let Some(trade) = self.check_stop_loss(bar) {
            return Transition::exit(trade);
        }
        let Some(reading) = reading else {
            return Transition::hold();
        };
        if let Some(trade) = self.check_signal_exit(bar, reading.signal) {
            return Transition::exit(trade);
        }
        match Side::from_signal(reading.signal) {
            Some(side) if self.is_flat() => {
                self.open(side, bar, reading.atr);
                Transition {
                    action: Action::Enter(side),
                    trade: None,
                }
            }
            _ => Transition::hold(),
        }
    }
}
