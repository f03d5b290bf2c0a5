//! Open positions and closed trades.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// The side a directional signal asks for. NEUTRAL has none.
    pub fn from_signal(signal: Signal) -> Option<Side> {
        match signal {
            Signal::Long => Some(Side::Long),
            Signal::Short => Some(Side::Short),
            Signal::Neutral => None,
        }
    }

    pub fn signal(self) -> Signal {
        match self {
            Side::Long => Signal::Long,
            Side::Short => Signal::Short,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signal())
    }
}

/// Signed fractional return of a round trip.
pub fn pnl_fraction(side: Side, entry_price: f64, exit_price: f64) -> f64 {
    match side {
        Side::Long => (exit_price - entry_price) / entry_price,
        Side::Short => (entry_price - exit_price) / entry_price,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    /// ATR at entry; the stop distance stays fixed for the life of the position.
    pub entry_atr: f64,
    pub entry_timestamp: Option<NaiveDateTime>,
}

impl Position {
    pub fn stop_price(&self, atr_multiplier: f64) -> f64 {
        let distance = atr_multiplier * self.entry_atr;
        match self.side {
            Side::Long => self.entry_price - distance,
            Side::Short => self.entry_price + distance,
        }
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        pnl_fraction(self.side, self.entry_price, price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    StopLoss,
    /// Opposite directional signal.
    SignalFlip,
    /// NEUTRAL signal under the any-change exit policy.
    NeutralExit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "STOP_LOSS"),
            ExitReason::SignalFlip => write!(f, "SIGNAL_FLIP"),
            ExitReason::NeutralExit => write!(f, "NEUTRAL_EXIT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl_fraction: f64,
    pub exit_reason: ExitReason,
    pub entry_timestamp: Option<NaiveDateTime>,
    pub exit_timestamp: NaiveDateTime,
}

impl Trade {
    pub fn close(
        position: &Position,
        exit_price: f64,
        exit_reason: ExitReason,
        exit_timestamp: NaiveDateTime,
    ) -> Trade {
        Trade {
            side: position.side,
            entry_price: position.entry_price,
            exit_price,
            pnl_fraction: pnl_fraction(position.side, position.entry_price, exit_price),
            exit_reason,
            entry_timestamp: position.entry_timestamp,
            exit_timestamp,
        }
    }

    pub fn is_win(&self) -> bool {
        self.pnl_fraction > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn long_position() -> Position {
        Position {
            side: Side::Long,
            entry_price: 100.0,
            entry_atr: 5.0,
            entry_timestamp: Some(ts()),
        }
    }

    #[test]
    fn stop_price_long_and_short() {
        let long = long_position();
        assert_relative_eq!(long.stop_price(2.0), 90.0);
        let short = Position {
            side: Side::Short,
            ..long
        };
        assert_relative_eq!(short.stop_price(2.0), 110.0);
    }

    #[test]
    fn pnl_fraction_signs() {
        assert_relative_eq!(pnl_fraction(Side::Long, 100.0, 110.0), 0.1);
        assert_relative_eq!(pnl_fraction(Side::Short, 100.0, 110.0), -0.1);
        assert_relative_eq!(pnl_fraction(Side::Short, 100.0, 90.0), 0.1);
    }

    #[test]
    fn close_builds_trade() {
        let trade = Trade::close(&long_position(), 90.0, ExitReason::StopLoss, ts());
        assert_eq!(trade.side, Side::Long);
        assert_relative_eq!(trade.pnl_fraction, -0.1);
        assert!(!trade.is_win());
        assert_eq!(trade.entry_timestamp, Some(ts()));
    }

    #[test]
    fn break_even_is_not_a_win() {
        let trade = Trade::close(&long_position(), 100.0, ExitReason::NeutralExit, ts());
        assert!(!trade.is_win());
    }

    #[test]
    fn side_signal_mapping() {
        assert_eq!(Side::from_signal(Signal::Long), Some(Side::Long));
        assert_eq!(Side::from_signal(Signal::Neutral), None);
        assert_eq!(Side::Short.signal(), Signal::Short);
        assert_eq!(Side::Short.to_string(), "SHORT");
    }

    #[test]
    fn exit_reason_labels() {
        assert_eq!(ExitReason::StopLoss.to_string(), "STOP_LOSS");
        assert_eq!(ExitReason::SignalFlip.to_string(), "SIGNAL_FLIP");
        assert_eq!(ExitReason::NeutralExit.to_string(), "NEUTRAL_EXIT");
    }
}
