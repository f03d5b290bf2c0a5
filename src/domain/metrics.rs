//! Backtest trade statistics.

use chrono::NaiveDateTime;

use crate::domain::backtest::HistoryRecord;
use crate::domain::position::{ExitReason, Trade};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestStats {
    pub total_trades: usize,
    /// Trades with pnl > 0.
    pub wins: usize,
    /// Trades with pnl <= 0.
    pub losses: usize,
    /// Fraction of trades won, 0.0 to 1.0.
    pub win_rate: f64,
    /// Sum of per-trade fractional returns.
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub stop_loss_exits: usize,
    pub signal_flip_exits: usize,
    pub neutral_exits: usize,
    pub initial_balance: f64,
    /// initial_balance compounded through every trade in order.
    pub final_balance: f64,
    /// Largest peak-to-trough decline of the compounded balance, as a fraction.
    pub max_drawdown: f64,
}

impl BacktestStats {
    pub fn compute(trades: &[Trade], initial_balance: f64) -> Self {
        let mut wins = 0usize;
        let mut total_pnl = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut stop_loss_exits = 0usize;
        let mut signal_flip_exits = 0usize;
        let mut neutral_exits = 0usize;
        let mut balance = initial_balance;
        let mut peak = initial_balance;
        let mut max_drawdown = 0.0_f64;

        for trade in trades {
            let pnl = trade.pnl_fraction;
            total_pnl += pnl;
            if trade.is_win() {
                wins += 1;
                largest_win = largest_win.max(pnl);
            } else {
                largest_loss = largest_loss.min(pnl);
            }
            match trade.exit_reason {
                ExitReason::StopLoss => stop_loss_exits += 1,
                ExitReason::SignalFlip => signal_flip_exits += 1,
                ExitReason::NeutralExit => neutral_exits += 1,
            }

            balance *= 1.0 + pnl;
            if balance > peak {
                peak = balance;
            } else if peak > 0.0 {
                max_drawdown = max_drawdown.max((peak - balance) / peak);
            }
        }

        let total_trades = trades.len();
        let (win_rate, avg_pnl) = if total_trades > 0 {
            (
                wins as f64 / total_trades as f64,
                total_pnl / total_trades as f64,
            )
        } else {
            (0.0, 0.0)
        };

        BacktestStats {
            total_trades,
            wins,
            losses: total_trades - wins,
            win_rate,
            total_pnl,
            avg_pnl,
            largest_win,
            largest_loss,
            stop_loss_exits,
            signal_flip_exits,
            neutral_exits,
            initial_balance,
            final_balance: balance,
            max_drawdown,
        }
    }
}

/// Statistics for one instrument over one timeframe.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeframeStats {
    pub timeframe: String,
    pub stats: BacktestStats,
}

/// The run with the highest total pnl; the earliest listed wins a tie.
pub fn best_timeframe(runs: &[TimeframeStats]) -> Option<&TimeframeStats> {
    runs.iter().fold(None, |best: Option<&TimeframeStats>, run| match best {
        Some(b) if b.stats.total_pnl >= run.stats.total_pnl => Some(b),
        _ => Some(run),
    })
}

/// Entries and exits at or after `since`, oldest first.
pub fn recent_actions(history: &[HistoryRecord], since: NaiveDateTime) -> Vec<&HistoryRecord> {
    history
        .iter()
        .filter(|r| r.timestamp >= since && r.action.is_entry_or_exit())
        .collect()
}
