//! Plain-text report formatting.
//!
//! The live report is what the notifier receives; the backtest summary is what
//! the `backtest` command prints.

use std::fmt::Write;

use crate::domain::analysis;
use crate::domain::backtest::HistoryRecord;
use crate::domain::consensus::ConsensusReport;
use crate::domain::live::LiveStep;
use crate::domain::metrics::{TimeframeStats, best_timeframe};
use crate::domain::strategy::StrategyConfig;

pub fn format_live_report(step: &LiveStep, config: &StrategyConfig) -> String {
    let c = &step.classification;
    let s = &step.snapshot;
    let mut out = String::new();

    let _ = writeln!(out, "=== {} ({}) ===", config.name, config.symbol);
    let _ = writeln!(out, "Time: {}", step.timestamp.format("%Y-%m-%d %H:%M"));
    let _ = writeln!(out, "Price: {:.4}", step.price);
    let _ = writeln!(
        out,
        "Signal: {} ({} confidence, score {:+}/{})",
        c.signal,
        c.confidence,
        c.score,
        config.scoring.weights.max_score()
    );
    let _ = writeln!(out, "Action: {}", step.action);

    if let Some(trade) = &step.trade {
        let _ = writeln!(
            out,
            "Closed {} {:.4} -> {:.4}: {:+.2}%",
            trade.side,
            trade.entry_price,
            trade.exit_price,
            trade.pnl_fraction * 100.0
        );
    }
    match (step.state.position(), step.staged) {
        (Some(position), _) => {
            let _ = writeln!(
                out,
                "Position: {} from {:.4}, stop {:.4}, unrealized {:+.2}%",
                position.side,
                position.entry_price,
                position.stop_price(config.atr_multiplier),
                position.unrealized_pnl(step.price) * 100.0
            );
        }
        (None, Some(side)) => {
            let _ = writeln!(out, "Position: none, {} pending confirmation", side);
        }
        (None, None) => {
            let _ = writeln!(out, "Position: none");
        }
    }

    out.push_str("\nAnalysis:\n");
    for insight in analysis::insights(s, c, config) {
        let _ = writeln!(out, "  - {}", insight);
    }
    if !c.reasons.is_empty() {
        out.push_str("Reasons:\n");
        for reason in &c.reasons {
            let _ = writeln!(out, "  - {}", reason);
        }
    }

    let _ = writeln!(
        out,
        "\nRSI {:.2} | EMA {:.4}/{:.4} | MACD {:.4} (signal {:.4})",
        s.rsi, s.ema_fast, s.ema_slow, s.macd, s.macd_signal
    );
    let _ = writeln!(
        out,
        "BB {:.4}/{:.4}/{:.4} | Stoch {:.2}/{:.2} | ATR {:.4}",
        s.bb_upper, s.bb_middle, s.bb_lower, s.stoch_k, s.stoch_d, s.atr
    );
    out
}

pub fn format_backtest_summary(instrument: &str, runs: &[TimeframeStats]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Backtest: {} ===", instrument);

    for run in runs {
        let st = &run.stats;
        let _ = writeln!(out, "\n[{}]", run.timeframe);
        let _ = writeln!(
            out,
            "  Trades: {} ({} wins / {} losses, win rate {:.1}%)",
            st.total_trades,
            st.wins,
            st.losses,
            st.win_rate * 100.0
        );
        let _ = writeln!(
            out,
            "  Total PnL: {:+.2}%  Avg: {:+.2}%",
            st.total_pnl * 100.0,
            st.avg_pnl * 100.0
        );
        let _ = writeln!(
            out,
            "  Largest win: {:+.2}%  Largest loss: {:+.2}%",
            st.largest_win * 100.0,
            st.largest_loss * 100.0
        );
        let _ = writeln!(
            out,
            "  Exits: {} stop-loss, {} signal flip, {} neutral",
            st.stop_loss_exits, st.signal_flip_exits, st.neutral_exits
        );
        let _ = writeln!(
            out,
            "  Balance: {:.2} -> {:.2} (max drawdown {:.2}%)",
            st.initial_balance,
            st.final_balance,
            st.max_drawdown * 100.0
        );
    }

    if let Some(best) = best_timeframe(runs).filter(|_| runs.len() > 1) {
        let _ = writeln!(
            out,
            "\nBest timeframe: {} ({:+.2}%)",
            best.timeframe,
            best.stats.total_pnl * 100.0
        );
    }
    out
}

pub fn format_recent_actions(records: &[&HistoryRecord]) -> String {
    if records.is_empty() {
        return "No entries or exits in the recent window.\n".to_string();
    }
    let mut out = String::new();
    for r in records {
        let _ = write!(
            out,
            "{}  {:.4}  {}",
            r.timestamp.format("%Y-%m-%d %H:%M"),
            r.price,
            r.action
        );
        if r.pnl != 0.0 {
            let _ = write!(out, "  {:+.2}%", r.pnl * 100.0);
        }
        out.push('\n');
    }
    out
}

pub fn format_consensus(report: &ConsensusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Market sentiment: {}", report.sentiment);
    let _ = writeln!(out, "{}", report.insight);
    let _ = writeln!(
        out,
        "LONG {} | SHORT {} | NEUTRAL {}",
        report.longs, report.shorts, report.neutrals
    );
    for s in &report.signals {
        let signal = s.signal.map_or_else(|| "-".to_string(), |v| v.to_string());
        match s.price {
            Some(price) => {
                let _ = writeln!(out, "  {:<10} {:<8} {:.4}", s.instrument, signal, price);
            }
            None => {
                let _ = writeln!(out, "  {:<10} {}", s.instrument, signal);
            }
        }
    }
    out
}
