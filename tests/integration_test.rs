//! End-to-end tests across the domain and the file adapters.
//!
//! Tests cover:
//! - Full backtest over a synthetic uptrend, in both exit modes
//! - The same backtest fed through the CSV bar reader
//! - Live stepping across separate invocations with file-backed state,
//!   history, chart, and notifications
//! - Driver isolation when one instrument fails
//! - Consensus read back from the history logs

mod common;

use approx::assert_relative_eq;
use common::*;
use std::fs;
use tempfile::TempDir;
use techsignal::adapters::csv_adapter::CsvAdapter;
use techsignal::adapters::csv_history_adapter::CsvHistoryLog;
use techsignal::adapters::json_state_adapter::JsonStateStore;
use techsignal::adapters::retry_adapter::RetryingDataPort;
use techsignal::adapters::svg_chart_adapter::SvgChartAdapter;
use techsignal::domain::backtest::run_backtest;
use techsignal::domain::consensus::MarketSentiment;
use techsignal::domain::error::TechSignalError;
use techsignal::domain::live::{LiveOutcome, StrategyState};
use techsignal::domain::metrics::BacktestStats;
use techsignal::domain::position::{ExitReason, Side};
use techsignal::domain::runner::{self, InstrumentOutcome, LiveContext};
use techsignal::domain::settings::{GeneralSettings, RetrySettings};
use techsignal::domain::signal::Signal;
use techsignal::domain::state_machine::{Action, ExitMode};
use techsignal::ports::data_port::DataPort;
use techsignal::ports::history_port::HistoryPort;
use techsignal::ports::state_port::StatePort;

mod backtest_pipeline {
    use super::*;

    #[test]
    fn uptrend_enters_long_only() {
        let bars = wave_bars(250);
        let config = strategy("eth", "ETH/USDT", ExitMode::AnyChange);
        let result = run_backtest(&bars, &config).unwrap();

        assert_eq!(result.start_index, 200);
        assert_eq!(result.history.len(), 50);
        assert_eq!(result.trades.len(), 2);
        assert!(result.trades.iter().all(|t| t.side == Side::Long));
        assert!(
            result
                .history
                .iter()
                .all(|r| r.action != Action::Enter(Side::Short))
        );

        let first = &result.trades[0];
        assert_relative_eq!(first.entry_price, bars[217].close);
        assert_relative_eq!(first.exit_price, bars[218].close);
        assert_eq!(first.exit_reason, ExitReason::NeutralExit);
        assert_relative_eq!(first.pnl_fraction, 0.010156, epsilon = 1e-5);

        let second = &result.trades[1];
        assert_relative_eq!(second.entry_price, bars[237].close);
        assert_relative_eq!(second.exit_price, bars[238].close);
        assert_relative_eq!(second.pnl_fraction, 0.009789, epsilon = 1e-5);
        assert!(result.open_position.is_none());

        // Realized pnl has the sign of the price change over the held bars.
        for t in &result.trades {
            assert_eq!(t.pnl_fraction > 0.0, t.exit_price > t.entry_price);
        }

        let stats = BacktestStats::compute(&result.trades, 1000.0);
        assert_eq!(stats.wins, 2);
        assert_relative_eq!(stats.win_rate, 1.0);
        assert_relative_eq!(stats.total_pnl, 0.019945, epsilon = 1e-5);
        assert_eq!(stats.neutral_exits, 2);
        assert!(stats.final_balance > 1000.0);
    }

    #[test]
    fn strict_reversal_holds_through_neutral() {
        let bars = wave_bars(250);
        let config = strategy("eth", "ETH/USDT", ExitMode::StrictReversal);
        let result = run_backtest(&bars, &config).unwrap();

        assert!(result.trades.is_empty());
        let position = result.open_position.unwrap();
        assert_eq!(position.side, Side::Long);
        assert_relative_eq!(position.entry_price, bars[217].close);
        let entries: Vec<usize> = result
            .history
            .iter()
            .enumerate()
            .filter(|(_, r)| r.action.is_entry_or_exit())
            .map(|(i, _)| i + result.start_index)
            .collect();
        assert_eq!(entries, vec![217]);
    }

    #[test]
    fn csv_source_matches_in_memory_bars() {
        let dir = TempDir::new().unwrap();
        let bars = wave_bars(250);
        write_bars_csv(dir.path(), "ETH/USDT", "1h", &bars);

        let port = CsvAdapter::new(dir.path().to_path_buf());
        let loaded = port.fetch_bars("ETH/USDT", "1h", 500).unwrap();
        assert_eq!(loaded, bars);

        let config = strategy("eth", "ETH/USDT", ExitMode::AnyChange);
        let from_csv = run_backtest(&loaded, &config).unwrap();
        let in_memory = run_backtest(&bars, &config).unwrap();
        assert_eq!(from_csv.trades, in_memory.trades);
        assert_eq!(from_csv.history, in_memory.history);
    }

    #[test]
    fn bar_limit_below_minimum_is_insufficient() {
        let port = MockDataPort::new().with_bars("ETH/USDT", wave_bars(250));
        let settings = GeneralSettings {
            bar_limit: 150,
            ..GeneralSettings::default()
        };
        let reports = runner::run_backtests(
            &port,
            &[strategy("eth", "ETH/USDT", ExitMode::AnyChange)],
            &settings,
            &[],
        );
        assert!(matches!(
            reports[0].outcome,
            InstrumentOutcome::InsufficientData {
                bars: 150,
                required: 201
            }
        ));
    }
}

mod live_pipeline {
    use super::*;

    struct Fixture {
        dir: TempDir,
        state: JsonStateStore,
        history: CsvHistoryLog,
        chart: SvgChartAdapter,
        notifier: RecordingNotifier,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let root = dir.path().to_path_buf();
            Self {
                state: JsonStateStore::new(root.join("state")),
                history: CsvHistoryLog::new(root.join("history")),
                chart: SvgChartAdapter::new(root.join("charts")),
                notifier: RecordingNotifier::default(),
                dir,
            }
        }

        fn step(&self, bars: Vec<Bar>) -> Result<LiveOutcome, TechSignalError> {
            let data = MockDataPort::new().with_bars("ETH/USDT", bars);
            let ctx = LiveContext {
                data: &data,
                state: &self.state,
                history: &self.history,
                chart: Some(&self.chart),
                notify: Some(&self.notifier),
                bar_limit: 500,
            };
            runner::run_live_instrument(&ctx, &strategy("eth", "ETH/USDT", ExitMode::AnyChange))
        }
    }

    #[test]
    fn stage_commit_and_exit_across_invocations() {
        let fx = Fixture::new();
        let bars = wave_bars(220);

        // Bar 217 classifies LONG: staged only.
        fx.step(bars[..218].to_vec()).unwrap();
        let staged = fx.state.load("eth").unwrap();
        assert_eq!(staged.current_signal, Signal::Neutral);
        assert_eq!(staged.pending_signal, Some(Signal::Long));

        // Next invocation commits at bar 218's close.
        fx.step(bars[..219].to_vec()).unwrap();
        let held = fx.state.load("eth").unwrap();
        assert_eq!(held.current_signal, Signal::Long);
        assert_relative_eq!(held.entry_price, bars[218].close);
        assert!(held.entry_atr > 0.0);
        assert_eq!(held.pending_signal, None);

        // Bar 219 classifies NEUTRAL: any-change exit at its close.
        let outcome = fx.step(bars[..220].to_vec()).unwrap();
        let LiveOutcome::Stepped(step) = outcome else {
            panic!("expected a decision");
        };
        assert_eq!(
            step.action,
            Action::Exit {
                side: Side::Long,
                reason: ExitReason::NeutralExit
            }
        );
        let trade = step.trade.unwrap();
        assert_relative_eq!(trade.pnl_fraction, 0.0121861, epsilon = 1e-6);
        assert_eq!(fx.state.load("eth").unwrap(), StrategyState::default());

        let log = fs::read_to_string(fx.history.history_path("eth")).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Date,Price,Signal,Action,Profit");
        assert!(lines[1].ends_with(",LONG,SIGNAL_LONG(PENDING),"));
        assert!(lines[2].ends_with(",NEUTRAL,ENTER_LONG,"));
        assert!(lines[3].ends_with(",NEUTRAL,EXIT_LONG(NEUTRAL_EXIT),1.22"));

        let messages = fx.notifier.messages.borrow();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].0.contains("Action: SIGNAL_LONG(PENDING)"));
        let chart = messages[2].1.as_ref().unwrap();
        assert!(fs::read_to_string(chart).unwrap().starts_with("<svg"));
        assert!(fx.dir.path().join("charts").read_dir().unwrap().count() >= 3);
    }

    #[test]
    fn rerun_on_same_bar_keeps_entry_pending() {
        let fx = Fixture::new();
        let bars = wave_bars(219);

        fx.step(bars[..218].to_vec()).unwrap();
        let again = fx.step(bars[..218].to_vec()).unwrap();
        assert_eq!(
            again,
            LiveOutcome::AlreadyProcessed {
                timestamp: bars[217].timestamp
            }
        );
        let state = fx.state.load("eth").unwrap();
        assert_eq!(state.current_signal, Signal::Neutral);
        assert_eq!(state.pending_signal, Some(Signal::Long));

        let log = fs::read_to_string(fx.history.history_path("eth")).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert_eq!(fx.notifier.messages.borrow().len(), 1);

        // The following bar still commits, at its own close.
        fx.step(bars.clone()).unwrap();
        let held = fx.state.load("eth").unwrap();
        assert_eq!(held.current_signal, Signal::Long);
        assert_relative_eq!(held.entry_price, bars[218].close);
    }

    #[test]
    fn locked_instrument_is_refused() {
        let fx = Fixture::new();
        let _held = fx.state.lock("eth").unwrap();
        let err = fx.step(wave_bars(218)).unwrap_err();
        assert!(matches!(err, TechSignalError::StateLocked { .. }));
        assert!(!fx.state.state_path("eth").exists());
        assert!(fx.notifier.messages.borrow().is_empty());
    }

    #[test]
    fn corrupt_state_fails_without_overwriting() {
        let fx = Fixture::new();
        let path = fx.state.state_path("eth");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{\"current_signal\": \"SIDEWAYS\"}").unwrap();

        let err = fx.step(wave_bars(218)).unwrap_err();
        assert!(matches!(err, TechSignalError::StateCorrupt { .. }));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "{\"current_signal\": \"SIDEWAYS\"}"
        );
        assert!(fx.history.last_row("eth").unwrap().is_none());
    }

    #[test]
    fn too_few_bars_write_nothing() {
        let fx = Fixture::new();
        let err = fx.step(wave_bars(120)).unwrap_err();
        assert!(matches!(
            err,
            TechSignalError::InsufficientData {
                bars: 120,
                minimum: 201,
                ..
            }
        ));
        assert!(!fx.state.state_path("eth").exists());
    }

    #[test]
    fn notification_failure_does_not_fail_step() {
        let fx = Fixture::new();
        let data = MockDataPort::new().with_bars("ETH/USDT", wave_bars(218));
        let ctx = LiveContext {
            data: &data,
            state: &fx.state,
            history: &fx.history,
            chart: None,
            notify: Some(&FailingNotifier),
            bar_limit: 500,
        };
        let outcome =
            runner::run_live_instrument(&ctx, &strategy("eth", "ETH/USDT", ExitMode::AnyChange));
        assert!(outcome.is_ok());
        assert_eq!(
            fx.state.load("eth").unwrap().pending_signal,
            Some(Signal::Long)
        );
    }
}

mod driver {
    use super::*;

    #[test]
    fn one_failing_instrument_does_not_stop_others() {
        let dir = TempDir::new().unwrap();
        write_bars_csv(&dir.path().join("data"), "ETH/USDT", "1h", &wave_bars(218));
        let data = RetryingDataPort::new(
            CsvAdapter::new(dir.path().join("data")),
            &RetrySettings {
                max_retries: 2,
                backoff: std::time::Duration::ZERO,
            },
        );
        let state = JsonStateStore::new(dir.path().join("state"));
        let history = CsvHistoryLog::new(dir.path().join("history"));
        let ctx = LiveContext {
            data: &data,
            state: &state,
            history: &history,
            chart: None,
            notify: None,
            bar_limit: 500,
        };
        let reports = runner::run_live(
            &ctx,
            &[
                strategy("btc", "BTC/USDT", ExitMode::AnyChange),
                strategy("eth", "ETH/USDT", ExitMode::AnyChange),
            ],
        );
        assert_eq!(reports.len(), 2);
        assert!(matches!(
            reports[0].outcome,
            InstrumentOutcome::InsufficientData { bars: 0, .. }
        ));
        assert!(reports[1].outcome.completed().is_some());
        assert_eq!(
            state.load("eth").unwrap().pending_signal,
            Some(Signal::Long)
        );
    }

    #[test]
    fn fetch_errors_are_typed_outcomes() {
        let port = MockDataPort::new()
            .with_error("SOL/USDT", "timeout")
            .with_bars("ETH/USDT", wave_bars(250));
        let reports = runner::run_backtests(
            &port,
            &[
                strategy("sol", "SOL/USDT", ExitMode::AnyChange),
                strategy("eth", "ETH/USDT", ExitMode::AnyChange),
            ],
            &GeneralSettings::default(),
            &[],
        );
        match &reports[0].outcome {
            InstrumentOutcome::FetchFailed { reason } => assert!(reason.contains("timeout")),
            other => panic!("expected fetch failure, got {other:?}"),
        }
        assert_eq!(reports[1].outcome.completed().unwrap().stats.total_trades, 2);
    }

    #[test]
    fn consensus_from_history_logs() {
        let dir = TempDir::new().unwrap();
        let history = CsvHistoryLog::new(dir.path().to_path_buf());
        let data = MockDataPort::new()
            .with_bars("ETH/USDT", wave_bars(218))
            .with_bars("SOL/USDT", wave_bars(218))
            .with_bars("XRP/USDT", wave_bars(218));
        let state = JsonStateStore::new(dir.path().join("state"));
        let ctx = LiveContext {
            data: &data,
            state: &state,
            history: &history,
            chart: None,
            notify: None,
            bar_limit: 500,
        };
        let names = ["eth", "sol", "xrp"];
        let strategies: Vec<_> = names
            .iter()
            .map(|n| strategy(n, &format!("{}/USDT", n.to_uppercase()), ExitMode::AnyChange))
            .collect();
        runner::run_live(&ctx, &strategies);

        let names: Vec<String> = names.iter().map(|n| n.to_string()).chain(["btc".to_string()]).collect();
        let report = runner::consensus(&history, &names);
        assert_eq!(report.sentiment, MarketSentiment::StrongBullish);
        assert_eq!(report.longs, 3);
        assert_eq!(report.signals[3].signal, None);
    }
}
