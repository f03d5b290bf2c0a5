//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use crate::adapters::console_notifier::ConsoleNotifier;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_history_adapter::CsvHistoryLog;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_state_adapter::JsonStateStore;
use crate::adapters::retry_adapter::RetryingDataPort;
use crate::adapters::svg_chart_adapter::SvgChartAdapter;
use crate::domain::config_validation::{INSTRUMENT_PREFIX, instrument_sections, validate_config};
use crate::domain::error::TechSignalError;
use crate::domain::live::LiveOutcome;
use crate::domain::metrics::{TimeframeStats, recent_actions};
use crate::domain::report::{format_backtest_summary, format_consensus, format_recent_actions};
use crate::domain::runner::{self, BacktestRun, InstrumentOutcome, InstrumentReport, LiveContext};
use crate::domain::settings::{GeneralSettings, RetrySettings};
use crate::domain::signal::{ScoringConfig, ScoringThresholds, ScoringWeights};
use crate::domain::snapshot::IndicatorParams;
use crate::domain::state_machine::ExitMode;
use crate::domain::strategy::{StrategyConfig, VolatilityBands, parse_timeframes};
use crate::logging::{LogFormat, init_logging};
use crate::ports::config_port::ConfigPort;
use crate::ports::history_port::{HistoryPort, HistoryRow};

#[derive(Parser, Debug)]
#[command(name = "techsignal", about = "Technical signal engine and backtester")]
pub struct Cli {
    /// Log output format (defaults to TECHSIGNAL_LOG_FORMAT, then text)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest configured instruments over historical bars
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Only this instrument
        #[arg(short, long)]
        instrument: Option<String>,
        /// Override the configured timeframes (repeatable)
        #[arg(short, long)]
        timeframe: Vec<String>,
        /// Write each run's per-bar history under this directory
        #[arg(long)]
        history_dir: Option<PathBuf>,
    },
    /// Evaluate the latest bar and advance persisted state
    Live {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        instrument: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Summarize the latest recorded signal of every instrument
    Consensus {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(LogFormat::resolve(cli.log_format));

    let result = match cli.command {
        Command::Backtest {
            config,
            instrument,
            timeframe,
            history_dir,
        } => run_backtest(
            &config,
            instrument.as_deref(),
            &timeframe,
            history_dir.as_deref(),
        ),
        Command::Live { config, instrument } => run_live(&config, instrument.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Consensus { config } => run_consensus(&config),
    };

    match result {
        Ok(status) => ExitCode::from(status),
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<FileConfigAdapter, TechSignalError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_config(&adapter)?;
    Ok(adapter)
}

fn get_usize(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> usize {
    usize::try_from(config.get_int(section, key, default as i64)).unwrap_or(default)
}

fn get_i32(config: &dyn ConfigPort, section: &str, key: &str, default: i32) -> i32 {
    i32::try_from(config.get_int(section, key, default as i64)).unwrap_or(default)
}

pub fn build_general_settings(config: &dyn ConfigPort) -> GeneralSettings {
    let defaults = GeneralSettings::default();
    let dir = |key: &str, default: PathBuf| {
        config
            .get_string("general", key)
            .map(PathBuf::from)
            .unwrap_or(default)
    };
    let retry_defaults = RetrySettings::default();
    let backoff_ms = config.get_int(
        "retry",
        "backoff_ms",
        retry_defaults.backoff.as_millis() as i64,
    );

    GeneralSettings {
        data_dir: dir("data_dir", defaults.data_dir),
        state_dir: dir("state_dir", defaults.state_dir),
        history_dir: dir("history_dir", defaults.history_dir),
        chart_dir: dir("chart_dir", defaults.chart_dir),
        initial_balance: config.get_double("general", "initial_balance", defaults.initial_balance),
        bar_limit: get_usize(config, "general", "bar_limit", defaults.bar_limit),
        retry: RetrySettings {
            max_retries: u32::try_from(config.get_int(
                "retry",
                "max_retries",
                retry_defaults.max_retries as i64,
            ))
            .unwrap_or(retry_defaults.max_retries),
            backoff: u64::try_from(backoff_ms)
                .map(Duration::from_millis)
                .unwrap_or(retry_defaults.backoff),
        },
    }
}

pub fn build_strategy(
    config: &dyn ConfigPort,
    name: &str,
    section: &str,
) -> Result<StrategyConfig, TechSignalError> {
    let symbol = config
        .get_string(section, "symbol")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| TechSignalError::ConfigMissing {
            section: section.to_string(),
            key: "symbol".to_string(),
        })?;
    let raw_mode = config
        .get_string(section, "exit_mode")
        .ok_or_else(|| TechSignalError::ConfigMissing {
            section: section.to_string(),
            key: "exit_mode".to_string(),
        })?;
    let exit_mode =
        ExitMode::from_str(&raw_mode).map_err(|reason| TechSignalError::ConfigInvalid {
            section: section.to_string(),
            key: "exit_mode".to_string(),
            reason,
        })?;

    let mut strategy = StrategyConfig::new(name, symbol.trim(), exit_mode);
    if let Some(raw) = config.get_string(section, "timeframes") {
        strategy.timeframes = parse_timeframes(&raw);
    }
    strategy.confirm_entries = config.get_bool(section, "confirm_entries", true);
    strategy.atr_multiplier = config.get_double(section, "atr_multiplier", 2.0);

    let d = IndicatorParams::default();
    strategy.indicators = IndicatorParams {
        rsi_period: get_usize(config, section, "rsi_period", d.rsi_period),
        ema_fast: get_usize(config, section, "ema_fast", d.ema_fast),
        ema_slow: get_usize(config, section, "ema_slow", d.ema_slow),
        macd_fast: get_usize(config, section, "macd_fast", d.macd_fast),
        macd_slow: get_usize(config, section, "macd_slow", d.macd_slow),
        macd_signal: get_usize(config, section, "macd_signal", d.macd_signal),
        bb_period: get_usize(config, section, "bb_period", d.bb_period),
        bb_stddev: config.get_double(section, "bb_stddev", d.bb_stddev),
        stoch_period: get_usize(config, section, "stoch_period", d.stoch_period),
        stoch_k_smooth: get_usize(config, section, "stoch_k_smooth", d.stoch_k_smooth),
        stoch_d_smooth: get_usize(config, section, "stoch_d_smooth", d.stoch_d_smooth),
        atr_period: get_usize(config, section, "atr_period", d.atr_period),
    };

    let w = ScoringWeights::default();
    let t = ScoringThresholds::default();
    strategy.scoring = ScoringConfig {
        weights: ScoringWeights {
            trend: get_i32(config, section, "weight_trend", w.trend),
            macd: get_i32(config, section, "weight_macd", w.macd),
            rsi: get_i32(config, section, "weight_rsi", w.rsi),
            bollinger: get_i32(config, section, "weight_bollinger", w.bollinger),
            stochastic: get_i32(config, section, "weight_stochastic", w.stochastic),
        },
        thresholds: ScoringThresholds {
            rsi_oversold: config.get_double(section, "rsi_oversold", t.rsi_oversold),
            rsi_overbought: config.get_double(section, "rsi_overbought", t.rsi_overbought),
            stoch_oversold: config.get_double(section, "stoch_oversold", t.stoch_oversold),
            stoch_overbought: config.get_double(section, "stoch_overbought", t.stoch_overbought),
            signal_threshold: get_i32(config, section, "signal_threshold", t.signal_threshold),
            high_confidence: get_i32(config, section, "high_confidence", t.high_confidence),
            medium_confidence: get_i32(config, section, "medium_confidence", t.medium_confidence),
        },
    };

    if config.get_string(section, "atr_high").is_some()
        && config.get_string(section, "atr_low").is_some()
    {
        strategy.volatility = Some(VolatilityBands {
            high: config.get_double(section, "atr_high", f64::INFINITY),
            low: config.get_double(section, "atr_low", 0.0),
        });
    }
    Ok(strategy)
}

/// Every configured instrument, or only `only` when given.
pub fn build_strategies(
    config: &dyn ConfigPort,
    only: Option<&str>,
) -> Result<Vec<StrategyConfig>, TechSignalError> {
    let sections: Vec<(String, String)> = instrument_sections(config)
        .into_iter()
        .filter(|(name, _)| only.is_none_or(|wanted| wanted == name))
        .collect();
    if let (Some(wanted), true) = (only, sections.is_empty()) {
        return Err(TechSignalError::ConfigMissing {
            section: format!("{}{}", INSTRUMENT_PREFIX, wanted),
            key: "symbol".to_string(),
        });
    }
    sections
        .iter()
        .map(|(name, section)| build_strategy(config, name, section))
        .collect()
}

/// First non-zero outcome status, or 0 when every instrument completed.
fn overall_status<T>(reports: &[InstrumentReport<T>]) -> u8 {
    reports
        .iter()
        .map(|r| r.outcome.exit_status())
        .find(|s| *s != 0)
        .unwrap_or(0)
}

fn describe_skip<T>(report: &InstrumentReport<T>) -> Option<String> {
    match &report.outcome {
        InstrumentOutcome::Completed(_) => None,
        InstrumentOutcome::InsufficientData { bars, required } => Some(format!(
            "{} [{}]: insufficient data ({} bars, need {})",
            report.instrument, report.timeframe, bars, required
        )),
        InstrumentOutcome::FetchFailed { reason } => Some(format!(
            "{} [{}]: fetch failed: {}",
            report.instrument, report.timeframe, reason
        )),
        InstrumentOutcome::Failed(e) => Some(format!(
            "{} [{}]: {}",
            report.instrument, report.timeframe, e
        )),
    }
}

fn run_backtest(
    config_path: &Path,
    instrument: Option<&str>,
    timeframes: &[String],
    history_dir: Option<&Path>,
) -> Result<u8, TechSignalError> {
    let config = load_config(config_path)?;
    let settings = build_general_settings(&config);
    let strategies = build_strategies(&config, instrument)?;

    let data = RetryingDataPort::new(CsvAdapter::new(settings.data_dir.clone()), &settings.retry);
    let reports = runner::run_backtests(&data, &strategies, &settings, timeframes);

    if let Some(dir) = history_dir {
        write_backtest_history(&CsvHistoryLog::new(dir.to_path_buf()), &reports)?;
    }

    for strategy in &strategies {
        let mine: Vec<&InstrumentReport<BacktestRun>> = reports
            .iter()
            .filter(|r| r.instrument == strategy.name)
            .collect();
        let runs: Vec<TimeframeStats> = mine
            .iter()
            .filter_map(|r| {
                r.outcome.completed().map(|run| TimeframeStats {
                    timeframe: r.timeframe.clone(),
                    stats: run.stats.clone(),
                })
            })
            .collect();
        if !runs.is_empty() {
            print!("{}", format_backtest_summary(&strategy.name, &runs));
        }
        for report in &mine {
            let latest = report
                .outcome
                .completed()
                .and_then(|run| run.result.history.last().map(|last| (run, last)));
            if let Some((run, last)) = latest {
                let since = last.timestamp - chrono::Duration::hours(24);
                println!("\nRecent actions [{}]:", report.timeframe);
                print!(
                    "{}",
                    format_recent_actions(&recent_actions(&run.result.history, since))
                );
            }
            if let Some(skip) = describe_skip(report) {
                println!("{}", skip);
            }
        }
    }
    Ok(overall_status(&reports))
}

fn write_backtest_history(
    log: &CsvHistoryLog,
    reports: &[InstrumentReport<BacktestRun>],
) -> Result<(), TechSignalError> {
    for report in reports {
        if let Some(run) = report.outcome.completed() {
            let key = format!("{}_{}", report.instrument, report.timeframe);
            for record in &run.result.history {
                log.append(&key, &HistoryRow::from(record))?;
            }
        }
    }
    Ok(())
}

fn run_live(config_path: &Path, instrument: Option<&str>) -> Result<u8, TechSignalError> {
    let config = load_config(config_path)?;
    let settings = build_general_settings(&config);
    let strategies = build_strategies(&config, instrument)?;

    let data = RetryingDataPort::new(CsvAdapter::new(settings.data_dir.clone()), &settings.retry);
    let state = JsonStateStore::new(settings.state_dir.clone());
    let history = CsvHistoryLog::new(settings.history_dir.clone());
    let chart = SvgChartAdapter::new(settings.chart_dir.clone());
    let notifier = ConsoleNotifier;
    let ctx = LiveContext {
        data: &data,
        state: &state,
        history: &history,
        chart: Some(&chart),
        notify: Some(&notifier),
        bar_limit: settings.bar_limit,
    };

    let reports = runner::run_live(&ctx, &strategies);
    for report in &reports {
        match report.outcome.completed() {
            Some(LiveOutcome::IndicatorsUndefined { timestamp, price }) => println!(
                "{}: indicators undefined at {} (price {:.4}), no decision",
                report.instrument, timestamp, price
            ),
            Some(LiveOutcome::AlreadyProcessed { timestamp }) => println!(
                "{}: bar {} already processed, no decision",
                report.instrument, timestamp
            ),
            _ => {}
        }
        if let Some(skip) = describe_skip(report) {
            println!("{}", skip);
        }
    }
    Ok(overall_status(&reports))
}

fn run_validate(config_path: &Path) -> Result<u8, TechSignalError> {
    let config = load_config(config_path)?;
    let strategies = build_strategies(&config, None)?;
    println!("Configuration OK: {} instrument(s)", strategies.len());
    for s in &strategies {
        println!(
            "  {} {} [{}] exit_mode={} confirm_entries={} warm-up={} bars",
            s.name,
            s.symbol,
            s.timeframes.join(", "),
            s.exit_mode,
            s.confirm_entries,
            s.indicators.warmup_bars()
        );
    }
    Ok(0)
}

fn run_consensus(config_path: &Path) -> Result<u8, TechSignalError> {
    let config = load_config(config_path)?;
    let settings = build_general_settings(&config);
    let names: Vec<String> = instrument_sections(&config)
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    let history = CsvHistoryLog::new(settings.history_dir);
    print!("{}", format_consensus(&runner::consensus(&history, &names)));
    Ok(0)
}
