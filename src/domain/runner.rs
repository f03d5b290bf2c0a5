//! Multi-instrument driver.
//!
//! Every configured instrument is processed independently; a failure in one is
//! logged and recorded as its outcome, never aborting the rest.

use chrono::{NaiveDateTime, Timelike};
use tracing::{debug, error, info, warn};

use crate::domain::backtest::{BacktestResult, run_backtest};
use crate::domain::consensus::{ConsensusReport, LatestSignal, assess};
use crate::domain::error::TechSignalError;
use crate::domain::live::{LiveOutcome, advance};
use crate::domain::metrics::BacktestStats;
use crate::domain::ohlcv::Bar;
use crate::domain::report::format_live_report;
use crate::domain::settings::GeneralSettings;
use crate::domain::signal::Signal;
use crate::domain::snapshot::compute_snapshots;
use crate::domain::strategy::StrategyConfig;
use crate::ports::chart_port::ChartPort;
use crate::ports::data_port::DataPort;
use crate::ports::history_port::{HistoryPort, HistoryRow};
use crate::ports::notify_port::NotifyPort;
use crate::ports::state_port::StatePort;

#[derive(Debug)]
pub enum InstrumentOutcome<T> {
    Completed(T),
    InsufficientData { bars: usize, required: usize },
    FetchFailed { reason: String },
    Failed(TechSignalError),
}

impl<T> InstrumentOutcome<T> {
    fn from_error(err: TechSignalError, required: usize) -> Self {
        match err {
            TechSignalError::InsufficientData { bars, minimum, .. } => {
                InstrumentOutcome::InsufficientData {
                    bars,
                    required: minimum,
                }
            }
            TechSignalError::NoData { .. } => InstrumentOutcome::InsufficientData { bars: 0, required },
            e @ (TechSignalError::Fetch { .. } | TechSignalError::MalformedData { .. }) => {
                InstrumentOutcome::FetchFailed {
                    reason: e.to_string(),
                }
            }
            e => InstrumentOutcome::Failed(e),
        }
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            InstrumentOutcome::Completed(v) => Some(v),
            _ => None,
        }
    }

    /// Process exit status contributed by this outcome; 0 when completed.
    pub fn exit_status(&self) -> u8 {
        match self {
            InstrumentOutcome::Completed(_) => 0,
            InstrumentOutcome::InsufficientData { .. } => 5,
            InstrumentOutcome::FetchFailed { .. } => 3,
            InstrumentOutcome::Failed(e) => e.exit_status(),
        }
    }
}

#[derive(Debug)]
pub struct InstrumentReport<T> {
    pub instrument: String,
    pub timeframe: String,
    pub outcome: InstrumentOutcome<T>,
}

#[derive(Debug)]
pub struct BacktestRun {
    pub result: BacktestResult,
    pub stats: BacktestStats,
}

fn log_outcome<T>(report: &InstrumentReport<T>) {
    let (instrument, timeframe) = (report.instrument.as_str(), report.timeframe.as_str());
    match &report.outcome {
        InstrumentOutcome::Completed(_) => debug!(instrument, timeframe, "instrument completed"),
        InstrumentOutcome::InsufficientData { bars, required } => {
            warn!(instrument, timeframe, bars, required, "insufficient data, skipped")
        }
        InstrumentOutcome::FetchFailed { reason } => {
            error!(instrument, timeframe, %reason, "data fetch failed, skipped")
        }
        InstrumentOutcome::Failed(e) => error!(instrument, timeframe, error = %e, "instrument failed"),
    }
}

/// Backtest every strategy over its timeframes, or over `timeframes` when not
/// empty.
pub fn run_backtests(
    data: &dyn DataPort,
    strategies: &[StrategyConfig],
    settings: &GeneralSettings,
    timeframes: &[String],
) -> Vec<InstrumentReport<BacktestRun>> {
    let mut reports = Vec::new();
    for config in strategies {
        let selected = if timeframes.is_empty() {
            config.timeframes.as_slice()
        } else {
            timeframes
        };
        for timeframe in selected {
            let required = config.indicators.minimum_bars();
            let outcome = match backtest_one(data, config, timeframe, settings) {
                Ok(run) => InstrumentOutcome::Completed(run),
                Err(e) => InstrumentOutcome::from_error(e, required),
            };
            let report = InstrumentReport {
                instrument: config.name.clone(),
                timeframe: timeframe.clone(),
                outcome,
            };
            log_outcome(&report);
            reports.push(report);
        }
    }
    reports
}

fn backtest_one(
    data: &dyn DataPort,
    config: &StrategyConfig,
    timeframe: &str,
    settings: &GeneralSettings,
) -> Result<BacktestRun, TechSignalError> {
    let bars = data.fetch_bars(&config.symbol, timeframe, settings.bar_limit)?;
    info!(
        instrument = %config.name,
        timeframe,
        bars = bars.len(),
        "running backtest"
    );
    let result = run_backtest(&bars, config)?;
    let stats = BacktestStats::compute(&result.trades, settings.initial_balance);
    info!(
        instrument = %config.name,
        timeframe,
        trades = stats.total_trades,
        total_pnl = stats.total_pnl,
        "backtest finished"
    );
    Ok(BacktestRun { result, stats })
}

/// Collaborators for a live run.
pub struct LiveContext<'a> {
    pub data: &'a dyn DataPort,
    pub state: &'a dyn StatePort,
    pub history: &'a dyn HistoryPort,
    pub chart: Option<&'a dyn ChartPort>,
    pub notify: Option<&'a dyn NotifyPort>,
    pub bar_limit: usize,
}

pub fn run_live(
    ctx: &LiveContext<'_>,
    strategies: &[StrategyConfig],
) -> Vec<InstrumentReport<LiveOutcome>> {
    strategies
        .iter()
        .map(|config| {
            let outcome = match run_live_instrument(ctx, config) {
                Ok(outcome) => InstrumentOutcome::Completed(outcome),
                Err(e) => InstrumentOutcome::from_error(e, config.indicators.minimum_bars()),
            };
            let report = InstrumentReport {
                instrument: config.name.clone(),
                timeframe: config.primary_timeframe().to_string(),
                outcome,
            };
            log_outcome(&report);
            report
        })
        .collect()
}

/// One live step for one instrument: fetch, then lock, load, advance, save and
/// record. A bar at or before the last recorded row is not decided again.
/// Chart and notification follow once the lock is released; their failures are
/// logged only.
pub fn run_live_instrument(
    ctx: &LiveContext<'_>,
    config: &StrategyConfig,
) -> Result<LiveOutcome, TechSignalError> {
    let instrument = config.name.as_str();
    let timeframe = config.primary_timeframe();
    let bars = ctx.data.fetch_bars(&config.symbol, timeframe, ctx.bar_limit)?;
    debug!(instrument, timeframe, bars = bars.len(), "bars fetched");

    let outcome = {
        let _lock = ctx.state.lock(instrument)?;
        let state = ctx.state.load(instrument)?;
        match already_processed(ctx.history, instrument, &bars)? {
            Some(timestamp) => LiveOutcome::AlreadyProcessed { timestamp },
            None => {
                let outcome = advance(&state, &bars, config)?;
                if let LiveOutcome::Stepped(step) = &outcome {
                    if step.changed {
                        ctx.state.save(instrument, &step.state)?;
                    }
                    ctx.history.append(instrument, &HistoryRow::from(step.as_ref()))?;
                }
                outcome
            }
        }
    };

    match &outcome {
        LiveOutcome::Stepped(step) => {
            info!(
                instrument,
                signal = %step.classification.signal,
                score = step.classification.score,
                action = %step.action,
                price = step.price,
                "live step"
            );
            let attachment = ctx.chart.and_then(|chart| {
                let snapshots = compute_snapshots(&bars, &config.indicators);
                chart
                    .render(instrument, &bars, &snapshots)
                    .map_err(|e| warn!(instrument, error = %e, "chart rendering failed"))
                    .ok()
            });
            if let Some(notify) = ctx.notify {
                let report = format_live_report(step, config);
                if let Err(e) = notify.notify(&report, attachment.as_deref()) {
                    warn!(instrument, error = %e, "notification failed");
                }
            }
        }
        LiveOutcome::IndicatorsUndefined { timestamp, .. } => {
            warn!(instrument, %timestamp, "latest bar has undefined indicators, nothing decided");
        }
        LiveOutcome::AlreadyProcessed { timestamp } => {
            info!(instrument, %timestamp, "latest bar already processed, nothing decided");
        }
    }
    Ok(outcome)
}

/// Timestamp of the latest bar when the history already holds a row at or
/// after it. Rows are stored to the second.
fn already_processed(
    history: &dyn HistoryPort,
    instrument: &str,
    bars: &[Bar],
) -> Result<Option<NaiveDateTime>, TechSignalError> {
    let Some(latest) = bars.last().map(|b| b.timestamp) else {
        return Ok(None);
    };
    let recorded = history.last_row(instrument)?.map(|row| row.timestamp);
    let latest_second = latest.with_nanosecond(0).unwrap_or(latest);
    Ok(recorded
        .filter(|recorded| *recorded >= latest_second)
        .map(|_| latest))
}

/// Consensus over the latest recorded signal of each instrument. Unreadable
/// history counts as no signal.
pub fn consensus(history: &dyn HistoryPort, instruments: &[String]) -> ConsensusReport {
    let latest = instruments
        .iter()
        .map(|name| {
            let row = history.last_row(name).unwrap_or_else(|e| {
                warn!(instrument = %name, error = %e, "history unreadable");
                None
            });
            LatestSignal {
                instrument: name.clone(),
                signal: row.as_ref().and_then(|r| r.signal.parse::<Signal>().ok()),
                price: row.map(|r| r.price),
            }
        })
        .collect();
    assess(latest)
}
