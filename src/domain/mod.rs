//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod indicator_helpers;
pub mod snapshot;
pub mod signal;
pub mod position;
pub mod state_machine;
pub mod strategy;
pub mod settings;
pub mod backtest;
pub mod live;
pub mod metrics;
pub mod analysis;
pub mod consensus;
pub mod report;
pub mod runner;
pub mod config_validation;
pub mod error;
