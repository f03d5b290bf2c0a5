//! Concrete adapter implementations for ports.

pub mod console_notifier;
pub mod csv_adapter;
pub mod csv_history_adapter;
pub mod file_config_adapter;
pub mod json_state_adapter;
pub mod retry_adapter;
pub mod svg_chart_adapter;
