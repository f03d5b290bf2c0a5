//! Port traits the domain drives; adapters implement them.

pub mod chart_port;
pub mod config_port;
pub mod data_port;
pub mod history_port;
pub mod notify_port;
pub mod state_port;
