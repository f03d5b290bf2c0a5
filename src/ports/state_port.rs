//! Strategy state persistence port trait.

use crate::domain::error::TechSignalError;
use crate::domain::live::StrategyState;

/// Exclusive claim on one instrument's state record, released on drop.
pub struct StateLock {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl StateLock {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

pub trait StatePort {
    /// Fail with `StateLocked` if another run holds the instrument.
    fn lock(&self, instrument: &str) -> Result<StateLock, TechSignalError>;
    /// The stored state, or the default NEUTRAL state when none exists.
    fn load(&self, instrument: &str) -> Result<StrategyState, TechSignalError>;
    fn save(&self, instrument: &str, state: &StrategyState) -> Result<(), TechSignalError>;
}
