//! Market data port trait.

use crate::domain::error::TechSignalError;
use crate::domain::ohlcv::Bar;

pub trait DataPort {
    /// The most recent `limit` bars for `symbol` at `timeframe`, oldest first.
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, TechSignalError>;
}
