//! Chart rendering port trait.

use crate::domain::error::TechSignalError;
use crate::domain::ohlcv::Bar;
use crate::domain::snapshot::IndicatorSnapshot;

pub trait ChartPort {
    /// Render a price chart and return a reference to the artifact (a path).
    fn render(
        &self,
        instrument: &str,
        bars: &[Bar],
        snapshots: &[Option<IndicatorSnapshot>],
    ) -> Result<String, TechSignalError>;
}
