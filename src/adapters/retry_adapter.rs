//! Retrying decorator for any `DataPort`.
//!
//! Transient failures are retried up to `max_retries` extra times with a fixed
//! delay between attempts. Non-transient errors (missing or malformed data)
//! are returned immediately.

use std::time::Duration;

use tracing::warn;

use crate::domain::error::TechSignalError;
use crate::domain::ohlcv::Bar;
use crate::domain::settings::RetrySettings;
use crate::ports::data_port::DataPort;

pub struct RetryingDataPort<P> {
    inner: P,
    max_retries: u32,
    backoff: Duration,
}

impl<P: DataPort> RetryingDataPort<P> {
    pub fn new(inner: P, settings: &RetrySettings) -> Self {
        Self {
            inner,
            max_retries: settings.max_retries,
            backoff: settings.backoff,
        }
    }
}

impl<P: DataPort> DataPort for RetryingDataPort<P> {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, TechSignalError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.backoff);
            }
            match self.inner.fetch_bars(symbol, timeframe, limit) {
                Ok(bars) => return Ok(bars),
                Err(e) if e.is_transient() => {
                    warn!(
                        symbol,
                        timeframe,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        error = %e,
                        "fetch attempt failed"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(TechSignalError::Fetch {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            reason: format!(
                "gave up after {} attempts: {}",
                self.max_retries + 1,
                last_error.map_or_else(|| "unknown error".to_string(), |e| e.to_string())
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FlakyPort {
        failures_left: Cell<u32>,
        calls: Cell<u32>,
        error: fn() -> TechSignalError,
    }

    impl FlakyPort {
        fn new(failures: u32, error: fn() -> TechSignalError) -> Self {
            Self {
                failures_left: Cell::new(failures),
                calls: Cell::new(0),
                error,
            }
        }
    }

    impl DataPort for FlakyPort {
        fn fetch_bars(&self, _: &str, _: &str, _: usize) -> Result<Vec<Bar>, TechSignalError> {
            self.calls.set(self.calls.get() + 1);
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err((self.error)());
            }
            Ok(Vec::new())
        }
    }

    fn timeout() -> TechSignalError {
        TechSignalError::Fetch {
            symbol: "ETH/USDT".into(),
            timeframe: "1h".into(),
            reason: "timeout".into(),
        }
    }

    fn no_data() -> TechSignalError {
        TechSignalError::NoData {
            symbol: "ETH/USDT".into(),
            timeframe: "1h".into(),
        }
    }

    fn fast_retry(max_retries: u32) -> RetrySettings {
        RetrySettings {
            max_retries,
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn recovers_within_budget() {
        let port = RetryingDataPort::new(FlakyPort::new(2, timeout), &fast_retry(2));
        assert!(port.fetch_bars("ETH/USDT", "1h", 10).is_ok());
        assert_eq!(port.inner.calls.get(), 3);
    }

    #[test]
    fn exhaustion_is_fetch_error() {
        let port = RetryingDataPort::new(FlakyPort::new(5, timeout), &fast_retry(2));
        let err = port.fetch_bars("ETH/USDT", "1h", 10).unwrap_err();
        assert!(matches!(err, TechSignalError::Fetch { .. }));
        assert!(err.to_string().contains("gave up after 3 attempts"));
        assert_eq!(port.inner.calls.get(), 3);
    }

    #[test]
    fn non_transient_is_not_retried() {
        let port = RetryingDataPort::new(FlakyPort::new(5, no_data), &fast_retry(2));
        let err = port.fetch_bars("ETH/USDT", "1h", 10).unwrap_err();
        assert!(matches!(err, TechSignalError::NoData { .. }));
        assert_eq!(port.inner.calls.get(), 1);
    }
}
