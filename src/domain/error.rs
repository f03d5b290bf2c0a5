//! Domain error types.

/// Top-level error type for techsignal.
#[derive(Debug, thiserror::Error)]
pub enum TechSignalError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for {symbol} ({timeframe})")]
    NoData { symbol: String, timeframe: String },

    #[error("malformed data in {source_name}: {reason}")]
    MalformedData { source_name: String, reason: String },

    #[error("insufficient data for {instrument}: have {bars} bars, need {minimum}")]
    InsufficientData {
        instrument: String,
        bars: usize,
        minimum: usize,
    },

    #[error("fetch failed for {symbol} ({timeframe}): {reason}")]
    Fetch {
        symbol: String,
        timeframe: String,
        reason: String,
    },

    #[error("corrupt state record {path}: {reason}")]
    StateCorrupt { path: String, reason: String },

    #[error("state for {instrument} is locked by another run ({path})")]
    StateLocked { instrument: String, path: String },

    #[error("history log error: {reason}")]
    History { reason: String },

    #[error("chart rendering failed: {reason}")]
    Chart { reason: String },

    #[error("notification failed: {reason}")]
    Notify { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TechSignalError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, TechSignalError::Fetch { .. } | TechSignalError::Io(_))
    }
}

impl TechSignalError {
    /// Process exit status for this error class.
    pub fn exit_status(&self) -> u8 {
        match self {
            TechSignalError::Io(_) => 1,
            TechSignalError::ConfigParse { .. }
            | TechSignalError::ConfigMissing { .. }
            | TechSignalError::ConfigInvalid { .. } => 2,
            TechSignalError::Fetch { .. } | TechSignalError::MalformedData { .. } => 3,
            TechSignalError::StateCorrupt { .. } | TechSignalError::StateLocked { .. } => 4,
            TechSignalError::NoData { .. } | TechSignalError::InsufficientData { .. } => 5,
            TechSignalError::History { .. }
            | TechSignalError::Chart { .. }
            | TechSignalError::Notify { .. } => 6,
        }
    }
}

impl From<&TechSignalError> for std::process::ExitCode {
    fn from(err: &TechSignalError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
