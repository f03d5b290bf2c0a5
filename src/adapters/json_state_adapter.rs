//! JSON file state store, one record per instrument.
//!
//! `{dir}/{instrument}_state.json` holds the record and
//! `{dir}/{instrument}_state.lock` marks a run in progress.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::domain::error::TechSignalError;
use crate::domain::live::StrategyState;
use crate::ports::state_port::{StateLock, StatePort};

pub struct JsonStateStore {
    dir: PathBuf,
}

impl JsonStateStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn state_path(&self, instrument: &str) -> PathBuf {
        self.dir.join(format!("{}_state.json", instrument))
    }

    fn lock_path(&self, instrument: &str) -> PathBuf {
        self.dir.join(format!("{}_state.lock", instrument))
    }
}

impl StatePort for JsonStateStore {
    fn lock(&self, instrument: &str) -> Result<StateLock, TechSignalError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.lock_path(instrument);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(TechSignalError::StateLocked {
                    instrument: instrument.to_string(),
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        debug!(instrument, path = %path.display(), "state lock acquired");

        Ok(StateLock::new(move || {
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to release state lock");
            }
        }))
    }

    fn load(&self, instrument: &str) -> Result<StrategyState, TechSignalError> {
        let path = self.state_path(instrument);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(instrument, "no stored state, starting NEUTRAL");
                return Ok(StrategyState::default());
            }
            Err(e) => return Err(e.into()),
        };

        let state: StrategyState =
            serde_json::from_str(&content).map_err(|e| TechSignalError::StateCorrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        state
            .validate()
            .map_err(|reason| TechSignalError::StateCorrupt {
                path: path.display().to_string(),
                reason,
            })?;
        Ok(state)
    }

    fn save(&self, instrument: &str, state: &StrategyState) -> Result<(), TechSignalError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.state_path(instrument);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(state).map_err(std::io::Error::other)?;
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;
        debug!(instrument, signal = %state.current_signal, "state saved");
        Ok(())
    }
}
