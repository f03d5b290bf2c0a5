//! Notifier that prints reports to stdout.

use std::io::Write;

use crate::domain::error::TechSignalError;
use crate::ports::notify_port::NotifyPort;

pub struct ConsoleNotifier;

impl ConsoleNotifier {
    fn write_to(
        out: &mut impl Write,
        message: &str,
        attachment: Option<&str>,
    ) -> std::io::Result<()> {
        writeln!(out, "{}", message)?;
        if let Some(path) = attachment {
            writeln!(out, "Chart: {}", path)?;
        }
        out.flush()
    }
}

impl NotifyPort for ConsoleNotifier {
    fn notify(&self, message: &str, attachment: Option<&str>) -> Result<(), TechSignalError> {
        let stdout = std::io::stdout();
        Self::write_to(&mut stdout.lock(), message, attachment).map_err(|e| {
            TechSignalError::Notify {
                reason: e.to_string(),
            }
        })
    }
}
