//! Outbound notification port trait.

use crate::domain::error::TechSignalError;

pub trait NotifyPort {
    fn notify(&self, message: &str, attachment: Option<&str>) -> Result<(), TechSignalError>;
}
