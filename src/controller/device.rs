use super::sample::ControllerSample;
use std::fmt;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Failed to initialize controller backend: {0}")]
    InitializationError(String),

    #[error("No controller connected")]
    NoDevice,

    #[error("Controller index {index} requested but only {available} connected")]
    IndexOutOfRange { index: usize, available: usize },

    #[error("Failed to read controller: {0}")]
    ReadError(String),

    #[error("Controller used before it was opened")]
    NotOpen,
}

/// Identity of an opened controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub id: String,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Source of controller samples.
///
/// `open` discovers, opens and activates the device. `poll` blocks for at
/// most `timeout` and is called from a dedicated blocking thread, so it may
/// sleep freely.
pub trait ControllerDevice: Send + 'static {
    fn open(&mut self) -> Result<DeviceInfo, DeviceError>;

    /// Next sample, or `None` if nothing arrived within `timeout`.
    fn poll(&mut self, timeout: Duration) -> Result<Option<ControllerSample>, DeviceError>;

    fn close(&mut self);
}
