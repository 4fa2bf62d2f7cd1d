pub mod manager;
pub mod models;

pub use manager::DeviceManager;
pub use models::*;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The command was skipped because the controller is not connected.
    #[error("Device not connected")]
    NotConnected,

    /// The command was rejected before anything was written.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Serial communication error: {0}")]
    SerialError(crate::serial::SerialError),
}

impl From<crate::serial::SerialError> for DeviceError {
    fn from(e: crate::serial::SerialError) -> Self {
        match e {
            crate::serial::SerialError::NotConnected => DeviceError::NotConnected,
            other => DeviceError::SerialError(other),
        }
    }
}

impl DeviceError {
    pub fn is_not_connected(&self) -> bool {
        matches!(self, DeviceError::NotConnected)
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;
