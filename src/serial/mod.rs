pub mod interface;
pub mod protocol;

pub use interface::{PortOpener, SerialInterface, SerialLink, SystemPortOpener};
pub use protocol::{Command, DeviceAddress};

use serde::{Deserialize, Serialize};

/// Where the controller lives and how fast to talk to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            port_name: "/dev/ttyACM0".to_string(),
            baud_rate: 115200,
            read_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Not a serial port: {0}")]
    NotSerialPort(String),

    #[error("Not connected")]
    NotConnected,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SerialError {
    /// Classify a failed `serialport` open.
    pub fn from_open_error(port_name: &str, error: serialport::Error) -> Self {
        use serialport::ErrorKind;

        match error.kind() {
            ErrorKind::NoDevice
            | ErrorKind::InvalidInput
            | ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                SerialError::PortNotFound(format!("{}: {}", port_name, error))
            }
            _ => SerialError::NotSerialPort(format!("{}: {}", port_name, error)),
        }
    }
}

pub type Result<T> = std::result::Result<T, SerialError>;
