use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};

use super::{PortSettings, Result, SerialError};
use crate::device::ConnectionState;

/// An open byte stream to the controller.
pub trait SerialLink: Send {
    /// Write every byte or fail.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Block until `buf` is full or the stream fails.
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;

    /// Drop whatever the controller sent before we attached.
    fn clear_input(&mut self) -> io::Result<()>;
}

/// Opens byte streams. The system implementation goes through `serialport`.
pub trait PortOpener: Send + Sync {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn SerialLink>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn SerialLink>> {
        let port = serialport::new(settings.port_name.as_str(), settings.baud_rate)
            .timeout(Duration::from_millis(settings.read_timeout_ms))
            .open()
            .map_err(|e| SerialError::from_open_error(&settings.port_name, e))?;

        Ok(Box::new(SystemLink { port }))
    }
}

struct SystemLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink for SystemLink {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        Read::read_exact(&mut self.port, buf)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(io::Error::other)
    }
}

/// Owns the controller connection and its open/closed state.
///
/// Any read or write failure closes the link; reopening is left to the caller.
pub struct SerialInterface {
    opener: Arc<dyn PortOpener>,
    settings: PortSettings,
    link: Option<Box<dyn SerialLink>>,
}

impl SerialInterface {
    pub fn new(opener: Arc<dyn PortOpener>, settings: PortSettings) -> Self {
        Self {
            opener,
            settings,
            link: None,
        }
    }

    pub fn settings(&self) -> &PortSettings {
        &self.settings
    }

    /// Open the configured port. A no-op when already open.
    pub fn open(&mut self) -> Result<()> {
        if self.link.is_some() {
            return Ok(());
        }

        let mut link = self.opener.open(&self.settings)?;

        if let Err(e) = link.clear_input() {
            log::warn!("Failed to discard stale input on {}: {}", self.settings.port_name, e);
        }

        self.link = Some(link);
        log::info!(
            "Connected to servo controller on {} at {} baud",
            self.settings.port_name,
            self.settings.baud_rate
        );
        Ok(())
    }

    /// True iff the port is open. Performs no I/O.
    pub fn health(&self) -> bool {
        self.link.is_some()
    }

    pub fn state(&self) -> ConnectionState {
        if self.health() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    pub fn close(&mut self) {
        if self.link.take().is_some() {
            log::info!("Disconnected from {}", self.settings.port_name);
        }
    }

    /// Send a complete frame to the controller.
    pub fn send_data(&mut self, data: &[u8]) -> Result<()> {
        let link = self.link.as_mut().ok_or(SerialError::NotConnected)?;

        if let Err(e) = link.write_all(data) {
            log::warn!("Write to {} failed: {}", self.settings.port_name, e);
            self.close();
            return Err(SerialError::IoError(e));
        }
        Ok(())
    }

    /// Read exactly `len` response bytes.
    pub fn read_data(&mut self, len: usize) -> Result<Vec<u8>> {
        let link = self.link.as_mut().ok_or(SerialError::NotConnected)?;

        let mut buffer = vec![0u8; len];
        if let Err(e) = link.read_exact(&mut buffer) {
            log::warn!("Read from {} failed: {}", self.settings.port_name, e);
            self.close();
            return Err(SerialError::IoError(e));
        }
        Ok(buffer)
    }
}
