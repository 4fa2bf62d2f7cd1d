use std::sync::Arc;
use tokio::sync::Mutex;

use crate::serial::protocol::{self, Command, DeviceAddress};
use crate::serial::{PortOpener, PortSettings, SerialInterface};
use super::{ConnectionState, DeviceError, Result};

/// Command dispatcher for a single Maestro controller.
///
/// Every operation holds the interface lock from the first written byte to the
/// last response byte, so concurrent callers never interleave on the wire.
pub struct DeviceManager {
    interface: Arc<Mutex<SerialInterface>>,
    device: DeviceAddress,
}

impl DeviceManager {
    pub fn new(opener: Arc<dyn PortOpener>, settings: PortSettings, device: DeviceAddress) -> Self {
        Self {
            interface: Arc::new(Mutex::new(SerialInterface::new(opener, settings))),
            device,
        }
    }

    pub fn device(&self) -> DeviceAddress {
        self.device
    }

    /// Open the controller port. The classified failure is returned to the caller.
    pub async fn open(&self) -> crate::serial::Result<()> {
        self.interface.lock().await.open()
    }

    pub async fn close(&self) {
        self.interface.lock().await.close();
    }

    pub async fn is_connected(&self) -> bool {
        self.interface.lock().await.health()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.interface.lock().await.state()
    }

    /// Encode, write, and read back the response of one command.
    pub async fn execute(&self, command: &Command) -> Result<Vec<u8>> {
        let frame = command.encode(self.device);
        let response_len = command.response().len();

        let mut guard = self.interface.lock().await;
        if !guard.health() {
            log::debug!("Skipping {} while disconnected", command.name());
            return Err(DeviceError::NotConnected);
        }

        guard.send_data(&frame)?;
        if response_len == 0 {
            return Ok(Vec::new());
        }
        Ok(guard.read_data(response_len)?)
    }

    /// Move a channel to `target` (quarter-microseconds).
    pub async fn set_target(&self, channel: u8, target: u16) -> Result<()> {
        self.execute(&Command::SetTarget { channel, target }).await.map(|_| ())
    }

    /// Set consecutive channels starting at `first_channel` in one frame.
    pub async fn set_multiple_targets(&self, first_channel: u8, targets: &[u16]) -> Result<()> {
        self.execute(&Command::SetMultipleTargets {
            first_channel,
            targets: targets.to_vec(),
        })
        .await
        .map(|_| ())
    }

    pub async fn set_speed(&self, channel: u8, speed: u16) -> Result<()> {
        self.execute(&Command::SetSpeed { channel, speed }).await.map(|_| ())
    }

    pub async fn set_acceleration(&self, channel: u8, acceleration: u16) -> Result<()> {
        self.execute(&Command::SetAcceleration { channel, acceleration })
            .await
            .map(|_| ())
    }

    pub async fn set_pwm(&self, on_time: u16, period: u16) -> Result<()> {
        self.execute(&Command::SetPwm { on_time, period }).await.map(|_| ())
    }

    pub async fn go_home(&self) -> Result<()> {
        self.execute(&Command::GoHome).await.map(|_| ())
    }

    /// Mini-SSC single-channel set; `value` is 0-254.
    pub async fn set_target_minissc(&self, channel: u8, value: u8) -> Result<()> {
        self.execute(&Command::MiniSsc { channel, value }).await.map(|_| ())
    }

    pub async fn get_position(&self, channel: u8) -> Result<u16> {
        let bytes = self.execute(&Command::GetPosition { channel }).await?;
        Ok(protocol::decode_14bit(bytes[0], bytes[1]))
    }

    /// True while any channel is still moving toward its target.
    pub async fn get_moving_state(&self) -> Result<bool> {
        let bytes = self.execute(&Command::GetMovingState).await?;
        Ok(protocol::decode_byte(bytes[0]) != 0)
    }

    /// Controller error flags; reading them clears them on the device.
    pub async fn get_errors(&self) -> Result<u16> {
        let bytes = self.execute(&Command::GetErrors).await?;
        Ok(protocol::decode_14bit(bytes[0], bytes[1]))
    }
}
