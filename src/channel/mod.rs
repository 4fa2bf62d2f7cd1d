//! Per-channel angle/tick conversion.
//!
//! A channel maps a logical angle range of π radians linearly onto the
//! controller's tick range, centred on the tick midpoint. Controllers are
//! immutable once built and are shared freely between tasks.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::device::{ChannelStatus, DeviceError, DeviceManager, Result};
use crate::serial::protocol::FOURTEEN_BIT_MASK;

/// Pulse width bounds in controller ticks (quarter-microseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRange {
    pub min: u16,
    pub max: u16,
}

impl TickRange {
    pub fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        f64::from(self.max) - f64::from(self.min)
    }

    pub fn midpoint(&self) -> i32 {
        (i32::from(self.min) + i32::from(self.max)) / 2
    }
}

impl Default for TickRange {
    fn default() -> Self {
        Self { min: 4000, max: 8000 }
    }
}

/// Resolved per-channel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub index: u8,
    pub name: String,
    pub offset: f64,
    pub min_angle: f64,
    pub max_angle: f64,
    /// Radians per second, 0 for unlimited.
    pub speed: f64,
    /// Raw controller acceleration units, 0 for unlimited.
    pub acceleration: u16,
}

#[derive(Debug, Clone)]
pub struct ChannelController {
    settings: ChannelSettings,
    ticks: TickRange,
    speed_ticks: u16,
}

impl ChannelController {
    pub fn new(settings: ChannelSettings, ticks: TickRange) -> Self {
        let speed_ticks = speed_to_ticks(settings.speed, ticks);
        Self {
            settings,
            ticks,
            speed_ticks,
        }
    }

    pub fn index(&self) -> u8 {
        self.settings.index
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &ChannelSettings {
        &self.settings
    }

    /// Speed in ticks per 10 ms, as the controller expects it.
    pub fn speed_ticks(&self) -> u16 {
        self.speed_ticks
    }

    pub fn angle_to_ticks(&self, angle: f64) -> i32 {
        self.ticks.midpoint() + (angle / PI * self.ticks.span()).round() as i32
    }

    pub fn ticks_to_angle(&self, ticks: i32) -> f64 {
        f64::from(ticks - self.ticks.midpoint()) * PI / self.ticks.span()
    }

    /// Apply the offset and clamp to the configured angle limits.
    pub fn limit_angle(&self, angle: f64) -> f64 {
        let shifted = angle + self.settings.offset;
        let clamped = shifted.clamp(self.settings.min_angle, self.settings.max_angle);
        if clamped != shifted {
            log::warn!(
                "Channel {} command {:.4} rad out of range [{:.4}, {:.4}], clamped to {:.4}",
                self.settings.name,
                shifted,
                self.settings.min_angle,
                self.settings.max_angle,
                clamped
            );
        }
        clamped
    }

    /// Send speed then target for `angle`. Returns the tick value sent.
    ///
    /// Non-finite angles are rejected without touching the transport.
    pub async fn apply_command(&self, device: &DeviceManager, angle: f64) -> Result<u16> {
        if !angle.is_finite() {
            return Err(DeviceError::InvalidCommand(format!(
                "non-finite angle {} for channel {}",
                angle, self.settings.name
            )));
        }
        let ticks = self
            .angle_to_ticks(self.limit_angle(angle))
            .clamp(0, i32::from(FOURTEEN_BIT_MASK)) as u16;
        device.set_speed(self.settings.index, self.speed_ticks).await?;
        device.set_target(self.settings.index, ticks).await?;
        Ok(ticks)
    }

    /// Read the channel position back as an angle.
    pub async fn refresh_status(&self, device: &DeviceManager) -> Result<f64> {
        let ticks = device.get_position(self.settings.index).await?;
        Ok(self.ticks_to_angle(i32::from(ticks)) - self.settings.offset)
    }

    pub fn status(&self, angle: f64) -> ChannelStatus {
        ChannelStatus {
            index: self.settings.index,
            name: self.settings.name.clone(),
            angle,
        }
    }

    /// Push one-time channel settings after a (re)connect.
    pub async fn configure(&self, device: &DeviceManager) -> Result<()> {
        if self.settings.acceleration > 0 {
            device
                .set_acceleration(self.settings.index, self.settings.acceleration)
                .await?;
        }
        Ok(())
    }
}

/// rad/s to ticks per 10 ms.
pub fn speed_to_ticks(speed: f64, ticks: TickRange) -> u16 {
    (speed / 100.0 * ticks.span() / PI).round().clamp(0.0, f64::from(u16::MAX)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> ChannelController {
        ChannelController::new(
            ChannelSettings {
                index: 0,
                name: "pan".to_string(),
                offset: 0.0,
                min_angle: -PI / 2.0,
                max_angle: PI / 2.0,
                speed: 1.0,
                acceleration: 0,
            },
            TickRange::new(4000, 8000),
        )
    }

    #[test]
    fn test_angle_to_ticks() {
        let c = controller();
        assert_eq!(c.angle_to_ticks(0.0), 6000);
        assert_eq!(c.angle_to_ticks(PI / 2.0), 8000);
        assert_eq!(c.angle_to_ticks(-PI / 2.0), 4000);
    }

    #[test]
    fn test_ticks_to_angle() {
        let c = controller();
        assert!((c.ticks_to_angle(8000) - PI / 2.0).abs() < 1e-9);
        assert_eq!(c.ticks_to_angle(6000), 0.0);
    }

    #[test]
    fn test_round_trip_within_one_tick() {
        let c = controller();
        let step = PI / TickRange::new(4000, 8000).span();
        let mut angle = -PI / 2.0;
        while angle <= PI / 2.0 {
            let back = c.ticks_to_angle(c.angle_to_ticks(angle));
            assert!((back - angle).abs() <= step, "angle {} came back as {}", angle, back);
            angle += 0.0137;
        }
    }

    #[test]
    fn test_speed_ticks() {
        // 1 rad/s over a 4000 tick span: 4000 / π / 100 = 12.73
        assert_eq!(controller().speed_ticks(), 13);
        assert_eq!(speed_to_ticks(0.0, TickRange::default()), 0);
    }

    #[test]
    fn test_limit_angle_clamps_after_offset() {
        let mut settings = controller().settings().clone();
        settings.offset = 0.5;
        let c = ChannelController::new(settings, TickRange::default());
        assert_eq!(c.limit_angle(0.25), 0.75);
        assert_eq!(c.limit_angle(2.0), PI / 2.0);
        assert_eq!(c.limit_angle(-4.0), -PI / 2.0);
    }
}
