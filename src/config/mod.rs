//! Driver configuration.
//!
//! Loaded once at startup from JSON. Every field is optional; missing values
//! fall back to the documented defaults. Resolution into per-channel settings
//! is the only place a configuration problem stops the process.

use std::collections::HashSet;
use std::f64::consts::FRAC_PI_2;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelSettings, TickRange};
use crate::serial::protocol::FOURTEEN_BIT_MASK;
use crate::serial::{DeviceAddress, PortSettings};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Channel entry {position} has no index")]
    MissingIndex { position: usize },

    #[error("Channel index {0} configured more than once")]
    DuplicateIndex(u8),

    #[error("Channel name {0} configured more than once")]
    DuplicateName(String),

    #[error("Invalid tick range: min {min} must be below max {max} (at most 16383)")]
    InvalidTickRange { min: u16, max: u16 },

    #[error("Channel {name}: min_angle {min} exceeds max_angle {max}")]
    InvalidAngleRange { name: String, min: f64, max: f64 },

    #[error("Invalid poll rate: {0}")]
    InvalidRate(String),

    #[error("No channels configured")]
    NoChannels,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Defaults shared by every channel unless an entry overrides them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelDefaults {
    pub offset: f64,
    pub min_angle: f64,
    pub max_angle: f64,
    pub speed: f64,
    pub acceleration: u16,
}

impl Default for ChannelDefaults {
    fn default() -> Self {
        Self {
            offset: 0.0,
            min_angle: -FRAC_PI_2,
            max_angle: FRAC_PI_2,
            speed: 0.0,
            acceleration: 0,
        }
    }
}

/// One `channels` entry. Only `index` is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub index: Option<u8>,
    pub name: Option<String>,
    pub offset: Option<f64>,
    pub min_angle: Option<f64>,
    pub max_angle: Option<f64>,
    pub speed: Option<f64>,
    pub acceleration: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub device_number: u8,
    pub tick_min: u16,
    pub tick_max: u16,
    pub fast_rate_hz: f64,
    pub slow_rate_hz: f64,
    pub defaults: ChannelDefaults,
    /// Uniform mode: channels `0..channel_count` with default settings.
    pub channel_count: Option<u8>,
    pub channels: Vec<ChannelEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let port = PortSettings::default();
        let ticks = TickRange::default();
        Self {
            port: port.port_name,
            baud_rate: port.baud_rate,
            read_timeout_ms: port.read_timeout_ms,
            device_number: DeviceAddress::default().raw(),
            tick_min: ticks.min,
            tick_max: ticks.max,
            fast_rate_hz: 50.0,
            slow_rate_hz: 0.25,
            defaults: ChannelDefaults::default(),
            channel_count: None,
            channels: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        log::info!("Loaded configuration from {}", path.as_ref().display());
        Self::from_json_str(&contents)
    }

    pub fn port_settings(&self) -> PortSettings {
        PortSettings {
            port_name: self.port.clone(),
            baud_rate: self.baud_rate,
            read_timeout_ms: self.read_timeout_ms,
        }
    }

    pub fn device_address(&self) -> DeviceAddress {
        DeviceAddress::new(self.device_number)
    }

    pub fn tick_range(&self) -> Result<TickRange> {
        if self.tick_min >= self.tick_max || self.tick_max > FOURTEEN_BIT_MASK {
            return Err(ConfigError::InvalidTickRange {
                min: self.tick_min,
                max: self.tick_max,
            });
        }
        Ok(TickRange::new(self.tick_min, self.tick_max))
    }

    pub fn timing(&self) -> Result<PollTiming> {
        Ok(PollTiming {
            fast: rate_to_interval("fast_rate_hz", self.fast_rate_hz)?,
            slow: rate_to_interval("slow_rate_hz", self.slow_rate_hz)?,
        })
    }

    /// Resolve explicit entries, or the uniform channel count, into settings.
    pub fn resolve_channels(&self) -> Result<Vec<ChannelSettings>> {
        let d = &self.defaults;
        let mut resolved = Vec::new();

        if self.channels.is_empty() {
            for index in 0..self.channel_count.unwrap_or(0) {
                resolved.push(ChannelSettings {
                    index,
                    name: default_name(index),
                    offset: d.offset,
                    min_angle: d.min_angle,
                    max_angle: d.max_angle,
                    speed: d.speed,
                    acceleration: d.acceleration,
                });
            }
        } else {
            let mut seen = HashSet::new();
            for (position, entry) in self.channels.iter().enumerate() {
                let index = entry.index.ok_or(ConfigError::MissingIndex { position })?;
                if !seen.insert(index) {
                    return Err(ConfigError::DuplicateIndex(index));
                }
                resolved.push(ChannelSettings {
                    index,
                    name: entry.name.clone().unwrap_or_else(|| default_name(index)),
                    offset: entry.offset.unwrap_or(d.offset),
                    min_angle: entry.min_angle.unwrap_or(d.min_angle),
                    max_angle: entry.max_angle.unwrap_or(d.max_angle),
                    speed: entry.speed.unwrap_or(d.speed),
                    acceleration: entry.acceleration.unwrap_or(d.acceleration),
                });
            }
        }

        if resolved.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        let mut names = HashSet::new();
        if let Some(dup) = resolved.iter().find(|c| !names.insert(c.name.as_str())) {
            return Err(ConfigError::DuplicateName(dup.name.clone()));
        }
        if let Some(bad) = resolved.iter().find(|c| c.min_angle > c.max_angle) {
            return Err(ConfigError::InvalidAngleRange {
                name: bad.name.clone(),
                min: bad.min_angle,
                max: bad.max_angle,
            });
        }
        Ok(resolved)
    }
}

/// Poll loop periods: `fast` while connected, `slow` between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    pub fast: Duration,
    pub slow: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            fast: Duration::from_millis(20),
            slow: Duration::from_secs(4),
        }
    }
}

fn rate_to_interval(field: &str, hz: f64) -> Result<Duration> {
    if !(hz.is_finite() && hz > 0.0) {
        return Err(ConfigError::InvalidRate(format!("{} = {}", field, hz)));
    }
    Ok(Duration::from_secs_f64(1.0 / hz))
}

fn default_name(index: u8) -> String {
    format!("servo_{}", index)
}
