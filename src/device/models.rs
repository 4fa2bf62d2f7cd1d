use serde::{Deserialize, Serialize};

/// Controller connection state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

/// Which channel an inbound command is addressed to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ChannelTarget {
    Index(u8),
    Name(String),
}

impl std::fmt::Display for ChannelTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelTarget::Index(index) => write!(f, "#{}", index),
            ChannelTarget::Name(name) => f.write_str(name),
        }
    }
}

/// "Set angle for channel N", in radians
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelCommand {
    pub target: ChannelTarget,
    pub angle: f64,
}

/// "Current angle for channel N", in radians
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelStatus {
    pub index: u8,
    pub name: String,
    pub angle: f64,
}
