use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::channel::ChannelController;
use crate::device::{ChannelCommand, ChannelStatus, ChannelTarget, DeviceManager};

/// Outbound side of the messaging layer: "current angle for channel N".
#[async_trait::async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(&self, status: ChannelStatus);

    /// Release whatever the channel holds on the messaging side.
    async fn release(&self, _channel: &ChannelController) {}
}

/// Publishes statuses on a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<ChannelStatus>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelStatus> {
        self.tx.subscribe()
    }
}

#[async_trait::async_trait]
impl StatusPublisher for BroadcastPublisher {
    async fn publish(&self, status: ChannelStatus) {
        // No subscribers is fine; statuses are only interesting while someone listens.
        let _ = self.tx.send(status);
    }

    async fn release(&self, channel: &ChannelController) {
        log::debug!("Released status publication for channel {}", channel.name());
    }
}

/// Routes inbound "set angle for channel N" messages to channel controllers.
pub struct CommandRouter {
    device: Arc<DeviceManager>,
    by_index: HashMap<u8, Arc<ChannelController>>,
    by_name: HashMap<String, Arc<ChannelController>>,
}

impl CommandRouter {
    pub fn new(device: Arc<DeviceManager>, channels: &[Arc<ChannelController>]) -> Self {
        let by_index = channels.iter().map(|c| (c.index(), c.clone())).collect();
        let by_name = channels.iter().map(|c| (c.name().to_string(), c.clone())).collect();
        Self {
            device,
            by_index,
            by_name,
        }
    }

    pub fn lookup(&self, target: &ChannelTarget) -> Option<&Arc<ChannelController>> {
        match target {
            ChannelTarget::Index(index) => self.by_index.get(index),
            ChannelTarget::Name(name) => self.by_name.get(name),
        }
    }

    /// Apply one command. Returns the tick value sent, if any.
    pub async fn dispatch(&self, command: &ChannelCommand) -> Option<u16> {
        let Some(channel) = self.lookup(&command.target) else {
            log::warn!("Dropping command for unknown channel {}", command.target);
            return None;
        };

        match channel.apply_command(&self.device, command.angle).await {
            Ok(ticks) => Some(ticks),
            Err(e) if e.is_not_connected() => {
                log::debug!("Dropped command for channel {} while disconnected", channel.name());
                None
            }
            Err(e) => {
                log::warn!("Command for channel {} failed: {}", channel.name(), e);
                None
            }
        }
    }

    /// Consume commands until every sender is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<ChannelCommand>) {
        while let Some(command) = rx.recv().await {
            self.dispatch(&command).await;
        }
        log::debug!("Command channel closed");
    }
}
