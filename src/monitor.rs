use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};

use crate::channel::ChannelController;
use crate::commands::StatusPublisher;
use crate::config::PollTiming;
use crate::device::DeviceManager;

/// Alternates between publishing channel status while connected and
/// retrying the port at a slower cadence while disconnected.
pub struct PollLoop {
    device: Arc<DeviceManager>,
    channels: Vec<Arc<ChannelController>>,
    publisher: Arc<dyn StatusPublisher>,
    timing: PollTiming,
}

/// Running poll loop task
pub struct PollLoopHandle {
    task_handle: tokio::task::JoinHandle<()>,
    stop_tx: mpsc::Sender<()>,
}

impl PollLoopHandle {
    /// Signal the loop and wait (bounded) for it to wind down.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;

        if timeout(Duration::from_secs(2), self.task_handle).await.is_err() {
            log::warn!("Poll loop did not stop within 2s");
        }
    }
}

enum Wake {
    Elapsed,
    Stop,
}

impl PollLoop {
    pub fn new(
        device: Arc<DeviceManager>,
        channels: Vec<Arc<ChannelController>>,
        publisher: Arc<dyn StatusPublisher>,
        timing: PollTiming,
    ) -> Self {
        Self {
            device,
            channels,
            publisher,
            timing,
        }
    }

    pub fn spawn(self) -> PollLoopHandle {
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let task_handle = tokio::spawn(self.run(stop_rx));
        PollLoopHandle { task_handle, stop_tx }
    }

    /// Run until a stop signal arrives or the stop sender is dropped.
    pub async fn run(self, mut stop_rx: mpsc::Receiver<()>) {
        let start_time = Instant::now();
        log::info!(
            "Starting poll loop for {} channels (fast {:?}, slow {:?})",
            self.channels.len(),
            self.timing.fast,
            self.timing.slow
        );

        loop {
            if self.device.is_connected().await {
                self.publish_all().await;
                if let Wake::Stop = wait(&mut stop_rx, self.timing.fast).await {
                    break;
                }
                continue;
            }

            match self.device.open().await {
                Ok(()) => self.on_connected().await,
                Err(e) => {
                    log::warn!("Servo controller unavailable ({}), retrying in {:?}", e, self.timing.slow);
                    if let Wake::Stop = wait(&mut stop_rx, self.timing.slow).await {
                        break;
                    }
                    if let Wake::Stop = wait(&mut stop_rx, self.timing.fast).await {
                        break;
                    }
                }
            }
        }

        for channel in &self.channels {
            self.publisher.release(channel).await;
        }
        self.device.close().await;

        log::info!("Stopped poll loop (ran for {:?})", start_time.elapsed());
    }

    /// One status refresh per channel. Stops early once the link drops.
    async fn publish_all(&self) {
        for channel in &self.channels {
            match channel.refresh_status(&self.device).await {
                Ok(angle) => self.publisher.publish(channel.status(angle)).await,
                Err(e) => {
                    log::debug!("Status refresh for {} failed: {}", channel.name(), e);
                    if !self.device.is_connected().await {
                        break;
                    }
                }
            }
        }
    }

    /// Push connect-time channel setup and report latched controller errors.
    async fn on_connected(&self) {
        for channel in &self.channels {
            if let Err(e) = channel.configure(&self.device).await {
                log::warn!("Failed to configure channel {}: {}", channel.name(), e);
            }
        }

        match self.device.get_errors().await {
            Ok(0) => {}
            Ok(flags) => log::warn!("Servo controller reported error flags 0x{:04X}", flags),
            Err(e) => log::debug!("Failed to read controller errors: {}", e),
        }
    }
}

async fn wait(stop_rx: &mut mpsc::Receiver<()>, period: Duration) -> Wake {
    tokio::select! {
        _ = stop_rx.recv() => Wake::Stop,
        _ = sleep(period) => Wake::Elapsed,
    }
}
