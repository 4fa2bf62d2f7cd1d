pub mod serial;
pub mod device;
pub mod channel;
pub mod commands;
pub mod config;
pub mod monitor;

use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

use channel::ChannelController;
use commands::{CommandRouter, StatusPublisher};
use config::AppConfig;
use device::{ChannelCommand, DeviceManager};
use monitor::PollLoop;
use serial::PortOpener;

/// Wire the driver together and run until `shutdown` resolves.
///
/// Configuration problems are returned before any port is touched; transport
/// problems never end the run.
pub async fn run<S>(
    config: AppConfig,
    opener: Arc<dyn PortOpener>,
    publisher: Arc<dyn StatusPublisher>,
    commands: mpsc::Receiver<ChannelCommand>,
    shutdown: S,
) -> anyhow::Result<()>
where
    S: Future<Output = ()>,
{
    let ticks = config.tick_range()?;
    let timing = config.timing()?;
    let channels: Vec<Arc<ChannelController>> = config
        .resolve_channels()?
        .into_iter()
        .map(|settings| Arc::new(ChannelController::new(settings, ticks)))
        .collect();

    let device = Arc::new(DeviceManager::new(
        opener,
        config.port_settings(),
        config.device_address(),
    ));

    let router = CommandRouter::new(device.clone(), &channels);
    let router_task = tokio::spawn(router.run(commands));

    let poll_loop = PollLoop::new(device.clone(), channels, publisher, timing).spawn();

    log::info!("Servo driver started on {}", config.port);
    shutdown.await;
    log::info!("Shutdown requested");

    router_task.abort();
    poll_loop.stop().await;
    device.close().await;
    Ok(())
}
