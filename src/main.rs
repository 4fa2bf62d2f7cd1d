use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use maestro_servo::commands::BroadcastPublisher;
use maestro_servo::config::AppConfig;
use maestro_servo::device::{ChannelCommand, ChannelTarget};
use maestro_servo::serial::SystemPortOpener;

#[derive(Debug, Parser)]
#[command(name = "maestro-servo", version, about = "Drive a Maestro servo controller over serial")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, env = "MAESTRO_SERVO_CONFIG")]
    config: Option<PathBuf>,

    /// Serial port, overrides the configuration file
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate, overrides the configuration file
    #[arg(short, long)]
    baud: Option<u32>,

    /// Print published channel angles to stdout
    #[arg(long)]
    echo_status: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }

    let publisher = BroadcastPublisher::new(64);
    if cli.echo_status {
        let mut status_rx = publisher.subscribe();
        tokio::spawn(async move {
            while let Ok(status) = status_rx.recv().await {
                println!("{} {:.4}", status.name, status.angle);
            }
        });
    }

    let (command_tx, command_rx) = mpsc::channel(64);
    tokio::spawn(read_commands(command_tx));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for shutdown signal: {}", e);
        }
    };

    maestro_servo::run(
        config,
        Arc::new(SystemPortOpener),
        Arc::new(publisher),
        command_rx,
        shutdown,
    )
    .await
}

/// Read `<channel> <angle>` lines from stdin, channel by index or name.
async fn read_commands(tx: mpsc::Sender<ChannelCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        match parse_command(&line) {
            Some(command) => {
                if tx.send(command).await.is_err() {
                    break;
                }
            }
            None if line.trim().is_empty() => {}
            None => log::warn!("Ignoring malformed command line: {}", line.trim()),
        }
    }
}

fn parse_command(line: &str) -> Option<ChannelCommand> {
    let mut parts = line.split_whitespace();
    let channel = parts.next()?;
    let angle = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let target = match channel.parse() {
        Ok(index) => ChannelTarget::Index(index),
        Err(_) => ChannelTarget::Name(channel.to_string()),
    };
    Some(ChannelCommand { target, angle })
}
