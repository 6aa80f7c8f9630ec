mod command;
mod config;
mod connection;
mod hardware;
mod link;
mod notify;
mod supervisor;
mod transport;

#[cfg(test)]
mod testing;

use clap::Parser;
use command::CommandDispatcher;
use config::Args;
use connection::{run_until_restart, ConnectionOrchestrator, Network};
use hardware::{FlagFileSensor, IdleSensor, LoggedPins, SensorInput};
use link::{HostRadio, LinkMonitor};
use notify::HttpNotifier;
use rover_shared::timing;
use std::sync::Arc;
use std::time::Duration;
use supervisor::ProcessSupervisor;
use transport::{DnsResolver, TcpConnector, WsUpgrader};

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let config = args.connection_config();

    info!("Rover starting: {}", config.device_id);
    info!("  SSID: {}", config.network.ssid);
    info!(
        "  Backend: ws://{}:{}{}",
        config.backend_host, config.backend_port, config.channel_path
    );

    let network = Network {
        radio: Arc::new(HostRadio::default()),
        resolver: Arc::new(DnsResolver),
        connector: Arc::new(TcpConnector::new(config.connect_timeout)),
        upgrader: Arc::new(WsUpgrader::new(config.recv_retry_interval)),
    };

    let notifier = Arc::new(HttpNotifier::new(
        &config.backend_host,
        config.backend_port,
        &args.events_path,
        Duration::from_millis(timing::NOTIFY_TIMEOUT_MS),
    )?);
    info!("  Events: {}", notifier.url());

    let sensor: Box<dyn SensorInput> = match &args.sensor_flag {
        Some(path) => {
            info!("  Sensor flag: {}", path.display());
            Box::new(FlagFileSensor::new(path))
        }
        None => Box::new(IdleSensor),
    };

    let mut dispatcher = CommandDispatcher::new(
        args.dispatcher_config(),
        Box::new(LoggedPins::default()),
        sensor,
        notifier,
    );

    let link = Arc::new(LinkMonitor::new());
    let mut orchestrator = ConnectionOrchestrator::new(config, network, link);
    let supervisor = ProcessSupervisor::new(args.restart_exit_code);

    // Returns only if the supervisor does not terminate the process
    let cause = run_until_restart(&mut orchestrator, &mut dispatcher, &supervisor).await;
    Err(cause.into())
}
