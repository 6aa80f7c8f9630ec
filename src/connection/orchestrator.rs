//! Connection orchestrator driving the device from "no link" to "ready"

use crate::command::CommandDispatcher;
use crate::link::{LinkMonitor, NetworkParams, Radio};
use crate::supervisor::Supervisor;
use crate::transport::{
    ChannelUpgrader, FramedTransport, ReceiveError, Resolver, TransportConnector,
    TransportStream,
};
use rover_shared::{
    limits, timing, ConnectionState, ConnectionStateMachine, LifecycleEvent, TransitionResult,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Configuration for the connection sequence
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Device ID for this rover
    pub device_id: String,
    /// Access point to associate with
    pub network: NetworkParams,
    /// Backend hostname
    pub backend_host: String,
    /// Backend port
    pub backend_port: u16,
    /// Path of the message channel endpoint
    pub channel_path: String,
    /// Per-candidate connect timeout
    pub connect_timeout: Duration,
    /// Upper bound on the message-channel handshake
    pub handshake_timeout: Duration,
    /// Full connection sequences tried before giving up
    pub boot_attempts: u32,
    /// Delay between boot attempts
    pub boot_retry_delay: Duration,
    /// Sleep between receive attempts that would block
    pub recv_retry_interval: Duration,
    /// Inbound message capacity
    pub max_message_len: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            device_id: "rover-001".into(),
            network: NetworkParams::default(),
            backend_host: "localhost".into(),
            backend_port: 8080,
            channel_path: "/mcu/ws/".into(),
            connect_timeout: Duration::from_millis(timing::CONNECT_TIMEOUT_MS),
            handshake_timeout: Duration::from_millis(timing::HANDSHAKE_TIMEOUT_MS),
            boot_attempts: timing::BOOT_ATTEMPTS,
            boot_retry_delay: Duration::from_millis(timing::BOOT_RETRY_DELAY_MS),
            recv_retry_interval: Duration::from_millis(timing::RECV_RETRY_INTERVAL_MS),
            max_message_len: limits::MAX_INBOUND_LEN,
        }
    }
}

/// Network collaborators used by the connection sequence
#[derive(Clone)]
pub struct Network {
    pub radio: Arc<dyn Radio>,
    pub resolver: Arc<dyn Resolver>,
    pub connector: Arc<dyn TransportConnector>,
    pub upgrader: Arc<dyn ChannelUpgrader>,
}

/// Conditions that force a whole-process restart
#[derive(Error, Debug)]
pub enum FatalError {
    #[error("Association request rejected: {0:#}")]
    AssociationRejected(#[source] anyhow::Error),

    #[error("Unable to resolve {host}: {source:#}")]
    ResolutionFailed {
        host: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("All {tried} candidate addresses failed")]
    CandidatesExhausted { tried: usize },

    #[error("Handshake failed: {0:#}")]
    HandshakeFailed(#[source] anyhow::Error),

    #[error("Handshake timed out after {0:?}")]
    HandshakeTimedOut(Duration),

    #[error("Link lost while ready")]
    LinkLost,

    #[error("Receive loop terminated: {0}")]
    Channel(#[source] ReceiveError),

    #[error("Gave up after {attempts} boot attempts: {last}")]
    BootAttemptsExhausted { attempts: u32, last: Box<FatalError> },

    #[error("Invalid transition: {event:?} in state {from}")]
    InvalidTransition {
        from: ConnectionState,
        event: LifecycleEvent,
    },
}

/// Outcome of one steady-state iteration
enum Step {
    Served,
    LinkLost,
    Failed(ReceiveError),
}

/// Sequential connection state machine and steady-state loop
pub struct ConnectionOrchestrator {
    config: ConnectionConfig,
    network: Network,
    link: Arc<LinkMonitor>,
    machine: ConnectionStateMachine,
}

impl ConnectionOrchestrator {
    /// Create the orchestrator and register `link` for radio notifications
    pub fn new(config: ConnectionConfig, network: Network, link: Arc<LinkMonitor>) -> Self {
        network.radio.register(link.clone());
        Self {
            config,
            network,
            link,
            machine: ConnectionStateMachine::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    fn transition(&mut self, event: LifecycleEvent) -> Result<ConnectionState, FatalError> {
        match self.machine.process_event(event) {
            TransitionResult::Success(state) => {
                debug!("[CONN] {:?} -> {}", event, state);
                Ok(state)
            }
            TransitionResult::Invalid { from, event } => {
                error!("[CONN] Invalid transition: {:?} in state {}", event, from);
                Err(FatalError::InvalidTransition { from, event })
            }
        }
    }

    /// Move to Failed and hand back the cause
    fn fail(&mut self, event: LifecycleEvent, cause: FatalError) -> FatalError {
        match self.transition(event) {
            Ok(_) => {
                error!("[CONN] Failed: {}", cause);
                cause
            }
            Err(invalid) => invalid,
        }
    }

    /// Run one full connection sequence from Idle
    ///
    /// Returns the ready transport; the link monitor is armed so a later
    /// disconnect resolves [`LinkMonitor::link_lost`].
    pub async fn establish(&mut self) -> Result<FramedTransport, FatalError> {
        self.machine = ConnectionStateMachine::new();
        self.link.reset();

        self.transition(LifecycleEvent::Start)?;
        info!(
            "[CONN] Associating with {} ({})",
            self.config.network.ssid,
            self.config.network.security()
        );
        let associated = self.network.radio.associate(&self.config.network);
        if let Err(e) = associated {
            return Err(self.fail(
                LifecycleEvent::AssociationRejected,
                FatalError::AssociationRejected(e),
            ));
        }

        self.link.await_link_up().await;
        self.transition(LifecycleEvent::LinkUp)?;
        self.log_link_status();

        self.transition(LifecycleEvent::AwaitAddress)?;
        self.link.await_address_assigned().await;
        self.transition(LifecycleEvent::AddressAssigned)?;

        let host = self.config.backend_host.clone();
        let resolved = self
            .network
            .resolver
            .resolve(&host, self.config.backend_port)
            .await;
        let candidates = match resolved {
            Ok(candidates) => candidates,
            Err(source) => {
                return Err(self.fail(
                    LifecycleEvent::ResolutionFailed,
                    FatalError::ResolutionFailed { host, source },
                ));
            }
        };
        self.transition(LifecycleEvent::Resolved)?;

        let connected = self.connect_first(&candidates).await;
        let stream = match connected {
            Some(stream) => stream,
            None => {
                return Err(self.fail(
                    LifecycleEvent::CandidatesExhausted,
                    FatalError::CandidatesExhausted {
                        tried: candidates.len(),
                    },
                ));
            }
        };
        self.transition(LifecycleEvent::TransportConnected)?;

        let handshake_timeout = self.config.handshake_timeout;
        let upgraded = timeout(
            handshake_timeout,
            self.network.upgrader.upgrade(
                stream,
                &host,
                self.config.backend_port,
                &self.config.channel_path,
            ),
        )
        .await;
        let channel = match upgraded {
            Ok(Ok(channel)) => channel,
            Ok(Err(e)) => {
                return Err(self.fail(
                    LifecycleEvent::HandshakeFailed,
                    FatalError::HandshakeFailed(e),
                ));
            }
            Err(_) => {
                return Err(self.fail(
                    LifecycleEvent::HandshakeFailed,
                    FatalError::HandshakeTimedOut(handshake_timeout),
                ));
            }
        };
        self.transition(LifecycleEvent::HandshakeComplete)?;

        self.link.arm_disconnect();
        info!("[CONN] Ready for commands");
        Ok(FramedTransport::new(
            channel,
            self.config.recv_retry_interval,
        ))
    }

    /// Try candidates in order and keep the first that connects
    async fn connect_first(&self, candidates: &[SocketAddr]) -> Option<Box<dyn TransportStream>> {
        let connector = &self.network.connector;
        for addr in candidates {
            info!("[CONN] Connecting to {} via {}", addr, connector.name());
            match connector.connect(*addr).await {
                Ok(stream) => {
                    info!("[CONN] Connected to {}", addr);
                    return Some(stream);
                }
                Err(e) => warn!("[CONN] {:#}", e),
            }
        }
        None
    }

    fn log_link_status(&self) {
        let status = self.network.radio.status();
        if !status.is_associated() {
            return;
        }
        info!(
            "[CONN] SSID: {}",
            status.ssid.as_deref().unwrap_or("<hidden>")
        );
        info!("[CONN] Band: {}", status.band);
        match status.channel {
            Some(channel) => info!("[CONN] Channel: {}", channel),
            None => info!("[CONN] Channel: unknown"),
        }
        info!("[CONN] Security: {}", status.security);
        if let Some(rssi) = status.rssi {
            info!("[CONN] RSSI: {}", rssi);
        }
    }

    /// Bounded boot retries; each attempt restarts the sequence from Idle
    pub async fn connect_at_boot(&mut self) -> Result<FramedTransport, FatalError> {
        let attempts = self.config.boot_attempts.max(1);
        let mut attempt = 1;

        loop {
            info!("[CONN] Boot attempt {}/{}", attempt, attempts);
            let cause = match self.establish().await {
                Ok(transport) => return Ok(transport),
                Err(cause) => cause,
            };

            warn!("[CONN] Attempt {} failed: {}", attempt, cause);
            if let Err(e) = self.network.radio.disconnect() {
                warn!("[CONN] Disconnect failed: {:#}", e);
            }

            if attempt >= attempts {
                return Err(FatalError::BootAttemptsExhausted {
                    attempts,
                    last: Box::new(cause),
                });
            }
            attempt += 1;
            tokio::time::sleep(self.config.boot_retry_delay).await;
        }
    }

    /// Steady-state loop; only returns on a fatal condition
    ///
    /// A link loss wins over any receive or dispatch in progress.
    pub async fn serve(
        &mut self,
        transport: &mut FramedTransport,
        dispatcher: &mut CommandDispatcher,
    ) -> FatalError {
        let link = self.link.clone();
        let max_len = self.config.max_message_len;

        loop {
            let step = tokio::select! {
                biased;
                _ = link.link_lost() => Step::LinkLost,
                served = serve_one(transport, dispatcher, max_len) => match served {
                    Ok(()) => Step::Served,
                    Err(e) => Step::Failed(e),
                },
            };

            match step {
                Step::Served => {}
                Step::LinkLost => {
                    return self.fail(LifecycleEvent::LinkLost, FatalError::LinkLost);
                }
                Step::Failed(e) => {
                    return self.fail(LifecycleEvent::ChannelFailed, FatalError::Channel(e));
                }
            }
        }
    }

    /// Boot, then serve until something fatal happens
    pub async fn run(&mut self, dispatcher: &mut CommandDispatcher) -> FatalError {
        let mut transport = match self.connect_at_boot().await {
            Ok(transport) => transport,
            Err(cause) => return cause,
        };

        let cause = self.serve(&mut transport, dispatcher).await;

        match timeout(self.config.handshake_timeout, transport.close()).await {
            Ok(Ok(())) => debug!("[CONN] Channel closed"),
            Ok(Err(e)) => debug!("[CONN] Channel close failed: {:#}", e),
            Err(_) => debug!("[CONN] Channel close timed out"),
        }
        cause
    }
}

/// Receive one message and dispatch it
async fn serve_one(
    transport: &mut FramedTransport,
    dispatcher: &mut CommandDispatcher,
    max_len: usize,
) -> Result<(), ReceiveError> {
    let message = transport.receive_message(max_len).await?;
    debug!("[RECV] {} byte message", message.len());
    dispatcher.handle_message(&message, transport).await;
    Ok(())
}

/// Run the device until a fatal condition, then invoke the restart primitive
/// exactly once. Returns the cause when the supervisor itself returns.
pub async fn run_until_restart(
    orchestrator: &mut ConnectionOrchestrator,
    dispatcher: &mut CommandDispatcher,
    supervisor: &dyn Supervisor,
) -> FatalError {
    let cause = orchestrator.run(dispatcher).await;
    error!(
        "[CONN] Restarting from state {}: {}",
        orchestrator.state(),
        cause
    );
    supervisor.restart(&cause);
    cause
}
