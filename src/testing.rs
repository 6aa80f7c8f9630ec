//! Scripted collaborators shared by the unit tests

use crate::connection::FatalError;
use crate::hardware::{ActuatorOutput, SensorInput};
use crate::link::monitor::{Ipv4Lease, LinkEvent, LinkMonitor};
use crate::link::radio::{LinkState, LinkStatus, NetworkParams, Radio};
use crate::notify::{Notifier, SensorReport};
use crate::supervisor::Supervisor;
use crate::transport::traits::{
    ChannelError, ChannelUpgrader, Fragment, MessageChannel, Resolver, TransportConnector,
    TransportStream,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rover_shared::Actuator;
use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::DuplexStream;

// ---------------------------------------------------------------------------
// Message channel
// ---------------------------------------------------------------------------

/// One scripted result of `recv_fragment`
#[derive(Debug, Clone)]
pub enum ChannelStep {
    /// Bytes of the current message and how many of it follow
    Data(Vec<u8>, u64),
    WouldBlock,
    /// Would-block on every read from here on
    WouldBlockForever,
    Closed,
    Fail(&'static str),
}

impl ChannelStep {
    pub fn data(bytes: &[u8], remaining: u64) -> Self {
        ChannelStep::Data(bytes.to_vec(), remaining)
    }
}

#[derive(Debug, Default)]
struct ChannelScript {
    steps: VecDeque<ChannelStep>,
    reads: usize,
    sent: Vec<Vec<u8>>,
    closed: bool,
}

/// Message channel replaying a fixed script; once the script runs out every
/// read waits forever
#[derive(Debug, Clone, Default)]
pub struct ScriptedChannel {
    script: Arc<Mutex<ChannelScript>>,
}

impl ScriptedChannel {
    pub fn new(steps: Vec<ChannelStep>) -> Self {
        Self {
            script: Arc::new(Mutex::new(ChannelScript {
                steps: steps.into(),
                ..Default::default()
            })),
        }
    }

    pub fn reads(&self) -> usize {
        self.script.lock().unwrap().reads
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.script.lock().unwrap().sent.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.script.lock().unwrap().closed
    }

    /// `None` once the script is exhausted
    fn next_read(&self, buf: &mut [u8]) -> Option<Result<Fragment, ChannelError>> {
        let mut script = self.script.lock().unwrap();
        script.reads += 1;

        let result = match script.steps.pop_front()? {
            ChannelStep::Data(mut bytes, remaining) => {
                // Data wider than the caller's buffer comes out in pieces
                if bytes.len() > buf.len() {
                    let rest = bytes.split_off(buf.len());
                    script
                        .steps
                        .push_front(ChannelStep::Data(rest.clone(), remaining));
                    buf.copy_from_slice(&bytes);
                    Ok(Fragment {
                        len: bytes.len(),
                        remaining: rest.len() as u64 + remaining,
                    })
                } else {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(Fragment {
                        len: bytes.len(),
                        remaining,
                    })
                }
            }
            ChannelStep::WouldBlock => Err(ChannelError::WouldBlock),
            ChannelStep::WouldBlockForever => {
                script.steps.push_front(ChannelStep::WouldBlockForever);
                Err(ChannelError::WouldBlock)
            }
            ChannelStep::Closed => Err(ChannelError::Closed),
            ChannelStep::Fail(reason) => Err(ChannelError::Failed(anyhow!(reason))),
        };
        Some(result)
    }
}

#[async_trait]
impl MessageChannel for ScriptedChannel {
    async fn recv_fragment(&mut self, buf: &mut [u8]) -> Result<Fragment, ChannelError> {
        match self.next_read(buf) {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn send(&mut self, payload: &[u8]) -> Result<usize, ChannelError> {
        let mut script = self.script.lock().unwrap();
        if script.closed {
            return Err(ChannelError::Closed);
        }
        script.sent.push(payload.to_vec());
        Ok(payload.len())
    }

    async fn close(&mut self) -> Result<()> {
        self.script.lock().unwrap().closed = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Radio
// ---------------------------------------------------------------------------

/// Radio that accepts associations after a number of rejections and then
/// reports link-up and an address from its own thread
#[derive(Default)]
pub struct ScriptedRadio {
    monitor: Mutex<Option<Arc<LinkMonitor>>>,
    rejections_left: AtomicUsize,
    associations: AtomicUsize,
    disconnects: AtomicUsize,
}

impl ScriptedRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the first `count` association requests
    pub fn rejecting(count: usize) -> Self {
        Self {
            rejections_left: AtomicUsize::new(count),
            ..Default::default()
        }
    }

    pub fn associations(&self) -> usize {
        self.associations.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Deliver a link event from a foreign thread, as the radio would
    pub fn emit(&self, event: LinkEvent) {
        let monitor = self.monitor.lock().unwrap().clone();
        if let Some(monitor) = monitor {
            std::thread::spawn(move || monitor.handle_event(event))
                .join()
                .unwrap();
        }
    }
}

impl Radio for ScriptedRadio {
    fn register(&self, monitor: Arc<LinkMonitor>) {
        *self.monitor.lock().unwrap() = Some(monitor);
    }

    fn associate(&self, _params: &NetworkParams) -> Result<()> {
        self.associations.fetch_add(1, Ordering::SeqCst);
        let rejected = self
            .rejections_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(anyhow!("association rejected"));
        }

        let monitor = self
            .monitor
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow!("no monitor"))?;
        std::thread::spawn(move || {
            monitor.handle_event(LinkEvent::Connected);
            monitor.handle_event(LinkEvent::AddressAssigned(Ipv4Lease {
                address: Ipv4Addr::new(10, 0, 0, 7),
                netmask: Ipv4Addr::new(255, 255, 255, 0),
                gateway: Ipv4Addr::new(10, 0, 0, 1),
            }));
        });
        Ok(())
    }

    fn status(&self) -> LinkStatus {
        LinkStatus {
            state: LinkState::Completed,
            ssid: Some("test-net".into()),
            rssi: Some(-50),
            ..LinkStatus::disconnected()
        }
    }

    fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Resolution, transport and handshake
// ---------------------------------------------------------------------------

/// Resolver with a fixed answer
pub struct StaticResolver {
    answer: Option<Vec<SocketAddr>>,
    calls: AtomicUsize,
}

impl StaticResolver {
    pub fn answering(candidates: Vec<SocketAddr>) -> Self {
        Self {
            answer: Some(candidates),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, host: &str, _port: u16) -> Result<Vec<SocketAddr>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .clone()
            .ok_or_else(|| anyhow!("no such host: {}", host))
    }
}

#[async_trait]
impl TransportStream for DuplexStream {
    async fn shutdown(&mut self) -> Result<()> {
        tokio::io::AsyncWriteExt::shutdown(self).await?;
        Ok(())
    }
}

/// Connector that only reaches a fixed set of addresses
pub struct ScriptedConnector {
    reachable: Vec<SocketAddr>,
    attempts: Mutex<Vec<SocketAddr>>,
}

impl ScriptedConnector {
    pub fn reaching(reachable: Vec<SocketAddr>) -> Self {
        Self {
            reachable,
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> Vec<SocketAddr> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportConnector for ScriptedConnector {
    async fn connect(&self, addr: SocketAddr) -> Result<Box<dyn TransportStream>> {
        self.attempts.lock().unwrap().push(addr);
        if self.reachable.contains(&addr) {
            let (client, _server) = tokio::io::duplex(64);
            Ok(Box::new(client))
        } else {
            Err(anyhow!("connection refused by {}", addr))
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// What the next handshake does
pub enum Upgrade {
    Channel(ScriptedChannel),
    Fail,
    Hang,
}

/// Upgrader replaying one behavior per handshake; fails when exhausted
pub struct ScriptedUpgrader {
    script: Mutex<VecDeque<Upgrade>>,
    requests: Mutex<Vec<(String, u16, String)>>,
}

impl ScriptedUpgrader {
    pub fn new(script: Vec<Upgrade>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `(host, port, path)` of every handshake so far
    pub fn requests(&self) -> Vec<(String, u16, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelUpgrader for ScriptedUpgrader {
    async fn upgrade(
        &self,
        _stream: Box<dyn TransportStream>,
        host: &str,
        port: u16,
        path: &str,
    ) -> Result<Box<dyn MessageChannel>> {
        self.requests
            .lock()
            .unwrap()
            .push((host.to_string(), port, path.to_string()));
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Upgrade::Channel(channel)) => Ok(Box::new(channel)),
            Some(Upgrade::Hang) => std::future::pending().await,
            Some(Upgrade::Fail) | None => Err(anyhow!("handshake refused")),
        }
    }
}

// ---------------------------------------------------------------------------
// Hardware, notification and supervision
// ---------------------------------------------------------------------------

/// Output that records every call in order
#[derive(Debug, Clone, Default)]
pub struct RecordingPins {
    calls: Arc<Mutex<Vec<(Actuator, bool)>>>,
}

impl RecordingPins {
    pub fn calls(&self) -> Vec<(Actuator, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ActuatorOutput for RecordingPins {
    fn set_actuator(&mut self, actuator: Actuator, asserted: bool) {
        self.calls.lock().unwrap().push((actuator, asserted));
    }
}

/// Sensor replaying fixed readings, then reading false
#[derive(Debug)]
pub struct ScriptedSensor {
    readings: VecDeque<bool>,
}

impl ScriptedSensor {
    pub fn new(readings: Vec<bool>) -> Self {
        Self {
            readings: readings.into(),
        }
    }
}

impl SensorInput for ScriptedSensor {
    fn read_sensor(&mut self) -> bool {
        self.readings.pop_front().unwrap_or(false)
    }
}

/// Notifier counting calls, optionally failing every one of them
#[derive(Debug, Default)]
pub struct CountingNotifier {
    fail: bool,
    hang: bool,
    calls: AtomicUsize,
    last: Mutex<Option<SensorReport>>,
}

impl CountingNotifier {
    pub fn new(fail: bool) -> Self {
        Self {
            fail,
            ..Default::default()
        }
    }

    /// Notifier whose calls never complete
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_report(&self) -> Option<SensorReport> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn notify(&self, report: &SensorReport) -> Result<u16> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(report.clone());
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            Err(anyhow!("backend unreachable"))
        } else {
            Ok(200)
        }
    }
}

/// Supervisor recording restart causes instead of exiting
#[derive(Debug, Default)]
pub struct CountingSupervisor {
    causes: Mutex<Vec<String>>,
}

impl CountingSupervisor {
    pub fn restarts(&self) -> usize {
        self.causes.lock().unwrap().len()
    }

    pub fn causes(&self) -> Vec<String> {
        self.causes.lock().unwrap().clone()
    }
}

impl Supervisor for CountingSupervisor {
    fn restart(&self, cause: &FatalError) {
        self.causes.lock().unwrap().push(cause.to_string());
    }
}
