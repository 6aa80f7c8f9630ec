//! Wireless association collaborator

use super::monitor::{Ipv4Lease, LinkEvent, LinkMonitor};
use anyhow::{anyhow, Result};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Access point security mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    #[default]
    Open,
    Psk,
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Security::Open => write!(f, "OPEN"),
            Security::Psk => write!(f, "WPA2-PSK"),
        }
    }
}

/// Radio band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FrequencyBand {
    #[default]
    #[value(name = "2.4")]
    Band2_4GHz,
    #[value(name = "5")]
    Band5GHz,
}

impl fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrequencyBand::Band2_4GHz => write!(f, "2.4GHz"),
            FrequencyBand::Band5GHz => write!(f, "5GHz"),
        }
    }
}

/// Parameters for an association request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub ssid: String,
    pub passphrase: Option<String>,
    pub band: FrequencyBand,
    /// `None` lets the radio pick any channel
    pub channel: Option<u8>,
    pub mfp_required: bool,
}

impl NetworkParams {
    pub fn security(&self) -> Security {
        if self.passphrase.is_some() {
            Security::Psk
        } else {
            Security::Open
        }
    }
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            ssid: "rover-net".into(),
            passphrase: None,
            band: FrequencyBand::Band2_4GHz,
            channel: None,
            mfp_required: false,
        }
    }
}

/// Association state reported by the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    /// Request issued, waiting for the access point
    Associating,
    /// Associated and authenticated
    Completed,
}

/// Snapshot of the radio's link status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub state: LinkState,
    pub ssid: Option<String>,
    pub band: FrequencyBand,
    pub channel: Option<u8>,
    pub security: Security,
    pub rssi: Option<i16>,
}

impl LinkStatus {
    pub fn disconnected() -> Self {
        Self {
            state: LinkState::Disconnected,
            ssid: None,
            band: FrequencyBand::default(),
            channel: None,
            security: Security::default(),
            rssi: None,
        }
    }

    pub fn is_associated(&self) -> bool {
        self.state == LinkState::Completed
    }
}

/// The wireless radio management subsystem
///
/// Link and address events are delivered to the registered monitor from
/// the radio's own execution context, never from the caller of `associate`.
pub trait Radio: Send + Sync {
    /// Register the monitor that receives link notifications
    fn register(&self, monitor: Arc<LinkMonitor>);

    /// Issue an association request; an error means the request was rejected
    fn associate(&self, params: &NetworkParams) -> Result<()>;

    /// Current link status
    fn status(&self) -> LinkStatus;

    /// Drop the association
    fn disconnect(&self) -> Result<()>;
}

/// Radio adapter for a development host whose network is already up
///
/// Association completes after a short settle delay on a dedicated
/// notification thread, followed by the address lease.
pub struct HostRadio {
    monitor: Mutex<Option<Arc<LinkMonitor>>>,
    status: Arc<Mutex<LinkStatus>>,
    settle: Duration,
    lease: Ipv4Lease,
}

impl HostRadio {
    pub fn new(settle: Duration) -> Self {
        Self {
            monitor: Mutex::new(None),
            status: Arc::new(Mutex::new(LinkStatus::disconnected())),
            settle,
            lease: Ipv4Lease {
                address: Ipv4Addr::LOCALHOST,
                netmask: Ipv4Addr::new(255, 0, 0, 0),
                gateway: Ipv4Addr::LOCALHOST,
            },
        }
    }

    fn set_status(&self, status: LinkStatus) {
        if let Ok(mut guard) = self.status.lock() {
            *guard = status;
        }
    }
}

impl Default for HostRadio {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl Radio for HostRadio {
    fn register(&self, monitor: Arc<LinkMonitor>) {
        if let Ok(mut guard) = self.monitor.lock() {
            *guard = Some(monitor);
        }
    }

    fn associate(&self, params: &NetworkParams) -> Result<()> {
        let monitor = self
            .monitor
            .lock()
            .map_err(|_| anyhow!("Radio state poisoned"))?
            .clone()
            .ok_or_else(|| anyhow!("No link monitor registered"))?;

        info!("[RADIO] Connecting to SSID: {}", params.ssid);
        self.set_status(LinkStatus {
            state: LinkState::Associating,
            ssid: Some(params.ssid.clone()),
            band: params.band,
            channel: params.channel,
            security: params.security(),
            rssi: None,
        });

        let status = self.status.clone();
        let settle = self.settle;
        let lease = self.lease;
        std::thread::Builder::new()
            .name("radio-events".into())
            .spawn(move || {
                std::thread::sleep(settle);
                if let Ok(mut guard) = status.lock() {
                    guard.state = LinkState::Completed;
                    guard.channel = guard.channel.or(Some(1));
                    guard.rssi = Some(-40);
                }
                monitor.handle_event(LinkEvent::Connected);
                std::thread::sleep(settle);
                monitor.handle_event(LinkEvent::AddressAssigned(lease));
                debug!("[RADIO] Notification thread finished");
            })?;

        Ok(())
    }

    fn status(&self) -> LinkStatus {
        self.status
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|_| LinkStatus::disconnected())
    }

    fn disconnect(&self) -> Result<()> {
        self.set_status(LinkStatus::disconnected());
        let monitor = self
            .monitor
            .lock()
            .map_err(|_| anyhow!("Radio state poisoned"))?
            .clone();
        if let Some(monitor) = monitor {
            monitor.handle_event(LinkEvent::Disconnected);
        }
        Ok(())
    }
}
