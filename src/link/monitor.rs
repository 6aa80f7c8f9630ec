//! Link Monitor
//!
//! Receives link-state notifications on the radio's own execution context
//! and turns them into single-slot signals the control task can await.

use futures::FutureExt;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::{info, warn};

/// Address lease handed out when the interface obtains an IPv4 address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Lease {
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

/// Notifications delivered by the wireless subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Association with the access point completed
    Connected,
    /// Association lost
    Disconnected,
    /// Interface obtained an address
    AddressAssigned(Ipv4Lease),
}

/// Event-to-signal adapter between the radio and the connection sequence
///
/// Each signal holds at most one pending permit, so an event delivered
/// before the matching wait is not lost and repeated events collapse.
#[derive(Debug, Default)]
pub struct LinkMonitor {
    link_up: Notify,
    address_assigned: Notify,
    link_lost: Notify,
    /// Set once the channel is ready; disconnects before that are only logged
    armed: AtomicBool,
}

impl LinkMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notification handler, called from the radio's context
    pub fn handle_event(&self, event: LinkEvent) {
        match event {
            LinkEvent::Connected => {
                info!("[LINK] Connected");
                self.link_up.notify_one();
            }
            LinkEvent::Disconnected => {
                if self.is_armed() {
                    warn!("[LINK] Disconnected while ready");
                    self.link_lost.notify_one();
                } else {
                    info!("[LINK] Disconnected");
                }
            }
            LinkEvent::AddressAssigned(lease) => {
                info!("[LINK] IPv4 address: {}", lease.address);
                info!("[LINK] Subnet: {}", lease.netmask);
                info!("[LINK] Router: {}", lease.gateway);
                self.address_assigned.notify_one();
            }
        }
    }

    /// Wait until the link has come up
    pub async fn await_link_up(&self) {
        self.link_up.notified().await;
    }

    /// Wait until an address has been assigned
    pub async fn await_address_assigned(&self) {
        self.address_assigned.notified().await;
    }

    /// Resolves when the link drops after [`arm_disconnect`](Self::arm_disconnect)
    pub async fn link_lost(&self) {
        self.link_lost.notified().await;
    }

    /// Treat every later disconnect as fatal
    pub fn arm_disconnect(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Drop permits left over from an earlier attempt
    pub fn reset(&self) {
        self.armed.store(false, Ordering::SeqCst);
        for signal in [&self.link_up, &self.address_assigned, &self.link_lost] {
            let _ = signal.notified().now_or_never();
        }
    }
}
