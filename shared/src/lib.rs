//! Rover Shared Protocol Types
//!
//! This crate provides the I/O-free pieces shared between the rover device
//! and anything that talks to it: the command byte table, the connection
//! lifecycle state machine and the inbound message assembler.

pub mod assembler;
pub mod command;
pub mod state_machine;

use std::time::{SystemTime, UNIX_EPOCH};

pub use assembler::{AssemblyError, InboundMessage, MessageAssembler, Progress};
pub use command::{Actuator, Command, UnknownCode};
pub use state_machine::{ConnectionState, ConnectionStateMachine, LifecycleEvent, TransitionResult};

/// Get current timestamp in fractional seconds since Unix epoch
pub fn now_secs_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Fixed timing parameters of the connection lifecycle
pub mod timing {
    /// Upper bound on the message-channel handshake
    pub const HANDSHAKE_TIMEOUT_MS: u64 = 3000;

    /// Upper bound on a single transport connect attempt
    pub const CONNECT_TIMEOUT_MS: u64 = 5000;

    /// Sleep between receive attempts that would block
    pub const RECV_RETRY_INTERVAL_MS: u64 = 50;

    /// Number of full connection sequences tried at boot
    pub const BOOT_ATTEMPTS: u32 = 3;

    /// Delay between boot attempts
    pub const BOOT_RETRY_DELAY_MS: u64 = 1000;

    /// Upper bound on the one-shot sensor notification
    pub const NOTIFY_TIMEOUT_MS: u64 = 5000;
}

/// Buffer limits
pub mod limits {
    /// Inbound message capacity
    pub const MAX_INBOUND_LEN: usize = 696;

    /// Largest payload accepted by a single outbound write
    pub const MAX_OUTBOUND_LEN: usize = 256;
}
