//! Connection lifecycle for the rover
//!
//! This module handles:
//! - Wireless association and address assignment
//! - Backend resolution with first-success candidate iteration
//! - Message-channel handshake under a bounded timeout
//! - The steady-state receive loop and its fatal conditions

mod orchestrator;

pub use orchestrator::{
    run_until_restart, ConnectionConfig, ConnectionOrchestrator, FatalError, Network,
};
