//! Wireless link management
//!
//! This module handles:
//! - Bridging asynchronous link notifications to the control task
//! - The wireless association collaborator and its host adapter

pub mod monitor;
pub mod radio;

pub use monitor::LinkMonitor;
pub use radio::{HostRadio, NetworkParams, Radio};
