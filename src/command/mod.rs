//! Command handling for the rover
//!
//! This module handles:
//! - Decoding command bytes received from the backend
//! - Tracking logical actuator state and driving the outputs
//! - Sampling the sensor and reporting edges to the backend

mod actuators;
mod dispatcher;

pub use dispatcher::{CommandDispatcher, DispatcherConfig};
