//! Hardware pin collaborators
//!
//! Actuator outputs and the obstacle sensor input. The host adapters log
//! output levels and read the sensor from a flag file.

use rover_shared::Actuator;
use std::path::PathBuf;
use tracing::{debug, info};

/// Drives the directional actuator outputs
pub trait ActuatorOutput: Send {
    fn set_actuator(&mut self, actuator: Actuator, asserted: bool);
}

/// Reads the binary sensor input
pub trait SensorInput: Send {
    /// Momentary level; no debouncing, no history
    fn read_sensor(&mut self) -> bool;
}

/// Output adapter that logs the levels it is asked to drive
#[derive(Debug, Default)]
pub struct LoggedPins {
    levels: [bool; 4],
}

impl LoggedPins {
    #[cfg(test)]
    pub fn level(&self, actuator: Actuator) -> bool {
        self.levels[actuator.index()]
    }
}

impl ActuatorOutput for LoggedPins {
    fn set_actuator(&mut self, actuator: Actuator, asserted: bool) {
        let slot = &mut self.levels[actuator.index()];
        let level = if asserted { "on" } else { "off" };
        if *slot == asserted {
            debug!("[GPIO] {} held {}", actuator, level);
        } else {
            info!("[GPIO] {} -> {}", actuator, level);
        }
        *slot = asserted;
    }
}

/// Sensor that never fires
#[derive(Debug, Default)]
pub struct IdleSensor;

impl SensorInput for IdleSensor {
    fn read_sensor(&mut self) -> bool {
        false
    }
}

/// Sensor that reads asserted while a flag file exists
#[derive(Debug)]
pub struct FlagFileSensor {
    path: PathBuf,
}

impl FlagFileSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SensorInput for FlagFileSensor {
    fn read_sensor(&mut self) -> bool {
        self.path.exists()
    }
}
