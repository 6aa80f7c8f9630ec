//! Command dispatcher - decodes command bytes and drives the actuators

use super::actuators::ActuatorState;
use crate::hardware::{ActuatorOutput, SensorInput};
use crate::notify::{Notifier, SensorReport};
use crate::transport::FramedTransport;
use rover_shared::{timing, Command, InboundMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Configuration for the steady-state dispatch loop
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Device ID used in sensor reports
    pub device_id: String,
    /// Also push sensor events to remote operators over the message channel
    pub relay_sensor_events: bool,
    /// Upper bound on the one-shot notification
    pub notify_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            device_id: "rover-001".into(),
            relay_sensor_events: true,
            notify_timeout: Duration::from_millis(timing::NOTIFY_TIMEOUT_MS),
        }
    }
}

/// Result of dispatching one command byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Command decoded and written to the output
    Applied { command: Command, changed: bool },
    /// Byte outside the command table, ignored
    Unrecognized(u8),
}

/// Translates received command bytes into actuator levels
pub struct CommandDispatcher {
    config: DispatcherConfig,
    state: ActuatorState,
    output: Box<dyn ActuatorOutput>,
    sensor: Box<dyn SensorInput>,
    notifier: Arc<dyn Notifier>,
}

impl CommandDispatcher {
    pub fn new(
        config: DispatcherConfig,
        output: Box<dyn ActuatorOutput>,
        sensor: Box<dyn SensorInput>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            state: ActuatorState::new(),
            output,
            sensor,
            notifier,
        }
    }

    /// Current logical actuator levels
    #[cfg(test)]
    pub fn state(&self) -> &ActuatorState {
        &self.state
    }

    /// Decode one byte and update the actuator it targets
    pub fn dispatch(&mut self, code: u8) -> DispatchOutcome {
        match Command::decode(code) {
            Ok(command) => {
                let changed = self.state.apply(command);
                self.output.set_actuator(command.actuator(), command.level());
                debug!(
                    "[CMD] {:?} (changed={}, asserted={:?})",
                    command,
                    changed,
                    self.state.asserted()
                );
                DispatchOutcome::Applied { command, changed }
            }
            Err(e) => {
                warn!("[CMD] {}", e);
                DispatchOutcome::Unrecognized(code)
            }
        }
    }

    /// Dispatch every byte of a received message, then sample the sensor
    pub async fn handle_message(
        &mut self,
        message: &InboundMessage,
        transport: &mut FramedTransport,
    ) -> Vec<DispatchOutcome> {
        if message.is_empty() {
            warn!("[CMD] Empty message ignored");
        }

        let outcomes: Vec<DispatchOutcome> = message
            .payload()
            .iter()
            .map(|&code| self.dispatch(code))
            .collect();

        self.check_sensor(transport).await;
        outcomes
    }

    /// Sample the sensor once; on an edge fire the best-effort notification.
    /// Returns whether the sensor was asserted. Failures are only logged.
    pub async fn check_sensor(&mut self, transport: &mut FramedTransport) -> bool {
        if !self.sensor.read_sensor() {
            return false;
        }

        let report = SensorReport::obstacle(&self.config.device_id);
        info!("[NOTIFY] Sensor asserted, reporting event");

        match timeout(self.config.notify_timeout, self.notifier.notify(&report)).await {
            Ok(Ok(status)) => info!("[NOTIFY] Backend answered {}", status),
            Ok(Err(e)) => warn!("[NOTIFY] Notification failed: {:#}", e),
            Err(_) => warn!(
                "[NOTIFY] Notification timed out after {:?}",
                self.config.notify_timeout
            ),
        }

        if self.config.relay_sensor_events {
            if let Err(e) = transport.send_message(report.summary().as_bytes()).await {
                warn!("[NOTIFY] Relay over channel failed: {}", e);
            }
        }

        true
    }
}
