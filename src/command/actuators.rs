//! Logical actuator state

use rover_shared::{Actuator, Command};

/// Asserted/deasserted level per actuator
///
/// The four levels are independent; opposing directions may be asserted
/// together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuatorState {
    levels: [bool; 4],
}

impl ActuatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, actuator: Actuator) -> bool {
        self.levels[actuator.index()]
    }

    /// Apply a command, returning whether the level changed
    pub fn apply(&mut self, command: Command) -> bool {
        let slot = &mut self.levels[command.actuator().index()];
        let changed = *slot != command.level();
        *slot = command.level();
        changed
    }

    /// Actuators currently asserted, in table order
    pub fn asserted(&self) -> Vec<Actuator> {
        Actuator::ALL
            .into_iter()
            .filter(|a| self.get(*a))
            .collect()
    }
}
