//! Command byte table
//!
//! Every remote command is a single byte carried in its own framed message:
//! ```text
//! F / f   assert / deassert Forward
//! L / l   assert / deassert Left
//! R / r   assert / deassert Right
//! B / b   assert / deassert Back
//! ```
//! Any other byte value is unrecognized.

use std::fmt;
use thiserror::Error;

/// A binary-state directional drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actuator {
    Forward,
    Left,
    Right,
    Back,
}

impl Actuator {
    /// All actuators in table order
    pub const ALL: [Actuator; 4] = [
        Actuator::Forward,
        Actuator::Left,
        Actuator::Right,
        Actuator::Back,
    ];

    /// Position of this actuator in [`Actuator::ALL`]
    pub fn index(self) -> usize {
        match self {
            Actuator::Forward => 0,
            Actuator::Left => 1,
            Actuator::Right => 2,
            Actuator::Back => 3,
        }
    }

    fn assert_code(self) -> u8 {
        match self {
            Actuator::Forward => b'F',
            Actuator::Left => b'L',
            Actuator::Right => b'R',
            Actuator::Back => b'B',
        }
    }
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actuator::Forward => write!(f, "forward"),
            Actuator::Left => write!(f, "left"),
            Actuator::Right => write!(f, "right"),
            Actuator::Back => write!(f, "back"),
        }
    }
}

/// A decoded remote command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Drive the actuator output high
    Assert(Actuator),
    /// Drive the actuator output low
    Deassert(Actuator),
}

/// Byte value outside the command table
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Unrecognized command code: 0x{0:02x}")]
pub struct UnknownCode(pub u8);

impl Command {
    /// The actuator this command targets
    pub fn actuator(self) -> Actuator {
        match self {
            Command::Assert(a) | Command::Deassert(a) => a,
        }
    }

    /// Requested output level
    pub fn level(self) -> bool {
        matches!(self, Command::Assert(_))
    }

    /// Wire byte for this command
    pub fn code(self) -> u8 {
        match self {
            Command::Assert(a) => a.assert_code(),
            Command::Deassert(a) => a.assert_code().to_ascii_lowercase(),
        }
    }

    /// Decode a wire byte
    pub fn decode(byte: u8) -> Result<Self, UnknownCode> {
        Self::try_from(byte)
    }
}

impl TryFrom<u8> for Command {
    type Error = UnknownCode;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        let command = match byte {
            b'F' => Command::Assert(Actuator::Forward),
            b'f' => Command::Deassert(Actuator::Forward),
            b'L' => Command::Assert(Actuator::Left),
            b'l' => Command::Deassert(Actuator::Left),
            b'R' => Command::Assert(Actuator::Right),
            b'r' => Command::Deassert(Actuator::Right),
            b'B' => Command::Assert(Actuator::Back),
            b'b' => Command::Deassert(Actuator::Back),
            other => return Err(UnknownCode(other)),
        };
        Ok(command)
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> u8 {
        command.code()
    }
}
