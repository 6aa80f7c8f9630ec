//! Inbound message assembly
//!
//! The message channel hands out a message in one or more fragments. Each
//! fragment reports how many bytes of the same message are still to come:
//! ```text
//! fragment 1: [ 3 bytes ] remaining = 5   -> declared length 8
//! fragment 2: [ 4 bytes ] remaining = 1
//! fragment 3: [ 1 byte  ] remaining = 0   -> complete
//! ```
//! The first fragment fixes the declared length; every later fragment must
//! agree with it.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Errors that can occur while assembling a message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("Message too large: {declared} bytes (capacity: {capacity})")]
    MessageTooLarge { declared: usize, capacity: usize },

    #[error("Inconsistent fragment: {filled} filled + {remaining} remaining != {declared} declared")]
    Inconsistent {
        filled: usize,
        remaining: usize,
        declared: usize,
    },

    #[error("Message already complete")]
    AlreadyComplete,

    #[error("Message incomplete: {remaining} bytes outstanding")]
    Incomplete { remaining: usize },
}

/// Outcome of feeding one fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More fragments are needed
    Partial { remaining: usize },
    /// The declared length has been reached
    Complete,
}

/// A logically complete inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    payload: Bytes,
}

impl InboundMessage {
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Accumulates fragments of a single message into a fixed-capacity buffer
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    capacity: usize,
    declared_len: Option<usize>,
}

impl MessageAssembler {
    /// Create an assembler that accepts messages up to `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            capacity,
            declared_len: None,
        }
    }

    /// Bytes still writable before the buffer is full
    pub fn spare_capacity(&self) -> usize {
        self.capacity - self.buffer.len()
    }

    /// Bytes received so far
    pub fn filled(&self) -> usize {
        self.buffer.len()
    }

    /// Declared total length, known once the first fragment arrived
    pub fn declared_len(&self) -> Option<usize> {
        self.declared_len
    }

    /// Outstanding bytes, known once the first fragment arrived
    pub fn remaining(&self) -> Option<usize> {
        self.declared_len.map(|d| d - self.buffer.len())
    }

    pub fn is_complete(&self) -> bool {
        self.declared_len == Some(self.buffer.len())
    }

    /// Feed one fragment together with the channel's remaining-byte counter
    pub fn push(&mut self, chunk: &[u8], remaining: u64) -> Result<Progress, AssemblyError> {
        if self.is_complete() {
            return Err(AssemblyError::AlreadyComplete);
        }

        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        let filled = self.buffer.len() + chunk.len();
        let total = filled.saturating_add(remaining);

        match self.declared_len {
            None => {
                if total > self.capacity {
                    return Err(AssemblyError::MessageTooLarge {
                        declared: total,
                        capacity: self.capacity,
                    });
                }
                self.declared_len = Some(total);
            }
            Some(declared) if declared != total => {
                return Err(AssemblyError::Inconsistent {
                    filled,
                    remaining,
                    declared,
                });
            }
            Some(_) => {}
        }

        self.buffer.extend_from_slice(chunk);

        if remaining == 0 {
            Ok(Progress::Complete)
        } else {
            Ok(Progress::Partial { remaining })
        }
    }

    /// Take the completed message, leaving the assembler empty for reuse
    pub fn finish(&mut self) -> Result<InboundMessage, AssemblyError> {
        match self.remaining() {
            Some(0) => {}
            Some(remaining) => return Err(AssemblyError::Incomplete { remaining }),
            None => {
                return Err(AssemblyError::Incomplete {
                    remaining: usize::MAX,
                })
            }
        }

        self.declared_len = None;
        Ok(InboundMessage::new(self.buffer.split().freeze()))
    }
}
