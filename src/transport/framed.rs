//! Framed Message Transport
//!
//! Delivers exactly one complete message per call from the ready channel.
//! One message is in flight at a time and the caller waits until it is
//! complete; there is no pipelining.

use crate::transport::traits::{ChannelError, MessageChannel};
use rover_shared::{limits, AssemblyError, InboundMessage, MessageAssembler, Progress};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Terminal outcomes of a receive
#[derive(Error, Debug)]
pub enum ReceiveError {
    #[error("Connection closed while waiting ({received} bytes received)")]
    Closed { received: usize },

    #[error("Receive failed: {0}")]
    Channel(#[source] anyhow::Error),

    #[error("Malformed message: {0}")]
    Assembly(#[from] AssemblyError),
}

/// Outbound failures
#[derive(Error, Debug)]
pub enum SendError {
    #[error("Payload too large: {0} bytes (max: {max})", max = limits::MAX_OUTBOUND_LEN)]
    TooLarge(usize),

    #[error("Send failed: {0}")]
    Channel(#[from] ChannelError),
}

/// Owns the ready message channel for the rest of the process lifetime
pub struct FramedTransport {
    channel: Box<dyn MessageChannel>,
    retry_interval: Duration,
    scratch: Vec<u8>,
}

impl FramedTransport {
    pub fn new(channel: Box<dyn MessageChannel>, retry_interval: Duration) -> Self {
        Self {
            channel,
            retry_interval,
            scratch: Vec::new(),
        }
    }

    /// Receive one complete message of at most `expected_len` bytes
    ///
    /// A would-block result sleeps for the retry interval and tries again;
    /// it is never reported to the caller.
    pub async fn receive_message(
        &mut self,
        expected_len: usize,
    ) -> Result<InboundMessage, ReceiveError> {
        let mut assembler = MessageAssembler::new(expected_len);
        self.scratch.resize(expected_len, 0);

        loop {
            let spare = assembler.spare_capacity();
            match self.channel.recv_fragment(&mut self.scratch[..spare]).await {
                Ok(fragment) => {
                    let progress =
                        assembler.push(&self.scratch[..fragment.len], fragment.remaining)?;
                    match progress {
                        Progress::Complete => return Ok(assembler.finish()?),
                        Progress::Partial { remaining } => {
                            debug!(
                                "[RECV] Partial message: {} bytes, {} remaining",
                                assembler.filled(),
                                remaining
                            );
                        }
                    }
                }
                Err(ChannelError::WouldBlock) => {
                    tokio::time::sleep(self.retry_interval).await;
                }
                Err(ChannelError::Closed) => {
                    return Err(ReceiveError::Closed {
                        received: assembler.filled(),
                    });
                }
                Err(ChannelError::Failed(e)) => return Err(ReceiveError::Channel(e)),
            }
        }
    }

    /// Write one message in a single frame
    pub async fn send_message(&mut self, payload: &[u8]) -> Result<usize, SendError> {
        if payload.len() > limits::MAX_OUTBOUND_LEN {
            return Err(SendError::TooLarge(payload.len()));
        }
        Ok(self.channel.send(payload).await?)
    }

    /// Close the underlying channel
    pub async fn close(&mut self) -> anyhow::Result<()> {
        self.channel.close().await
    }
}
