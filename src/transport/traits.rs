//! Transport trait abstraction for the network collaborators

use anyhow::Result;
use async_trait::async_trait;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// A connected duplex byte stream, before the message-channel handshake
#[async_trait]
pub trait TransportStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Close the transport gracefully
    async fn shutdown(&mut self) -> Result<()>;
}

/// Name resolution for the backend host
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve to an ordered list of candidate addresses
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>>;
}

/// Factory for transport connections
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Attempt to connect to one candidate address
    async fn connect(&self, addr: SocketAddr) -> Result<Box<dyn TransportStream>>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}

/// Upgrades a raw transport to a framed message channel
#[async_trait]
pub trait ChannelUpgrader: Send + Sync {
    async fn upgrade(
        &self,
        stream: Box<dyn TransportStream>,
        host: &str,
        port: u16,
        path: &str,
    ) -> Result<Box<dyn MessageChannel>>;
}

/// One read from a message channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    /// Bytes written into the caller's buffer
    pub len: usize,
    /// Bytes of the same message not yet delivered
    pub remaining: u64,
}

/// Errors reported by a message channel
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Operation would block")]
    WouldBlock,

    #[error("Channel closed by peer")]
    Closed,

    #[error("Channel failed: {0}")]
    Failed(#[source] anyhow::Error),
}

/// An upgraded, length-delimited message channel
#[async_trait]
pub trait MessageChannel: Send {
    /// Read the next piece of the current message into `buf`
    async fn recv_fragment(&mut self, buf: &mut [u8]) -> Result<Fragment, ChannelError>;

    /// Write one complete message
    async fn send(&mut self, payload: &[u8]) -> Result<usize, ChannelError>;

    /// Close the channel
    async fn close(&mut self) -> Result<()>;
}
