//! TCP transport and DNS resolution for the backend connection

use crate::transport::traits::{Resolver, TransportConnector, TransportStream};
use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

#[async_trait]
impl TransportStream for TcpStream {
    async fn shutdown(&mut self) -> Result<()> {
        AsyncWriteExt::shutdown(self).await?;
        Ok(())
    }
}

/// TCP connector with a per-candidate connect timeout
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl TransportConnector for TcpConnector {
    async fn connect(&self, addr: SocketAddr) -> Result<Box<dyn TransportStream>> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| anyhow!("Connect to {} timed out", addr))?
            .with_context(|| format!("Connect to {} failed", addr))?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }

    fn name(&self) -> &'static str {
        "TCP"
    }
}

/// Resolver backed by the host's name service, IPv4 only
#[derive(Debug, Default)]
pub struct DnsResolver;

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>> {
        info!("[DNS] Looking up IP addresses for {}", host);

        let candidates: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .with_context(|| format!("Unable to resolve {}", host))?
            .filter(SocketAddr::is_ipv4)
            .collect();

        if candidates.is_empty() {
            return Err(anyhow!("No IPv4 addresses for {}", host));
        }

        for addr in &candidates {
            debug!("[DNS] IPv4: {}", addr.ip());
        }
        Ok(candidates)
    }
}
