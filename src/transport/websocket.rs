//! Websocket message channel over an established transport

use crate::transport::traits::{
    ChannelError, ChannelUpgrader, Fragment, MessageChannel, TransportStream,
};
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{client_async, WebSocketStream};
use tracing::{debug, info, warn};

/// Performs the websocket client handshake on a raw transport
pub struct WsUpgrader {
    poll_interval: Duration,
}

impl WsUpgrader {
    /// `poll_interval` bounds how long a receive waits before reporting
    /// [`ChannelError::WouldBlock`]
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

#[async_trait]
impl ChannelUpgrader for WsUpgrader {
    async fn upgrade(
        &self,
        stream: Box<dyn TransportStream>,
        host: &str,
        port: u16,
        path: &str,
    ) -> Result<Box<dyn MessageChannel>> {
        let url = format!("ws://{}:{}{}", host, port, path);
        let request = url
            .as_str()
            .into_client_request()
            .with_context(|| format!("Invalid websocket url {}", url))?;

        let (ws, response) = client_async(request, stream)
            .await
            .with_context(|| format!("Websocket handshake with {} failed", url))?;

        info!("[WS] Websocket for {} connected ({})", url, response.status());
        Ok(Box::new(WsChannel::new(ws, self.poll_interval)))
    }
}

/// Message channel over a websocket stream
///
/// A websocket message larger than the caller's buffer is handed out in
/// several fragments; the unread tail is kept until it has been drained.
pub struct WsChannel {
    inner: WebSocketStream<Box<dyn TransportStream>>,
    pending: Bytes,
    poll_interval: Duration,
}

impl WsChannel {
    pub fn new(inner: WebSocketStream<Box<dyn TransportStream>>, poll_interval: Duration) -> Self {
        Self {
            inner,
            pending: Bytes::new(),
            poll_interval,
        }
    }
}

fn map_ws_error(error: WsError) -> ChannelError {
    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => ChannelError::Closed,
        other => ChannelError::Failed(other.into()),
    }
}

#[async_trait]
impl MessageChannel for WsChannel {
    async fn recv_fragment(&mut self, buf: &mut [u8]) -> Result<Fragment, ChannelError> {
        if self.pending.is_empty() {
            let next = timeout(self.poll_interval, self.inner.next())
                .await
                .map_err(|_| ChannelError::WouldBlock)?;

            match next {
                None => return Err(ChannelError::Closed),
                Some(Err(e)) => return Err(map_ws_error(e)),
                Some(Ok(Message::Binary(data))) => self.pending = data,
                Some(Ok(Message::Text(text))) => {
                    self.pending = Bytes::copy_from_slice(text.as_bytes());
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("[WS] Close frame received: {:?}", frame);
                    return Err(ChannelError::Closed);
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    return Err(ChannelError::WouldBlock);
                }
            }
        }

        let len = buf.len().min(self.pending.len());
        let chunk = self.pending.split_to(len);
        buf[..len].copy_from_slice(&chunk);

        Ok(Fragment {
            len,
            remaining: self.pending.len() as u64,
        })
    }

    async fn send(&mut self, payload: &[u8]) -> Result<usize, ChannelError> {
        let message = match std::str::from_utf8(payload) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::binary(Bytes::copy_from_slice(payload)),
        };
        self.inner.send(message).await.map_err(map_ws_error)?;
        Ok(payload.len())
    }

    /// Send the close frame, then shut the transport down
    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.inner.close(None).await {
            warn!("[WS] Close frame not sent: {}", e);
        }
        TransportStream::shutdown(self.inner.get_mut().as_mut()).await
    }
}
