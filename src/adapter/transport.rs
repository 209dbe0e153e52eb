//! WebSocket transport shared by the exchange adapters.
//!
//! Wraps a tokio-tungstenite stream: answers pings, skips control and binary
//! frames, and reports closure as a single [`Inbound::Closed`] value so that
//! adapters only deal with text payloads.

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A frame the adapter needs to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    /// The connection is gone; carries the reason.
    Closed(String),
}

/// Single WebSocket connection.
pub struct WsTransport {
    url: String,
    socket: Option<Socket>,
}

impl WsTransport {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            socket: None,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Establish the connection, dropping any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake fails.
    pub async fn connect(&mut self) -> Result<()> {
        self.close().await;
        info!(url = %self.url, "Connecting to WebSocket");
        let (socket, response) = connect_async(self.url.as_str()).await?;
        info!(status = %response.status(), "WebSocket connected");
        self.socket = Some(socket);
        Ok(())
    }

    /// Send a raw text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] when not connected, or the send error.
    pub async fn send_text(&mut self, text: String) -> Result<()> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| Error::Connection("Not connected".into()))?;
        trace!(bytes = text.len(), "Sending WebSocket text frame");
        socket.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Serialize and send a JSON frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the send fails.
    pub async fn send_json<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.send_text(json).await
    }

    /// Wait for the next text frame.
    ///
    /// Only awaits the next frame, so it is safe to cancel in `select!`.
    /// Pings are answered by tungstenite, which queues the pong on read and
    /// flushes it with the next read or write.
    pub async fn recv(&mut self) -> Inbound {
        let Some(socket) = self.socket.as_mut() else {
            return Inbound::Closed("Not connected".into());
        };

        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => {
                    trace!(bytes = text.len(), "Received WebSocket text frame");
                    return Inbound::Text(text);
                }
                Some(Ok(Message::Ping(_))) => trace!("Received WebSocket ping"),
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, "WebSocket closed by server");
                    return Inbound::Closed(
                        frame
                            .map(|f| f.reason.to_string())
                            .unwrap_or_else(|| "closed by server".into()),
                    );
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    return Inbound::Closed(e.to_string());
                }
                None => return Inbound::Closed("stream ended".into()),
            }
        }
    }

    /// Close the connection. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            debug!(url = %self.url, "Closing WebSocket");
            // Peer may already be gone
            let _ = socket.close(None).await;
        }
    }
}
