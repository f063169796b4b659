//! WebSocket Transport
//!
//! `tokio-tungstenite` adapter for [`TransportPort`]. Opens one connection
//! to the configured endpoint per call to `open` and never retries on its
//! own.
//!
//! # Stream URL
//!
//! - Production: `wss://stream.binance.com:9443/ws`
//!
//! # Frames
//!
//! Text and binary frames are handed to the caller as bytes. Pings are
//! answered in place; a close frame or the end of the stream is reported
//! as [`TransportError::Closed`].

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{ConnectionPort, Frame, TransportError, TransportPort};

/// Default depth stream endpoint.
pub const DEFAULT_STREAM_URL: &str = "wss://stream.binance.com:9443/ws";

/// Transport that dials a WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    /// Create a transport for the given endpoint.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The endpoint this transport dials.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_URL)
    }
}

#[async_trait]
impl TransportPort for WebSocketTransport {
    type Connection = WebSocketConnection;

    async fn open(&self) -> Result<Self::Connection, TransportError> {
        tracing::info!(url = %self.url, "Connecting to depth stream");

        let (stream, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(WebSocketConnection { stream })
    }
}

/// An open WebSocket connection.
pub struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl std::fmt::Debug for WebSocketConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConnection").finish_non_exhaustive()
    }
}

#[async_trait]
impl ConnectionPort for WebSocketConnection {
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_bytes().to_vec()),
                Some(Ok(Message::Binary(data))) => return Ok(data.to_vec()),
                Some(Ok(Message::Ping(data))) => {
                    self.stream
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| TransportError::Read(format!("failed to answer ping: {e}")))?;
                }
                Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Server sent close frame");
                    return Err(TransportError::Closed);
                }
                Some(Err(e)) => return Err(TransportError::Read(e.to_string())),
                None => {
                    tracing::info!("WebSocket stream ended");
                    return Err(TransportError::Closed);
                }
            }
        }
    }

    async fn write_frame(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "Error while closing WebSocket");
        }
    }
}
