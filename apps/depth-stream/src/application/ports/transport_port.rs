//! Transport Port (Driven Port)
//!
//! Interface for one bidirectional streaming connection to the feed.
//!
//! Adapters report every failure to the caller and never retry on their
//! own; reconnect policy belongs to the session that drives them.
//!
//! - `WebSocketTransport` - `tokio-tungstenite` client for the live feed

use async_trait::async_trait;

/// One inbound frame payload.
pub type Frame = Vec<u8>;

/// Errors raised by a transport or one of its connections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// An outbound frame could not be written.
    #[error("write failed: {0}")]
    Write(String),

    /// The inbound stream failed (reset, protocol error).
    #[error("read failed: {0}")]
    Read(String),

    /// The remote end closed the connection.
    #[error("connection closed by remote")]
    Closed,
}

impl TransportError {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Write(_) => "write",
            Self::Read(_) => "read",
            Self::Closed => "closed",
        }
    }
}

/// Factory for connections to a single, fixed endpoint.
#[async_trait]
pub trait TransportPort: Send + Sync {
    /// Connection handle produced by [`TransportPort::open`].
    type Connection: ConnectionPort;

    /// Open a new connection.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] if the endpoint is unreachable
    /// or the handshake fails.
    async fn open(&self) -> Result<Self::Connection, TransportError>;
}

/// An established connection.
#[async_trait]
pub trait ConnectionPort: Send {
    /// Wait for the next data frame.
    ///
    /// Control traffic (ping/pong) is handled inside the adapter. The
    /// returned future must be safe to drop before it completes.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Read`] or [`TransportError::Closed`] when
    /// the stream is no longer usable.
    async fn read_frame(&mut self) -> Result<Frame, TransportError>;

    /// Write one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Write`] if the frame could not be sent.
    async fn write_frame(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the connection. Errors on an already broken socket are ignored.
    async fn close(&mut self);
}
