//! Binance Depth Stream Adapters
//!
//! WebSocket client for the Binance order book depth stream.
//!
//! # Components
//!
//! - [`transport`]: `tokio-tungstenite` connection to the stream endpoint
//! - [`messages`]: Outbound subscribe request
//! - [`codec`]: JSON decoding of depth frames
//! - [`subscription`]: Subscribe request construction and sending
//! - [`reconnect`]: Exponential backoff with a bounded attempt count
//! - [`client`]: Connection lifecycle and delivery to the consumer

pub mod client;
pub mod codec;
pub mod messages;
pub mod reconnect;
pub mod subscription;
pub mod transport;

pub use client::{DepthStreamClient, DepthStreamConfig, DepthStreamError, SessionReport};
pub use codec::{CodecError, DepthCodec};
pub use messages::SubscriptionRequest;
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use subscription::SubscribeError;
pub use transport::{DEFAULT_STREAM_URL, WebSocketConnection, WebSocketTransport};
