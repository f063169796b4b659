//! Binance WebSocket Message Types
//!
//! Outbound control messages for the Binance market data stream.
//!
//! # References
//!
//! - [Live subscribing](https://developers.binance.com/docs/binance-spot-api-docs/web-socket-streams#live-subscribingunsubscribing-to-streams)

use serde::{Deserialize, Serialize};

/// Method tag for a subscribe request.
pub const SUBSCRIBE_METHOD: &str = "SUBSCRIBE";

/// Stream-kind suffix for diff depth updates.
pub const DEPTH_STREAM_SUFFIX: &str = "depth";

/// Request id sent with every subscribe request.
pub const SUBSCRIBE_REQUEST_ID: u64 = 1;

/// Build the channel name for a symbol's depth stream, e.g. `btcusdt@depth`.
#[must_use]
pub fn depth_channel(symbol: &str) -> String {
    format!("{symbol}@{DEPTH_STREAM_SUFFIX}")
}

/// Stream subscription request.
///
/// # Wire Format (JSON)
/// ```json
/// {"method": "SUBSCRIBE", "params": ["btcusdt@depth"], "id": 1}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Request method.
    pub method: String,

    /// Channel names.
    pub params: Vec<String>,

    /// Request id echoed back in the acknowledgement.
    pub id: u64,
}

impl SubscriptionRequest {
    /// Create a subscribe request for the given channels.
    #[must_use]
    pub fn subscribe(params: Vec<String>) -> Self {
        Self {
            method: SUBSCRIBE_METHOD.to_string(),
            params,
            id: SUBSCRIBE_REQUEST_ID,
        }
    }

    /// Create a subscribe request for one symbol's depth stream.
    #[must_use]
    pub fn depth(symbol: &str) -> Self {
        Self::subscribe(vec![depth_channel(symbol)])
    }
}
