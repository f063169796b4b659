//! Stream Codec Module
//!
//! Decodes inbound depth frames and encodes outbound control messages.
//!
//! Decoding is structural only: any JSON object is accepted, missing keys
//! take their zero value and unknown keys are ignored. A subscription
//! acknowledgement such as `{"result":null,"id":1}` therefore decodes to an
//! empty [`OrderBookUpdate`] and travels like any other frame.

use crate::domain::order_book::OrderBookUpdate;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON codec for the depth stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct DepthCodec;

impl DepthCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one frame into an order book update.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not valid JSON, is not an object, or
    /// a known key holds a value of the wrong type.
    pub fn decode(&self, frame: &[u8]) -> Result<OrderBookUpdate, CodecError> {
        Ok(serde_json::from_slice(frame)?)
    }

    /// Encode a value to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode<T: serde::Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }
}
