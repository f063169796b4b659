//! Order Book Update Types
//!
//! The decoded form of one depth-stream frame. Prices and quantities are kept
//! as the exchange sends them (decimal strings); consumers that need numbers
//! call [`PriceLevel::to_decimal`].
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {
//!   "e": "depthUpdate",
//!   "E": 1700000000123,
//!   "s": "BTCUSDT",
//!   "u": 400900217,
//!   "b": [["42000.10", "0.500"]],
//!   "a": [["42000.20", "1.250"]]
//! }
//! ```

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One `[price, quantity]` level as sent on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceLevel(pub String, pub String);

impl PriceLevel {
    /// Create a level from price and quantity strings.
    #[must_use]
    pub fn new(price: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self(price.into(), quantity.into())
    }

    /// Price as sent by the exchange.
    #[must_use]
    pub fn price(&self) -> &str {
        &self.0
    }

    /// Quantity as sent by the exchange.
    #[must_use]
    pub fn quantity(&self) -> &str {
        &self.1
    }

    /// Parse price and quantity into decimals.
    ///
    /// # Errors
    ///
    /// Returns an error if either string is not a valid decimal number.
    pub fn to_decimal(&self) -> Result<(Decimal, Decimal), rust_decimal::Error> {
        Ok((Decimal::from_str(&self.0)?, Decimal::from_str(&self.1)?))
    }
}

/// A single order book depth update.
///
/// Missing keys decode to their zero value and unknown keys are ignored, so
/// any JSON object is structurally acceptable; only syntax errors and type
/// mismatches are rejected by the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderBookUpdate {
    /// Event type tag (`depthUpdate`).
    #[serde(rename = "e")]
    pub event_type: String,

    /// Event time in milliseconds since the Unix epoch.
    #[serde(rename = "E")]
    pub event_time: i64,

    /// Exchange symbol, e.g. `BTCUSDT`.
    #[serde(rename = "s")]
    pub symbol: String,

    /// Final update id in this event.
    #[serde(rename = "u")]
    pub update_id: i64,

    /// Bid levels to update.
    #[serde(rename = "b")]
    pub bids: Vec<PriceLevel>,

    /// Ask levels to update.
    #[serde(rename = "a")]
    pub asks: Vec<PriceLevel>,
}

impl OrderBookUpdate {
    /// Event time as a UTC timestamp.
    ///
    /// Returns `None` if the millisecond value is out of range.
    #[must_use]
    pub fn event_timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.event_time)
    }

    /// First bid level, if any.
    #[must_use]
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    /// First ask level, if any.
    #[must_use]
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// True when the update carries no levels on either side.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
