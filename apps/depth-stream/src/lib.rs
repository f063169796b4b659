#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Depth Stream - Order Book Feed Client
//!
//! Keeps one WebSocket connection to the Binance depth stream for a single
//! symbol, survives transient failures with bounded exponential backoff,
//! and hands decoded updates to a local consumer without ever blocking the
//! read loop.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Order book update values and session phases
//! - **Application**: Transport port traits
//! - **Infrastructure**: Adapters and process glue
//!   - `binance`: WebSocket transport, codec, subscription, lifecycle client
//!   - `delivery`: Bounded, non-blocking hand-off channel
//!   - `config`: Environment configuration
//!   - `metrics` / `telemetry`: Prometheus and tracing
//!
//! # Data Flow
//!
//! ```text
//! Binance WS ──► Transport ──► Codec ──► DepthStreamClient ──offer──► Delivery ──► Consumer
//!                    ▲                          │
//!                    └──── reconnect/backoff ───┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use depth_stream::{DepthStreamClient, DepthStreamConfig, WebSocketTransport};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let (mut updates, handle) = DepthStreamClient::spawn(
//!     DepthStreamConfig::new("btcusdt"),
//!     WebSocketTransport::default(),
//!     cancel.clone(),
//! )
//! .await?;
//!
//! while let Some(update) = updates.recv().await {
//!     println!("{} {}", update.symbol, update.update_id);
//! }
//! let report = handle.await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

pub use application::ports::{ConnectionPort, Frame, TransportError, TransportPort};
pub use domain::order_book::{OrderBookUpdate, PriceLevel};
pub use domain::session::{CloseReason, ConnectionPhase};
pub use infrastructure::binance::{
    DepthCodec, DepthStreamClient, DepthStreamConfig, DepthStreamError, ReconnectConfig,
    ReconnectPolicy, SessionReport, WebSocketTransport,
};
pub use infrastructure::config::{ClientSettings, ConfigError, ReconnectSettings};
pub use infrastructure::delivery::{DeliveryReceiver, DeliverySender, Offer, write_json_lines};
pub use infrastructure::metrics::init_metrics;
