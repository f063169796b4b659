//! Depth Stream Client
//!
//! Owns the connection lifecycle for one symbol's depth stream: connect,
//! subscribe, read, and reconnect with bounded exponential backoff. Decoded
//! updates are offered to a [`DeliverySender`] without ever waiting on the
//! consumer.
//!
//! # Lifecycle
//!
//! ```text
//! connect() ─► subscribe() ─► run() ─► Streaming ─read fail─► BackingOff
//!                                         ▲                     │
//!                                         └── Subscribing ◄── Connecting
//! ```
//!
//! The initial connect and subscribe are made by the caller and fail hard.
//! Everything after that is absorbed by the run loop, which only stops when
//! the token is cancelled, reconnection is disabled, or the retry budget is
//! spent. The consumer observes the stop as the channel closing; the owner
//! of the task gets a [`SessionReport`].

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::codec::{CodecError, DepthCodec};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::subscription::{SubscribeError, build_subscribe_request, send_subscribe};
use crate::application::ports::{ConnectionPort, TransportError, TransportPort};
use crate::domain::session::{CloseReason, ConnectionPhase};
use crate::infrastructure::config::ClientSettings;
use crate::infrastructure::delivery::{
    self, DEFAULT_CAPACITY, DeliveryReceiver, DeliverySender, Offer,
};
use crate::infrastructure::metrics;

// =============================================================================
// Errors
// =============================================================================

/// Errors surfaced to the caller during construction.
#[derive(Debug, thiserror::Error)]
pub enum DepthStreamError {
    /// The initial connection could not be opened.
    #[error("failed to connect to depth stream: {0}")]
    Connect(#[source] TransportError),

    /// The initial subscribe request could not be written.
    #[error("failed to subscribe to depth stream: {0}")]
    Subscribe(#[source] TransportError),

    /// The subscribe request could not be serialized.
    #[error("failed to encode subscribe request: {0}")]
    Encode(#[from] CodecError),
}

impl From<SubscribeError> for DepthStreamError {
    fn from(err: SubscribeError) -> Self {
        match err {
            SubscribeError::Encode(e) => Self::Encode(e),
            SubscribeError::Write(e) => Self::Subscribe(e),
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Depth stream client configuration.
#[derive(Debug, Clone)]
pub struct DepthStreamConfig {
    /// Symbol to subscribe to. Empty means no subscription is sent.
    pub symbol: String,
    /// Reconnect after a connection failure.
    pub reconnect: bool,
    /// Delivery channel capacity (0 = strict hand-off).
    pub channel_capacity: usize,
    /// Backoff policy for reconnects.
    pub reconnect_policy: ReconnectConfig,
}

impl Default for DepthStreamConfig {
    fn default() -> Self {
        Self {
            symbol: crate::infrastructure::config::DEFAULT_SYMBOL.to_string(),
            reconnect: true,
            channel_capacity: DEFAULT_CAPACITY,
            reconnect_policy: ReconnectConfig::default(),
        }
    }
}

impl DepthStreamConfig {
    /// Create a configuration for `symbol` with default settings.
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    /// Create configuration from loaded client settings.
    #[must_use]
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            symbol: settings.symbol.clone(),
            reconnect: settings.reconnect.enabled,
            channel_capacity: settings.channel_capacity,
            reconnect_policy: ReconnectConfig::from_settings(&settings.reconnect),
        }
    }
}

// =============================================================================
// Session Report
// =============================================================================

/// Summary returned by [`DepthStreamClient::run`] when the session stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    /// Why the session stopped.
    pub close_reason: CloseReason,
    /// Consecutive failed reconnect attempts at the time of closing.
    pub reconnect_attempts: u32,
    /// Backoff waits that ran to completion.
    pub backoff_waits: u32,
    /// Reconnects that got back to streaming.
    pub reconnects: u32,
    /// Updates handed to the consumer.
    pub updates_delivered: u64,
    /// Updates dropped because the consumer was not ready.
    pub updates_dropped: u64,
    /// Frames that failed to decode.
    pub frames_discarded: u64,
}

impl SessionReport {
    /// True if the session stopped because it was cancelled.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.close_reason.is_clean()
    }
}

#[derive(Debug, Default)]
struct SessionStats {
    backoff_waits: u32,
    reconnects: u32,
    frames_discarded: u64,
}

// =============================================================================
// Client
// =============================================================================

/// Lifecycle manager for one depth stream session.
pub struct DepthStreamClient<T: TransportPort> {
    config: DepthStreamConfig,
    transport: T,
    connection: Option<T::Connection>,
    symbol: Option<String>,
    codec: DepthCodec,
    policy: ReconnectPolicy,
}

impl<T: TransportPort> std::fmt::Debug for DepthStreamClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepthStreamClient")
            .field("config", &self.config)
            .field("connected", &self.connection.is_some())
            .field("symbol", &self.symbol)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<T: TransportPort> DepthStreamClient<T> {
    /// Open the first connection.
    ///
    /// # Errors
    ///
    /// Returns [`DepthStreamError::Connect`] if the transport cannot be
    /// opened. No retry is made.
    pub async fn connect(
        config: DepthStreamConfig,
        transport: T,
    ) -> Result<Self, DepthStreamError> {
        let connection = transport.open().await.map_err(DepthStreamError::Connect)?;
        tracing::info!("Connected to depth stream");

        Ok(Self {
            policy: ReconnectPolicy::new(config.reconnect_policy.clone()),
            config,
            transport,
            connection: Some(connection),
            symbol: None,
            codec: DepthCodec::new(),
        })
    }

    /// Subscribe to `symbol`'s depth stream on the current connection.
    ///
    /// The symbol is remembered and re-subscribed after every reconnect.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent. The connection is
    /// closed in that case and [`run`](Self::run) starts by reconnecting.
    pub async fn subscribe(&mut self, symbol: &str) -> Result<(), DepthStreamError> {
        self.symbol = Some(symbol.to_string());

        let Some(connection) = self.connection.as_mut() else {
            return Err(DepthStreamError::Subscribe(TransportError::Closed));
        };

        match send_subscribe(connection, &self.codec, &build_subscribe_request(symbol)).await {
            Ok(()) => {
                tracing::info!(symbol, "Subscribed to depth stream");
                Ok(())
            }
            Err(e) => {
                self.close_connection().await;
                Err(e.into())
            }
        }
    }

    /// Client configuration.
    #[must_use]
    pub const fn config(&self) -> &DepthStreamConfig {
        &self.config
    }

    /// The subscribed symbol, if any.
    #[must_use]
    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    /// True while a connection is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Drive the session until it closes.
    ///
    /// Closes the transport and the delivery channel before returning.
    pub async fn run(mut self, sink: DeliverySender, cancel: CancellationToken) -> SessionReport {
        let mut stats = SessionStats::default();
        let mut phase = if self.connection.is_some() {
            ConnectionPhase::Streaming
        } else {
            ConnectionPhase::Connecting
        };

        let close_reason = loop {
            tracing::debug!(%phase, "Depth stream phase");
            metrics::set_connection_phase(phase);

            phase = match phase {
                ConnectionPhase::Connecting => self.open_connection(&cancel, &mut stats).await,
                ConnectionPhase::Subscribing => self.resubscribe(&mut stats).await,
                ConnectionPhase::Streaming => self.stream(&sink, &cancel, &mut stats).await,
                ConnectionPhase::BackingOff => self.back_off(&cancel, &mut stats).await,
                ConnectionPhase::Closed(reason) => break reason,
            };
        };

        self.close_connection().await;
        metrics::record_session_closed(close_reason);

        let report = SessionReport {
            close_reason,
            reconnect_attempts: self.policy.attempt_count(),
            backoff_waits: stats.backoff_waits,
            reconnects: stats.reconnects,
            updates_delivered: sink.delivered_count(),
            updates_dropped: sink.dropped_count(),
            frames_discarded: stats.frames_discarded,
        };
        sink.close();

        if close_reason.is_clean() {
            tracing::info!(?report, "Depth stream closed");
        } else {
            tracing::error!(?report, "Depth stream closed");
        }
        report
    }

    /// Connect, subscribe and spawn the run loop.
    ///
    /// An empty symbol in `config` skips the subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the first connect or subscribe fails.
    pub async fn spawn(
        config: DepthStreamConfig,
        transport: T,
        cancel: CancellationToken,
    ) -> Result<(DeliveryReceiver, JoinHandle<SessionReport>), DepthStreamError>
    where
        T: 'static,
    {
        let symbol = config.symbol.clone();
        let (sink, receiver) = delivery::channel(config.channel_capacity);

        let mut client = Self::connect(config, transport).await?;
        if !symbol.is_empty() {
            client.subscribe(&symbol).await?;
        }

        let handle = tokio::spawn(client.run(sink, cancel));
        Ok((receiver, handle))
    }

    async fn open_connection(
        &mut self,
        cancel: &CancellationToken,
        stats: &mut SessionStats,
    ) -> ConnectionPhase {
        if cancel.is_cancelled() {
            return ConnectionPhase::Closed(CloseReason::Cancelled);
        }

        metrics::record_reconnect_attempt();
        tracing::info!(
            attempt = self.policy.attempt_count() + 1,
            max_attempts = self.policy.max_attempts(),
            "Reconnecting to depth stream"
        );

        let transport = &self.transport;
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return ConnectionPhase::Closed(CloseReason::Cancelled),
            result = transport.open() => result,
        };

        match result {
            Ok(connection) => {
                self.connection = Some(connection);
                if self.symbol.is_some() {
                    ConnectionPhase::Subscribing
                } else {
                    self.reconnected(stats);
                    ConnectionPhase::Streaming
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Reconnect failed");
                metrics::record_transport_error(e.kind());
                self.attempt_failed();
                ConnectionPhase::BackingOff
            }
        }
    }

    async fn resubscribe(&mut self, stats: &mut SessionStats) -> ConnectionPhase {
        let (Some(connection), Some(symbol)) = (self.connection.as_mut(), self.symbol.as_deref())
        else {
            return ConnectionPhase::Streaming;
        };

        let request = build_subscribe_request(symbol);
        match send_subscribe(connection, &self.codec, &request).await {
            Ok(()) => {
                tracing::info!(symbol = %symbol, "Resubscribed to depth stream");
                self.reconnected(stats);
                ConnectionPhase::Streaming
            }
            Err(e) => {
                tracing::warn!(error = %e, "Resubscribe failed");
                if let SubscribeError::Write(ref transport_error) = e {
                    metrics::record_transport_error(transport_error.kind());
                }
                self.close_connection().await;
                self.attempt_failed();
                ConnectionPhase::BackingOff
            }
        }
    }

    async fn stream(
        &mut self,
        sink: &DeliverySender,
        cancel: &CancellationToken,
        stats: &mut SessionStats,
    ) -> ConnectionPhase {
        let codec = self.codec;
        let Some(connection) = self.connection.as_mut() else {
            return ConnectionPhase::BackingOff;
        };

        let error = loop {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return ConnectionPhase::Closed(CloseReason::Cancelled),
                result = connection.read_frame() => result,
            };

            match result {
                Ok(frame) => deliver(&codec, &frame, sink, stats),
                Err(e) => break e,
            }
        };

        tracing::warn!(error = %error, "Depth stream read failed");
        metrics::record_transport_error(error.kind());
        self.close_connection().await;
        ConnectionPhase::BackingOff
    }

    async fn back_off(
        &mut self,
        cancel: &CancellationToken,
        stats: &mut SessionStats,
    ) -> ConnectionPhase {
        if !self.config.reconnect {
            tracing::info!("Reconnection disabled, closing depth stream");
            return ConnectionPhase::Closed(CloseReason::ReconnectDisabled);
        }

        if self.policy.is_exhausted() {
            tracing::error!(
                attempts = self.policy.attempt_count(),
                "Maximum reconnection attempts exceeded"
            );
            return ConnectionPhase::Closed(CloseReason::RetryBudgetExhausted);
        }

        let delay = self.policy.next_wait();
        tracing::info!(
            attempt = self.policy.attempt_count() + 1,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("Depth stream cancelled during reconnect delay");
                ConnectionPhase::Closed(CloseReason::Cancelled)
            }
            () = tokio::time::sleep(delay) => {
                stats.backoff_waits += 1;
                metrics::record_backoff(delay);
                ConnectionPhase::Connecting
            }
        }
    }

    fn reconnected(&mut self, stats: &mut SessionStats) {
        self.policy.reset();
        stats.reconnects += 1;
    }

    fn attempt_failed(&mut self) {
        self.policy.record_failure();
        metrics::record_reconnect_failure();
    }

    async fn close_connection(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
            tracing::debug!("Depth stream connection closed");
        }
    }
}

fn deliver(codec: &DepthCodec, frame: &[u8], sink: &DeliverySender, stats: &mut SessionStats) {
    match codec.decode(frame) {
        Ok(update) => match sink.offer(update) {
            Offer::Delivered => metrics::record_update_delivered(),
            Offer::Dropped => metrics::record_update_dropped(),
        },
        Err(e) => {
            stats.frames_discarded += 1;
            metrics::record_frame_discarded();
            tracing::warn!(error = %e, len = frame.len(), "Discarding undecodable frame");
        }
    }
}
