//! Prometheus Metrics Module
//!
//! Exposes stream client metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Delivery**: updates delivered to and dropped before the consumer
//! - **Decoding**: frames discarded as undecodable
//! - **Connection**: lifecycle phase, reconnect attempts and failures
//! - **Backoff**: waits observed and their durations
//!
//! # Integration
//!
//! When a port is configured, metrics are served at `/metrics` by the
//! exporter's own HTTP listener. Without an installed recorder every
//! recording function is a no-op.

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::session::{CloseReason, ConnectionPhase};

static METRICS_INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

/// Install the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime. Calling it again after a
/// successful install is a no-op.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed or the listener
/// cannot bind.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    if METRICS_INSTALLED.get().is_some() {
        return Ok(());
    }

    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metrics();
    let _ = METRICS_INSTALLED.set(addr);

    tracing::info!(%addr, "Prometheus metrics listener started");
    Ok(())
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "depth_stream_updates_delivered_total",
        "Updates handed to the consumer"
    );
    describe_counter!(
        "depth_stream_updates_dropped_total",
        "Updates discarded because the consumer was not ready"
    );
    describe_counter!(
        "depth_stream_frames_discarded_total",
        "Inbound frames that failed to decode"
    );
    describe_counter!(
        "depth_stream_transport_errors_total",
        "Transport errors by kind"
    );
    describe_counter!(
        "depth_stream_reconnect_attempts_total",
        "Reconnect attempts started"
    );
    describe_counter!(
        "depth_stream_reconnect_failures_total",
        "Reconnect attempts that failed to connect or subscribe"
    );
    describe_counter!(
        "depth_stream_sessions_closed_total",
        "Stream sessions that stopped, by reason"
    );
    describe_gauge!(
        "depth_stream_connection_phase",
        "Current lifecycle phase (0=connecting 1=subscribing 2=streaming 3=backing_off 4=closed)"
    );
    describe_histogram!(
        "depth_stream_backoff_seconds",
        "Backoff delay waited before a reconnect attempt"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record an update handed to the consumer.
pub fn record_update_delivered() {
    counter!("depth_stream_updates_delivered_total").increment(1);
}

/// Record an update dropped before reaching the consumer.
pub fn record_update_dropped() {
    counter!("depth_stream_updates_dropped_total").increment(1);
}

/// Record a frame discarded by the decoder.
pub fn record_frame_discarded() {
    counter!("depth_stream_frames_discarded_total").increment(1);
}

/// Record a transport error.
pub fn record_transport_error(kind: &'static str) {
    counter!("depth_stream_transport_errors_total", "kind" => kind).increment(1);
}

/// Record the start of a reconnect attempt.
pub fn record_reconnect_attempt() {
    counter!("depth_stream_reconnect_attempts_total").increment(1);
}

/// Record a failed reconnect attempt.
pub fn record_reconnect_failure() {
    counter!("depth_stream_reconnect_failures_total").increment(1);
}

/// Record a session closing for good.
pub fn record_session_closed(reason: CloseReason) {
    counter!("depth_stream_sessions_closed_total", "reason" => reason.as_str()).increment(1);
}

/// Update the lifecycle phase gauge.
pub fn set_connection_phase(phase: ConnectionPhase) {
    gauge!("depth_stream_connection_phase").set(f64::from(phase.code()));
}

/// Record a backoff wait.
pub fn record_backoff(delay: Duration) {
    histogram!("depth_stream_backoff_seconds").record(delay.as_secs_f64());
}
