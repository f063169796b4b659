//! Infrastructure Layer - Adapters and external integrations.

/// Binance depth stream client.
pub mod binance;

/// Environment configuration.
pub mod config;

/// Lossy hand-off to the consumer.
pub mod delivery;

/// Prometheus metrics.
pub mod metrics;

/// Tracing and OpenTelemetry setup.
pub mod telemetry;
