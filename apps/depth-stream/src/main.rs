//! Depth Stream Binary
//!
//! Streams order book depth updates for one symbol and prints each update
//! as a JSON line on stdout. Logs are written to stderr.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin depth-stream
//! ```
//!
//! # Environment Variables
//!
//! - `DEPTH_STREAM_URL`: Stream endpoint (default: wss://stream.binance.com:9443/ws)
//! - `DEPTH_STREAM_SYMBOL`: Symbol to subscribe to (default: btcusdt)
//! - `DEPTH_STREAM_RECONNECT`: Reconnect after failures (default: true)
//! - `DEPTH_STREAM_CHANNEL_CAPACITY`: Delivery buffer size (default: 16)
//! - `DEPTH_STREAM_RECONNECT_DELAY_INITIAL_MS`: Base backoff (default: 5000)
//! - `DEPTH_STREAM_RECONNECT_DELAY_MAX_SECS`: Backoff cap (default: 300)
//! - `DEPTH_STREAM_RECONNECT_DELAY_MULTIPLIER`: Backoff growth (default: 2.0)
//! - `DEPTH_STREAM_MAX_RECONNECT_ATTEMPTS`: Retry bound, 0 = unlimited (default: 5)
//! - `DEPTH_STREAM_METRICS_PORT`: Prometheus port, 0 = disabled (default: 9090)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: depth-stream)
//! - `RUST_LOG`: Log level (default: info)

use std::net::SocketAddr;

use anyhow::Context;
use depth_stream::infrastructure::telemetry;
use depth_stream::{
    ClientSettings, DepthStreamClient, DepthStreamConfig, WebSocketTransport, init_metrics,
    write_json_lines,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
#[allow(clippy::expect_used)]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting depth stream");

    let settings = ClientSettings::from_env().context("invalid configuration")?;
    log_settings(&settings);

    if settings.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], settings.metrics_port));
        init_metrics(addr).context("failed to start Prometheus listener")?;
    }

    let cancel = CancellationToken::new();
    tokio::spawn(await_shutdown(cancel.clone()));

    let transport = WebSocketTransport::new(settings.url.clone());
    let (mut updates, handle) = DepthStreamClient::spawn(
        DepthStreamConfig::from_settings(&settings),
        transport,
        cancel.clone(),
    )
    .await
    .context("failed to start depth stream")?;

    let mut stdout = tokio::io::stdout();
    let printed = write_json_lines(&mut updates, &mut stdout)
        .await
        .context("failed to write update")?;
    tracing::debug!(printed, "Update stream drained");

    let report = handle.await.context("depth stream task panicked")?;
    tracing::info!(
        close_reason = %report.close_reason,
        reconnects = report.reconnects,
        backoff_waits = report.backoff_waits,
        delivered = report.updates_delivered,
        dropped = report.updates_dropped,
        discarded = report.frames_discarded,
        "Depth stream stopped"
    );

    if report.is_clean() {
        Ok(())
    } else {
        anyhow::bail!("depth stream closed: {}", report.close_reason)
    }
}

/// Log the parsed configuration.
fn log_settings(settings: &ClientSettings) {
    tracing::info!(
        url = %settings.url,
        symbol = %settings.symbol,
        reconnect = settings.reconnect.enabled,
        max_attempts = settings.reconnect.max_attempts,
        channel_capacity = settings.channel_capacity,
        metrics_port = settings.metrics_port,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT), then cancel the stream.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
