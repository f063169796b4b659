//! Printing updates while the session logs from another worker thread.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use depth_stream::infrastructure::telemetry::{self, TelemetryConfig};
use depth_stream::{
    CloseReason, ConnectionPort, DepthStreamClient, DepthStreamConfig, Frame, TransportError,
    TransportPort, write_json_lines,
};
use tokio_util::sync::CancellationToken;

const UPDATE: &str = r#"{"e":"depthUpdate","E":1700000000000,"s":"BTCUSDT","u":11,"b":[["42000.00","0.50"]],"a":[]}"#;

/// Delivers one frame, then stalls before the read fails.
struct OneShotTransport;

struct OneShotConnection {
    frames: VecDeque<&'static str>,
}

#[async_trait]
impl TransportPort for OneShotTransport {
    type Connection = OneShotConnection;

    async fn open(&self) -> Result<Self::Connection, TransportError> {
        Ok(OneShotConnection {
            frames: VecDeque::from([UPDATE]),
        })
    }
}

#[async_trait]
impl ConnectionPort for OneShotConnection {
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        if let Some(frame) = self.frames.pop_front() {
            return Ok(frame.as_bytes().to_vec());
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        Err(TransportError::Read("connection reset".to_string()))
    }

    async fn write_frame(&mut self, _text: String) -> Result<(), TransportError> {
        Ok(())
    }

    async fn close(&mut self) {}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stdout_consumer_does_not_stall_session_logging() {
    let _telemetry = telemetry::init_with_config(TelemetryConfig::default());

    let config = DepthStreamConfig {
        reconnect: false,
        ..DepthStreamConfig::new("btcusdt")
    };
    let (mut updates, handle) =
        DepthStreamClient::spawn(config, OneShotTransport, CancellationToken::new())
            .await
            .unwrap();

    let mut stdout = tokio::io::stdout();
    let printed = tokio::time::timeout(
        Duration::from_secs(5),
        write_json_lines(&mut updates, &mut stdout),
    )
    .await
    .expect("consumer stalled while the session was logging")
    .unwrap();

    let report = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(printed, 1);
    assert_eq!(report.updates_delivered, 1);
    assert_eq!(report.close_reason, CloseReason::ReconnectDisabled);
}
