//! Session lifecycle tests against a scripted transport.
//!
//! Time is paused, so backoff waits complete instantly while
//! `tokio::time::Instant` still reports their exact virtual duration.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use depth_stream::{
    CloseReason, ConnectionPort, DepthStreamClient, DepthStreamConfig, DepthStreamError, Frame,
    ReconnectConfig, TransportError, TransportPort,
};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Scripted Transport
// =============================================================================

enum Read {
    Frame(String),
    Fail,
}

enum Dial {
    Accept {
        reads: Vec<Read>,
        fail_subscribe: bool,
    },
    Refuse,
}

fn accept(reads: Vec<Read>) -> Dial {
    Dial::Accept {
        reads,
        fail_subscribe: false,
    }
}

struct Script {
    dials: Mutex<VecDeque<Dial>>,
    opens: Mutex<Vec<Instant>>,
    subscribes: Mutex<Vec<String>>,
    closes: AtomicUsize,
    opened: watch::Sender<usize>,
}

impl Script {
    fn new(dials: Vec<Dial>) -> Arc<Self> {
        let (opened, _) = watch::channel(0);
        Arc::new(Self {
            dials: Mutex::new(dials.into()),
            opens: Mutex::new(Vec::new()),
            subscribes: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
            opened,
        })
    }

    async fn wait_for_opens(&self, count: usize) {
        let mut rx = self.opened.subscribe();
        rx.wait_for(|n| *n >= count).await.unwrap();
    }

    fn open_gaps(&self) -> Vec<Duration> {
        let opens = self.opens.lock().unwrap();
        opens.windows(2).map(|w| w[1] - w[0]).collect()
    }

    fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }
}

struct ScriptedTransport {
    script: Arc<Script>,
}

struct ScriptedConnection {
    reads: VecDeque<Read>,
    fail_subscribe: bool,
    script: Arc<Script>,
}

#[async_trait]
impl TransportPort for ScriptedTransport {
    type Connection = ScriptedConnection;

    async fn open(&self) -> Result<Self::Connection, TransportError> {
        self.script.opens.lock().unwrap().push(Instant::now());
        let dial = self.script.dials.lock().unwrap().pop_front();
        self.script.opened.send_modify(|n| *n += 1);

        match dial {
            Some(Dial::Accept {
                reads,
                fail_subscribe,
            }) => Ok(ScriptedConnection {
                reads: reads.into(),
                fail_subscribe,
                script: Arc::clone(&self.script),
            }),
            Some(Dial::Refuse) | None => {
                Err(TransportError::Connect("connection refused".to_string()))
            }
        }
    }
}

#[async_trait]
impl ConnectionPort for ScriptedConnection {
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        match self.reads.pop_front() {
            Some(Read::Frame(text)) => Ok(text.into_bytes()),
            Some(Read::Fail) => Err(TransportError::Read("connection reset".to_string())),
            None => std::future::pending().await,
        }
    }

    async fn write_frame(&mut self, text: String) -> Result<(), TransportError> {
        if self.fail_subscribe {
            return Err(TransportError::Write("broken pipe".to_string()));
        }
        self.script.subscribes.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&mut self) {
        self.script.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn depth(update_id: i64) -> Read {
    Read::Frame(format!(
        r#"{{"e":"depthUpdate","E":1700000000000,"s":"BTCUSDT","u":{update_id},"b":[["42000.10","0.5"]],"a":[]}}"#
    ))
}

fn config(base: Duration, max_attempts: u32) -> DepthStreamConfig {
    DepthStreamConfig {
        symbol: "btcusdt".to_string(),
        reconnect: true,
        channel_capacity: 16,
        reconnect_policy: ReconnectConfig::new(
            base,
            Duration::from_secs(3600),
            2.0,
            0.0,
            max_attempts,
        ),
    }
}

fn transport(script: &Arc<Script>) -> ScriptedTransport {
    ScriptedTransport {
        script: Arc::clone(script),
    }
}

const SUBSCRIBE: &str = r#"{"method":"SUBSCRIBE","params":["btcusdt@depth"],"id":1}"#;

// =============================================================================
// Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn backoff_doubles_per_failure_and_resets_after_success() {
    let script = Script::new(vec![
        accept(vec![depth(1), Read::Fail]),
        Dial::Refuse,
        Dial::Refuse,
        accept(vec![Read::Fail]),
        Dial::Refuse,
        accept(vec![]),
    ]);
    let cancel = CancellationToken::new();

    let (_updates, handle) = DepthStreamClient::spawn(
        config(Duration::from_secs(1), 5),
        transport(&script),
        cancel.clone(),
    )
    .await
    .unwrap();

    script.wait_for_opens(6).await;
    cancel.cancel();
    let report = handle.await.unwrap();

    assert_eq!(
        script.open_gaps(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(1),
            Duration::from_secs(2),
        ]
    );
    assert_eq!(report.close_reason, CloseReason::Cancelled);
    assert_eq!(report.backoff_waits, 5);
    assert_eq!(report.reconnects, 2);
    assert_eq!(report.reconnect_attempts, 0);
    assert_eq!(*script.subscribes.lock().unwrap(), vec![SUBSCRIBE; 3]);
}

#[tokio::test(start_paused = true)]
async fn retry_budget_exhaustion_closes_channel() {
    let script = Script::new(vec![accept(vec![depth(1), Read::Fail])]);

    let (mut updates, handle) = DepthStreamClient::spawn(
        config(Duration::from_secs(1), 5),
        transport(&script),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(updates.recv().await.unwrap().update_id, 1);
    assert!(updates.recv().await.is_none());

    let report = handle.await.unwrap();
    assert_eq!(report.close_reason, CloseReason::RetryBudgetExhausted);
    assert!(!report.is_clean());
    assert_eq!(report.reconnect_attempts, 5);
    assert_eq!(report.backoff_waits, 5);
    assert_eq!(report.reconnects, 0);

    // Initial connect plus five failed attempts, nothing after
    assert_eq!(script.open_count(), 6);
    assert_eq!(
        script.open_gaps(),
        [1, 2, 4, 8, 16].map(Duration::from_secs).to_vec()
    );
}

#[tokio::test(start_paused = true)]
async fn reconnect_disabled_closes_without_waiting() {
    let script = Script::new(vec![accept(vec![depth(1), Read::Fail]), accept(vec![])]);
    let cfg = DepthStreamConfig {
        reconnect: false,
        ..config(Duration::from_secs(5), 5)
    };
    let start = Instant::now();

    let (mut updates, handle) =
        DepthStreamClient::spawn(cfg, transport(&script), CancellationToken::new())
            .await
            .unwrap();

    assert_eq!(updates.recv().await.unwrap().update_id, 1);
    assert!(updates.recv().await.is_none());

    let report = handle.await.unwrap();
    assert_eq!(report.close_reason, CloseReason::ReconnectDisabled);
    assert_eq!(report.backoff_waits, 0);
    assert_eq!(script.open_count(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_discarded_without_transition() {
    let script = Script::new(vec![accept(vec![
        depth(1),
        Read::Frame("not json".to_string()),
        Read::Frame(r#"{"u":"seven"}"#.to_string()),
        depth(2),
        Read::Fail,
    ])]);
    let cfg = DepthStreamConfig {
        reconnect: false,
        ..config(Duration::from_secs(5), 5)
    };

    let (mut updates, handle) =
        DepthStreamClient::spawn(cfg, transport(&script), CancellationToken::new())
            .await
            .unwrap();

    assert_eq!(updates.recv().await.unwrap().update_id, 1);
    assert_eq!(updates.recv().await.unwrap().update_id, 2);
    assert!(updates.recv().await.is_none());

    let report = handle.await.unwrap();
    assert_eq!(report.frames_discarded, 2);
    assert_eq!(report.updates_delivered, 2);
    assert_eq!(report.reconnect_attempts, 0);
    assert_eq!(script.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn subscription_ack_is_delivered_as_empty_update() {
    let script = Script::new(vec![accept(vec![
        Read::Frame(r#"{"result":null,"id":1}"#.to_string()),
        Read::Fail,
    ])]);
    let cfg = DepthStreamConfig {
        reconnect: false,
        ..config(Duration::from_secs(5), 5)
    };

    let (mut updates, handle) =
        DepthStreamClient::spawn(cfg, transport(&script), CancellationToken::new())
            .await
            .unwrap();

    let ack = updates.recv().await.unwrap();
    assert!(ack.is_empty());
    assert_eq!(ack.update_id, 0);
    assert_eq!(handle.await.unwrap().frames_discarded, 0);
}

#[tokio::test(start_paused = true)]
async fn full_channel_drops_and_keeps_reading() {
    let script = Script::new(vec![accept(vec![depth(1), depth(2), depth(3)])]);
    let cancel = CancellationToken::new();
    let cfg = DepthStreamConfig {
        channel_capacity: 1,
        ..config(Duration::from_secs(5), 5)
    };

    let (mut updates, handle) = DepthStreamClient::spawn(cfg, transport(&script), cancel.clone())
        .await
        .unwrap();

    // Let the session read all three frames before anyone consumes
    tokio::time::sleep(Duration::from_millis(10)).await;
    cancel.cancel();
    let report = handle.await.unwrap();

    assert_eq!(report.updates_delivered, 1);
    assert_eq!(report.updates_dropped, 2);
    assert_eq!(updates.recv().await.unwrap().update_id, 1);
    assert!(updates.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn zero_capacity_without_waiting_consumer_drops_everything() {
    let script = Script::new(vec![accept(vec![depth(1), depth(2)])]);
    let cancel = CancellationToken::new();
    let cfg = DepthStreamConfig {
        channel_capacity: 0,
        ..config(Duration::from_secs(5), 5)
    };

    let (mut updates, handle) = DepthStreamClient::spawn(cfg, transport(&script), cancel.clone())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    cancel.cancel();
    let report = handle.await.unwrap();

    assert_eq!(report.updates_delivered, 0);
    assert_eq!(report.updates_dropped, 2);
    assert!(updates.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_closes_promptly() {
    let script = Script::new(vec![accept(vec![Read::Fail])]);
    let cancel = CancellationToken::new();
    let start = Instant::now();

    let (mut updates, handle) = DepthStreamClient::spawn(
        config(Duration::from_secs(40), 5),
        transport(&script),
        cancel.clone(),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(1)).await;
    cancel.cancel();

    let report = handle.await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(report.close_reason, CloseReason::Cancelled);
    assert_eq!(report.backoff_waits, 0);
    assert!(updates.recv().await.is_none());
    assert_eq!(script.open_count(), 1);
    assert_eq!(script.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_while_streaming_closes_transport() {
    let script = Script::new(vec![accept(vec![depth(1)])]);
    let cancel = CancellationToken::new();

    let (mut updates, handle) = DepthStreamClient::spawn(
        config(Duration::from_secs(5), 5),
        transport(&script),
        cancel.clone(),
    )
    .await
    .unwrap();

    assert_eq!(updates.recv().await.unwrap().update_id, 1);
    cancel.cancel();

    let report = handle.await.unwrap();
    assert!(report.is_clean());
    assert_eq!(script.closes.load(Ordering::SeqCst), 1);
    assert!(updates.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_resubscribe_counts_as_failed_attempt() {
    let script = Script::new(vec![
        accept(vec![Read::Fail]),
        Dial::Accept {
            reads: vec![],
            fail_subscribe: true,
        },
        accept(vec![]),
    ]);
    let cancel = CancellationToken::new();

    let (_updates, handle) = DepthStreamClient::spawn(
        config(Duration::from_secs(1), 5),
        transport(&script),
        cancel.clone(),
    )
    .await
    .unwrap();

    script.wait_for_opens(3).await;
    cancel.cancel();
    let report = handle.await.unwrap();

    assert_eq!(
        script.open_gaps(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert_eq!(report.reconnects, 1);
    assert_eq!(report.reconnect_attempts, 0);
    // Read failure, failed subscribe, cancellation
    assert_eq!(script.closes.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn end_to_end_reconnect_preserves_order() {
    let script = Script::new(vec![
        accept(vec![depth(1), depth(2), Read::Fail]),
        accept(vec![depth(3)]),
    ]);
    let cancel = CancellationToken::new();

    let (mut updates, handle) = DepthStreamClient::spawn(
        config(Duration::from_secs(5), 5),
        transport(&script),
        cancel.clone(),
    )
    .await
    .unwrap();

    let mut received = Vec::new();
    for _ in 0..3 {
        received.push(updates.recv().await.unwrap().update_id);
    }
    cancel.cancel();
    let report = handle.await.unwrap();

    assert_eq!(received, vec![1, 2, 3]);
    assert_eq!(report.backoff_waits, 1);
    assert_eq!(report.reconnects, 1);
    assert_eq!(report.reconnect_attempts, 0);
    assert_eq!(report.updates_delivered, 3);
    assert_eq!(*script.subscribes.lock().unwrap(), vec![SUBSCRIBE; 2]);
}

#[tokio::test]
async fn spawn_fails_hard_when_first_connect_fails() {
    let script = Script::new(vec![Dial::Refuse]);

    let err = DepthStreamClient::spawn(
        config(Duration::from_secs(5), 5),
        transport(&script),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DepthStreamError::Connect(TransportError::Connect(_))));
    assert_eq!(script.open_count(), 1);
}

#[tokio::test]
async fn spawn_fails_hard_when_first_subscribe_fails() {
    let script = Script::new(vec![Dial::Accept {
        reads: vec![],
        fail_subscribe: true,
    }]);

    let err = DepthStreamClient::spawn(
        config(Duration::from_secs(5), 5),
        transport(&script),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DepthStreamError::Subscribe(TransportError::Write(_))));
    assert_eq!(script.closes.load(Ordering::SeqCst), 1);
}
