//! Delivery Channel
//!
//! Bounded, lossy hand-off from the stream session to one consumer.
//!
//! The producer side never waits: [`DeliverySender::offer`] either enqueues
//! the update or drops it on the spot. A slow consumer loses updates instead
//! of stalling the read loop, which would otherwise delay failure detection
//! and backoff timing.
//!
//! # Capacity
//!
//! - `capacity > 0`: up to `capacity` updates are buffered.
//! - `capacity == 0`: strict hand-off. An update is accepted only while the
//!   consumer is parked in [`DeliveryReceiver::recv`]; nothing is buffered
//!   ahead of demand. If a pending `recv` is dropped (e.g. it lost a
//!   `select!`) after an update was handed to it, that update is taken back
//!   and counted as dropped rather than left waiting for the next call.
//!
//! Dropping (or calling [`DeliverySender::close`] on) the sender closes the
//! channel; the receiver then drains what is left and yields `None`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

use crate::domain::order_book::OrderBookUpdate;

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 16;

/// Outcome of a non-blocking offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// The update was handed to the consumer side.
    Delivered,
    /// The update was discarded.
    Dropped,
}

impl Offer {
    /// True for [`Offer::Delivered`].
    #[must_use]
    pub const fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

#[derive(Debug, Default)]
struct Shared {
    waiting: AtomicUsize,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Create a delivery channel with the given capacity.
#[must_use]
pub fn channel(capacity: usize) -> (DeliverySender, DeliveryReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let shared = Arc::new(Shared::default());

    (
        DeliverySender {
            tx,
            shared: Arc::clone(&shared),
            capacity,
        },
        DeliveryReceiver {
            rx,
            shared,
            capacity,
        },
    )
}

/// Producer half, owned by the stream session.
#[derive(Debug)]
pub struct DeliverySender {
    tx: mpsc::Sender<OrderBookUpdate>,
    shared: Arc<Shared>,
    capacity: usize,
}

impl DeliverySender {
    /// Try to hand an update to the consumer without waiting.
    pub fn offer(&self, update: OrderBookUpdate) -> Offer {
        if self.capacity == 0 && !self.has_waiting_consumer() {
            return self.discard(&update, "no consumer waiting");
        }

        match self.tx.try_send(update) {
            Ok(()) => {
                self.shared.delivered.fetch_add(1, Ordering::Relaxed);
                Offer::Delivered
            }
            Err(TrySendError::Full(update)) => self.discard(&update, "channel full"),
            Err(TrySendError::Closed(update)) => self.discard(&update, "consumer gone"),
        }
    }

    fn discard(&self, update: &OrderBookUpdate, reason: &'static str) -> Offer {
        self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            reason,
            symbol = %update.symbol,
            update_id = update.update_id,
            "No receiver for update, discarding"
        );
        Offer::Dropped
    }

    /// Configured capacity (0 = strict hand-off).
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// True while a consumer is parked in `recv`.
    #[must_use]
    pub fn has_waiting_consumer(&self) -> bool {
        self.shared.waiting.load(Ordering::SeqCst) > 0
    }

    /// True once the receiver has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Number of updates accepted so far.
    #[must_use]
    pub fn delivered_count(&self) -> u64 {
        self.shared.delivered.load(Ordering::Relaxed)
    }

    /// Number of updates discarded so far.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Close the channel. The consumer sees `None` after draining.
    pub fn close(self) {
        tracing::debug!(
            delivered = self.delivered_count(),
            dropped = self.dropped_count(),
            "Delivery channel closed"
        );
    }
}

/// Consumer half.
#[derive(Debug)]
pub struct DeliveryReceiver {
    rx: mpsc::Receiver<OrderBookUpdate>,
    shared: Arc<Shared>,
    capacity: usize,
}

impl DeliveryReceiver {
    /// Wait for the next update.
    ///
    /// Returns `None` once the sender is closed and the buffer is drained.
    ///
    /// Cancel safe for buffered channels. With capacity 0, an update handed
    /// to a `recv` that is dropped before it completes is counted as dropped,
    /// so avoid racing `recv` against other branches in `select!` there.
    pub async fn recv(&mut self) -> Option<OrderBookUpdate> {
        let mut guard = WaitingGuard::enter(&self.shared, &mut self.rx, self.capacity == 0);
        let update = guard.rx.recv().await;
        guard.completed = true;
        update
    }

    /// Take a buffered update without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`TryRecvError::Empty`] if nothing is buffered, or
    /// [`TryRecvError::Disconnected`] once the sender is closed and drained.
    pub fn try_recv(&mut self) -> Result<OrderBookUpdate, TryRecvError> {
        self.rx.try_recv()
    }

    /// Number of buffered updates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// True if no update is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Write each update as one JSON line until the channel closes.
///
/// Returns the number of lines written. The writer is flushed after every
/// line and no lock is held while waiting for the next update.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub async fn write_json_lines<W>(
    receiver: &mut DeliveryReceiver,
    out: &mut W,
) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while let Some(update) = receiver.recv().await {
        let mut line = serde_json::to_vec(&update)?;
        line.push(b'\n');
        out.write_all(&line).await?;
        out.flush().await?;
        written += 1;
    }
    Ok(written)
}

/// Marks the consumer as parked for as long as a `recv` call is pending.
///
/// In hand-off mode, a guard dropped before its `recv` completed reclaims
/// whatever was handed over in the meantime.
struct WaitingGuard<'a> {
    shared: &'a Shared,
    rx: &'a mut mpsc::Receiver<OrderBookUpdate>,
    hand_off: bool,
    completed: bool,
}

impl<'a> WaitingGuard<'a> {
    fn enter(
        shared: &'a Shared,
        rx: &'a mut mpsc::Receiver<OrderBookUpdate>,
        hand_off: bool,
    ) -> Self {
        shared.waiting.fetch_add(1, Ordering::SeqCst);
        Self {
            shared,
            rx,
            hand_off,
            completed: false,
        }
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.shared.waiting.fetch_sub(1, Ordering::SeqCst);

        if !self.hand_off || self.completed {
            return;
        }
        while let Ok(update) = self.rx.try_recv() {
            self.shared.delivered.fetch_sub(1, Ordering::Relaxed);
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                symbol = %update.symbol,
                update_id = update.update_id,
                "Consumer stopped waiting, discarding handed-off update"
            );
        }
    }
}
