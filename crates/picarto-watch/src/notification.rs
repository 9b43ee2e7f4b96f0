//! Notification values and the per-monitor notification channel.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Capacity of notification channels. Tokio channels cannot be unbuffered,
/// one slot is the closest equivalent to a direct handoff.
pub(crate) const HANDOFF_CAPACITY: usize = 1;

/// An artist was observed going live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistNotification {
    pub name: String,
    pub observed_at: DateTime<Utc>,
}

impl ArtistNotification {
    /// Create a notification observed now.
    pub fn now(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            observed_at: Utc::now(),
        }
    }
}

impl fmt::Display for ArtistNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is online ({})", self.name, self.observed_at.to_rfc3339())
    }
}

/// Channel carrying one monitor's notifications.
///
/// Producers never wait on consumers: [`deliver`](Self::deliver) hands each
/// notification to its own short-lived task. Those tasks are chained so that
/// notifications arrive in the order they were delivered. The channel is
/// closed exactly once through [`close`](Self::close), which also abandons
/// deliveries still waiting for a reader.
pub struct NotificationChannel {
    sender: Mutex<Option<mpsc::Sender<ArtistNotification>>>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<ArtistNotification>>>,
    /// Completion signal of the most recent delivery task.
    last_delivery: Mutex<Option<oneshot::Receiver<()>>>,
    closed: CancellationToken,
}

impl NotificationChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Arc::new(tokio::sync::Mutex::new(rx)),
            last_delivery: Mutex::new(None),
            closed: CancellationToken::new(),
        }
    }

    /// Hand a notification off for delivery without waiting for a reader.
    ///
    /// Returns `false` if the channel is already closed, in which case the
    /// notification is dropped.
    pub fn deliver(&self, notification: ArtistNotification) -> bool {
        let Some(tx) = self.sender.lock().clone() else {
            return false;
        };

        let (done_tx, done_rx) = oneshot::channel::<()>();
        let previous = self.last_delivery.lock().replace(done_rx);
        let closed = self.closed.clone();
        let name = notification.name.clone();

        tokio::spawn(async move {
            // Dropping `done_tx` at the end of this task releases the next delivery.
            let _done = done_tx;
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            tokio::select! {
                biased;
                _ = closed.cancelled() => {
                    debug!("Channel closed, dropping notification for {}", name);
                }
                result = tx.send(notification) => {
                    if result.is_err() {
                        debug!("Notification for {} not delivered: receiver gone", name);
                    }
                }
            }
        });

        true
    }

    /// Receive the next notification.
    ///
    /// Returns `None` once the channel is closed and drained.
    pub async fn recv(&self) -> Option<ArtistNotification> {
        self.receiver.lock().await.recv().await
    }

    /// Close the channel. Only the first call has an effect and returns `true`.
    pub fn close(&self) -> bool {
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return false;
        }
        self.closed.cancel();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Shared handle on the receiving end, used by merge forwarders.
    pub(crate) fn receiver(&self) -> Arc<tokio::sync::Mutex<mpsc::Receiver<ArtistNotification>>> {
        Arc::clone(&self.receiver)
    }
}

impl Default for NotificationChannel {
    fn default() -> Self {
        Self::new()
    }
}
