//! Diagnostic events emitted by monitors.
//!
//! Notifications only report artists going live. Everything else a monitor
//! goes through (disconnects, failed spawns, ended sessions) is published here
//! for consumers that opt in by subscribing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default capacity of the event broadcast channel.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Events emitted by an artist monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// The probe produced data: the artist is live.
    Live {
        name: String,
        timestamp: DateTime<Utc>,
    },
    /// The probe ended without producing data. Will reconnect.
    Disconnected {
        name: String,
        reason: String,
        consecutive_failures: u32,
        retry_in_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// The probe process could not be started. Will retry.
    SpawnFailed {
        name: String,
        error: String,
        consecutive_failures: u32,
        retry_in_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A live session ended.
    Offline {
        name: String,
        timestamp: DateTime<Utc>,
    },
    /// The monitor's polling loop exited.
    Stopped {
        name: String,
        timestamp: DateTime<Utc>,
    },
}

impl MonitorEvent {
    /// Name of the artist the event is about.
    pub fn name(&self) -> &str {
        match self {
            MonitorEvent::Live { name, .. }
            | MonitorEvent::Disconnected { name, .. }
            | MonitorEvent::SpawnFailed { name, .. }
            | MonitorEvent::Offline { name, .. }
            | MonitorEvent::Stopped { name, .. } => name,
        }
    }

    /// Get a human-readable description of the event.
    pub fn description(&self) -> String {
        match self {
            MonitorEvent::Live { name, .. } => format!("{} is live", name),
            MonitorEvent::Disconnected {
                name,
                reason,
                consecutive_failures,
                retry_in_ms,
                ..
            } => format!(
                "{}: disconnected ({}), attempt {}, retrying in {} ms",
                name, reason, consecutive_failures, retry_in_ms
            ),
            MonitorEvent::SpawnFailed {
                name,
                error,
                consecutive_failures,
                retry_in_ms,
                ..
            } => format!(
                "{}: probe failed to start ({}), attempt {}, retrying in {} ms",
                name, error, consecutive_failures, retry_in_ms
            ),
            MonitorEvent::Offline { name, .. } => format!("{} went offline", name),
            MonitorEvent::Stopped { name, .. } => format!("{}: monitor stopped", name),
        }
    }

    /// Whether the event signals a problem worth surfacing to a user.
    pub fn is_failure(&self) -> bool {
        match self {
            MonitorEvent::SpawnFailed { .. } => true,
            // Disconnects are normal churn while an artist is offline.
            MonitorEvent::Disconnected { .. } => false,
            MonitorEvent::Live { .. }
            | MonitorEvent::Offline { .. }
            | MonitorEvent::Stopped { .. } => false,
        }
    }
}

/// Broadcaster for monitor events.
#[derive(Debug, Clone)]
pub struct MonitorEventBroadcaster {
    sender: broadcast::Sender<MonitorEvent>,
}

impl MonitorEventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Events are dropped when nobody is subscribed.
    pub fn publish(&self, event: MonitorEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MonitorEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
