//! Hub owning a dynamic set of artist monitors.
//!
//! The hub maps artist names to running [`ArtistMonitor`]s and can merge all
//! of their notification channels into one output stream.
//!
//! Mutating operations take `&mut self`; share a hub between tasks by wrapping
//! it in a lock.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::MonitorConfig;
use crate::events::{MonitorEvent, MonitorEventBroadcaster};
use crate::monitor::ArtistMonitor;
use crate::notification::{ArtistNotification, HANDOFF_CAPACITY};
use crate::probe::Probe;
use crate::{Error, Result};

/// A set of monitored artists, keyed by name.
pub struct NotificationHub {
    probe: Arc<dyn Probe>,
    config: MonitorConfig,
    monitors: HashMap<String, Arc<ArtistMonitor>>,
    events: MonitorEventBroadcaster,
}

impl NotificationHub {
    /// Create an empty hub whose monitors use the default configuration.
    pub fn new(probe: Arc<dyn Probe>) -> Self {
        Self::with_config(probe, MonitorConfig::default())
    }

    pub fn with_config(probe: Arc<dyn Probe>, config: MonitorConfig) -> Self {
        Self {
            probe,
            config,
            monitors: HashMap::new(),
            events: MonitorEventBroadcaster::new(),
        }
    }

    /// Start monitoring an artist.
    ///
    /// The hub is left unchanged if the probe is unavailable or the artist is
    /// already tracked.
    pub fn add(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.monitors.contains_key(&name) {
            return Err(Error::AlreadyTracked(name));
        }

        let monitor = ArtistMonitor::with_events(
            name.clone(),
            Arc::clone(&self.probe),
            self.config,
            self.events.clone(),
        );
        monitor.start()?;

        info!("Added artist {}", name);
        self.monitors.insert(name, Arc::new(monitor));
        Ok(())
    }

    /// Stop monitoring an artist.
    ///
    /// The monitor is stopped first, so its polling loop can no longer produce
    /// notifications, then its channel is closed, then it is forgotten.
    pub async fn remove(&mut self, name: &str) -> Result<()> {
        let monitor = self
            .monitors
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(name))?;

        monitor.stop().await;
        monitor.close();
        self.monitors.remove(name);

        info!("Removed artist {}", name);
        Ok(())
    }

    /// Remove every artist.
    pub async fn shutdown(&mut self) {
        let names: Vec<String> = self.monitors.keys().cloned().collect();
        for name in names {
            // Names were just read from the map.
            let _ = self.remove(&name).await;
        }
        debug!("Hub shut down");
    }

    /// Merge the notifications of every artist tracked right now into one
    /// stream.
    ///
    /// One forwarder task per artist moves notifications to the shared
    /// output until its artist is removed, the output receiver is dropped, or
    /// `cancel` fires. The output closes once every forwarder has exited.
    ///
    /// The merge is a snapshot: artists added afterwards are not included, a
    /// new merge is needed to pick them up. Run only one merge at a time; a
    /// second concurrent merge waits for the first to release each channel.
    pub fn merge(&self, cancel: CancellationToken) -> mpsc::Receiver<ArtistNotification> {
        let (out_tx, out_rx) = mpsc::channel(HANDOFF_CAPACITY);
        let mut forwarders = JoinSet::new();

        for monitor in self.monitors.values() {
            let name = monitor.name().to_string();
            let source = monitor.channel().receiver();
            let out = out_tx.clone();
            let cancel = cancel.clone();
            forwarders.spawn(async move {
                let forwarded = forward(&name, source, out, cancel).await;
                (name, forwarded)
            });
        }
        // Forwarders hold the only senders: the output closes when the last one exits.
        drop(out_tx);

        let artists = forwarders.len();
        tokio::spawn(async move {
            while let Some(result) = forwarders.join_next().await {
                match result {
                    Ok((name, forwarded)) => {
                        debug!("Forwarder for {} exited after {} notifications", name, forwarded)
                    }
                    Err(e) => error!("Forwarder task failed: {}", e),
                }
            }
            debug!("Merge over {} artists closed", artists);
        });

        out_rx
    }

    pub fn contains(&self, name: &str) -> bool {
        self.monitors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Names of all tracked artists, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.monitors.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ArtistMonitor>> {
        self.monitors.get(name)
    }

    /// Diagnostic events from every monitor created by this hub.
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }
}

impl std::fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHub")
            .field("artists", &self.monitors.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

/// Copy notifications from one monitor's channel to the merged output.
///
/// Returns the number of notifications forwarded.
async fn forward(
    name: &str,
    source: Arc<tokio::sync::Mutex<mpsc::Receiver<ArtistNotification>>>,
    out: mpsc::Sender<ArtistNotification>,
    cancel: CancellationToken,
) -> usize {
    let mut source = tokio::select! {
        biased;
        _ = cancel.cancelled() => return 0,
        guard = source.lock_owned() => guard,
    };

    let mut forwarded = 0;
    loop {
        let notification = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = source.recv() => match next {
                Some(notification) => notification,
                None => {
                    debug!("Channel for {} closed", name);
                    break;
                }
            },
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = out.send(notification) => {
                if result.is_err() {
                    debug!("Merged output dropped, stopping forwarder for {}", name);
                    break;
                }
                forwarded += 1;
            }
        }
    }
    forwarded
}
