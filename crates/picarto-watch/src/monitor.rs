//! Supervision of a single artist.
//!
//! An [`ArtistMonitor`] runs a polling task that keeps a probe attached to the
//! artist's stream:
//!
//! 1. spawn a probe (transient failures are retried with the reconnect
//!    policy, any other error ends the loop);
//! 2. wait for its first byte, or for it to disconnect;
//! 3. on disconnect, reap it, wait the reconnect delay and start over;
//! 4. on data, emit one [`ArtistNotification`], then hold the probe until the
//!    stream ends and wait the quiescence interval before starting over.
//!
//! Every wait in the loop also watches the monitor's stop token, so
//! [`ArtistMonitor::stop`] interrupts it wherever it is. The loop reaps the
//! active probe before it exits, and `stop` waits for that.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{MonitorConfig, duration_ms};
use crate::events::{MonitorEvent, MonitorEventBroadcaster};
use crate::notification::{ArtistNotification, NotificationChannel};
use crate::probe::Probe;
use crate::{Error, Result};

/// Ongoing supervision of one named artist.
///
/// A monitor is single-use: once stopped it cannot be started again.
pub struct ArtistMonitor {
    name: String,
    probe: Arc<dyn Probe>,
    config: MonitorConfig,
    channel: Arc<NotificationChannel>,
    events: MonitorEventBroadcaster,
    /// Stop requested. Never reset.
    stop: CancellationToken,
    /// Cancelled by the polling task when it exits.
    finished: CancellationToken,
    started: AtomicBool,
}

impl ArtistMonitor {
    /// Create a monitor with the default configuration. It does not poll
    /// until [`start`](Self::start) is called.
    pub fn new(name: impl Into<String>, probe: Arc<dyn Probe>) -> Self {
        Self::with_config(name, probe, MonitorConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        probe: Arc<dyn Probe>,
        config: MonitorConfig,
    ) -> Self {
        Self::with_events(name, probe, config, MonitorEventBroadcaster::new())
    }

    /// Create a monitor publishing its events on a shared broadcaster.
    pub fn with_events(
        name: impl Into<String>,
        probe: Arc<dyn Probe>,
        config: MonitorConfig,
        events: MonitorEventBroadcaster,
    ) -> Self {
        Self {
            name: name.into(),
            probe,
            config,
            channel: Arc::new(NotificationChannel::new()),
            events,
            stop: CancellationToken::new(),
            finished: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Start the polling task.
    ///
    /// Fails without starting anything if the probe is unavailable, if the
    /// monitor is already running, or if it has been stopped.
    pub fn start(&self) -> Result<()> {
        if self.stop.is_cancelled() {
            return Err(Error::MonitorStopped(self.name.clone()));
        }
        if self.started.load(Ordering::Acquire) {
            return Err(Error::AlreadyStarted(self.name.clone()));
        }

        self.probe.check_available()?;

        if self.started.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyStarted(self.name.clone()));
        }
        // A stop that landed during the availability check wins. `stop` may
        // already be waiting on `finished`, which no task will cancel now.
        if self.stop.is_cancelled() {
            self.finished.cancel();
            return Err(Error::MonitorStopped(self.name.clone()));
        }

        let poller = Poller {
            name: self.name.clone(),
            probe: Arc::clone(&self.probe),
            config: self.config,
            channel: Arc::clone(&self.channel),
            events: self.events.clone(),
            stop: self.stop.clone(),
            finished: self.finished.clone(),
        };
        tokio::spawn(poller.run());

        info!("Started monitoring {}", self.name);
        Ok(())
    }

    /// Stop polling and wait until the active probe has been reaped.
    ///
    /// Idempotent. Does not close the notification channel.
    pub async fn stop(&self) {
        if !self.stop.is_cancelled() {
            debug!("Stop requested for {}", self.name);
            self.stop.cancel();
        }
        if self.started.load(Ordering::Acquire) {
            self.finished.cancelled().await;
        }
    }

    /// Whether the polling task is currently running.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.finished.is_cancelled()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Close the notification channel. Returns `true` on the first call.
    pub fn close(&self) -> bool {
        self.channel.close()
    }

    /// Receive the next notification, or `None` once the channel is closed
    /// and drained.
    pub async fn recv(&self) -> Option<ArtistNotification> {
        self.channel.recv().await
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub(crate) fn channel(&self) -> &NotificationChannel {
        &self.channel
    }
}

impl std::fmt::Display for ArtistMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl std::fmt::Debug for ArtistMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtistMonitor")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl Drop for ArtistMonitor {
    fn drop(&mut self) {
        self.stop.cancel();
        self.channel.close();
    }
}

/// State owned by the polling task.
struct Poller {
    name: String,
    probe: Arc<dyn Probe>,
    config: MonitorConfig,
    channel: Arc<NotificationChannel>,
    events: MonitorEventBroadcaster,
    stop: CancellationToken,
    finished: CancellationToken,
}

impl Poller {
    async fn run(self) {
        // Signals `stop()` even if the loop panics.
        let _finished = self.finished.clone().drop_guard();
        let mut failures: u32 = 0;

        while !self.stop.is_cancelled() {
            let mut session = match self.probe.spawn(&self.name).await {
                Ok(session) => session,
                Err(e) if !e.is_transient() => {
                    error!("Giving up on {}: {}", self.name, e);
                    self.events.publish(MonitorEvent::SpawnFailed {
                        name: self.name.clone(),
                        error: e.to_string(),
                        consecutive_failures: failures.saturating_add(1),
                        retry_in_ms: 0,
                        timestamp: Utc::now(),
                    });
                    break;
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = self.config.reconnect.delay_for(failures);
                    warn!(
                        "Failed to start probe for {} (attempt {}): {}; retrying in {:?}",
                        self.name, failures, e, delay
                    );
                    self.events.publish(MonitorEvent::SpawnFailed {
                        name: self.name.clone(),
                        error: e.to_string(),
                        consecutive_failures: failures,
                        retry_in_ms: duration_ms(delay),
                        timestamp: Utc::now(),
                    });
                    if !self.pause(delay).await {
                        break;
                    }
                    continue;
                }
            };

            let outcome = tokio::select! {
                biased;
                _ = self.stop.cancelled() => None,
                result = session.wait_for_data() => Some(result),
            };

            match outcome {
                None => {
                    session.terminate().await;
                    break;
                }
                Some(Err(e)) if !e.is_transient() => {
                    session.terminate().await;
                    error!("Giving up on {}: {}", self.name, e);
                    break;
                }
                Some(Err(e)) => {
                    session.terminate().await;
                    failures = failures.saturating_add(1);
                    let delay = self.config.reconnect.delay_for(failures);
                    debug!(
                        "{}: {} (attempt {}), reconnecting in {:?}",
                        self.name, e, failures, delay
                    );
                    self.events.publish(MonitorEvent::Disconnected {
                        name: self.name.clone(),
                        reason: e.to_string(),
                        consecutive_failures: failures,
                        retry_in_ms: duration_ms(delay),
                        timestamp: Utc::now(),
                    });
                    if !self.pause(delay).await {
                        break;
                    }
                    continue;
                }
                Some(Ok(())) => {}
            }

            // A stop that raced the first byte wins: no notification.
            if self.stop.is_cancelled() {
                session.terminate().await;
                break;
            }

            failures = 0;
            let notification = ArtistNotification::now(&self.name);
            info!("{} is live", self.name);
            self.events.publish(MonitorEvent::Live {
                name: self.name.clone(),
                timestamp: notification.observed_at,
            });
            if !self.channel.deliver(notification) {
                debug!("Notification channel for {} is closed", self.name);
            }

            let stopped = tokio::select! {
                biased;
                _ = self.stop.cancelled() => true,
                _ = session.wait_for_end() => false,
            };
            session.terminate().await;
            if stopped {
                break;
            }

            info!("{} went offline", self.name);
            self.events.publish(MonitorEvent::Offline {
                name: self.name.clone(),
                timestamp: Utc::now(),
            });
            if !self.pause(self.config.quiescence_interval()).await {
                break;
            }
        }

        debug!("Polling loop for {} exited", self.name);
        self.events.publish(MonitorEvent::Stopped {
            name: self.name.clone(),
            timestamp: Utc::now(),
        });
    }

    /// Sleep unless stopped first. Returns `false` if stopped.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeSession;
    use async_trait::async_trait;

    struct MissingProbe;

    #[async_trait]
    impl Probe for MissingProbe {
        fn check_available(&self) -> Result<()> {
            Err(Error::unavailable("rtmpdump not installed"))
        }

        async fn spawn(&self, _artist: &str) -> Result<Box<dyn ProbeSession>> {
            unreachable!("spawn must not be called when unavailable")
        }
    }

    /// Probe whose sessions never produce data.
    struct SilentProbe;

    struct SilentSession;

    #[async_trait]
    impl Probe for SilentProbe {
        fn check_available(&self) -> Result<()> {
            Ok(())
        }

        async fn spawn(&self, _artist: &str) -> Result<Box<dyn ProbeSession>> {
            Ok(Box::new(SilentSession))
        }
    }

    #[async_trait]
    impl ProbeSession for SilentSession {
        async fn wait_for_data(&mut self) -> Result<()> {
            std::future::pending().await
        }

        async fn wait_for_end(&mut self) {
            std::future::pending().await
        }

        async fn terminate(&mut self) {}
    }

    /// Probe whose availability check blocks for a while.
    struct SlowCheckProbe(Duration);

    #[async_trait]
    impl Probe for SlowCheckProbe {
        fn check_available(&self) -> Result<()> {
            std::thread::sleep(self.0);
            Ok(())
        }

        async fn spawn(&self, _artist: &str) -> Result<Box<dyn ProbeSession>> {
            Ok(Box::new(SilentSession))
        }
    }

    /// Probe that passes the availability check but refuses every spawn.
    struct RevokedProbe;

    #[async_trait]
    impl Probe for RevokedProbe {
        fn check_available(&self) -> Result<()> {
            Ok(())
        }

        async fn spawn(&self, _artist: &str) -> Result<Box<dyn ProbeSession>> {
            Err(Error::unavailable("rtmpdump removed"))
        }
    }

    #[tokio::test]
    async fn test_start_fails_when_probe_unavailable() {
        let monitor = ArtistMonitor::new("alice", Arc::new(MissingProbe));
        let result = monitor.start();
        assert!(matches!(result, Err(Error::ProbeUnavailable(_))));
        assert!(!monitor.is_running());

        // Nothing was started, so stop returns immediately.
        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let monitor = ArtistMonitor::new("alice", Arc::new(SilentProbe));
        monitor.start().unwrap();
        assert!(monitor.is_running());
        assert!(matches!(monitor.start(), Err(Error::AlreadyStarted(_))));
        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_final() {
        let monitor = ArtistMonitor::new("alice", Arc::new(SilentProbe));
        monitor.start().unwrap();

        monitor.stop().await;
        monitor.stop().await;
        assert!(!monitor.is_running());
        assert!(monitor.is_stopped());
        assert!(matches!(monitor.start(), Err(Error::MonitorStopped(_))));
    }

    #[tokio::test]
    async fn test_stop_does_not_close_channel() {
        let monitor = ArtistMonitor::new("alice", Arc::new(SilentProbe));
        monitor.start().unwrap();
        monitor.stop().await;

        assert!(!monitor.channel().is_closed());
        assert!(monitor.close());
        assert!(monitor.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_during_start_wins() {
        let probe = SlowCheckProbe(Duration::from_millis(200));
        let monitor = Arc::new(ArtistMonitor::new("alice", Arc::new(probe)));

        let starter = Arc::clone(&monitor);
        let start = tokio::task::spawn_blocking(move || starter.start());
        tokio::time::sleep(Duration::from_millis(50)).await;
        monitor.stop().await;

        let result = start.await.unwrap();
        assert!(matches!(result, Err(Error::MonitorStopped(_))));
        assert!(!monitor.is_running());
        assert!(monitor.is_stopped());
        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_non_transient_spawn_error_ends_loop() {
        let monitor = ArtistMonitor::new("alice", Arc::new(RevokedProbe));
        let mut events = monitor.subscribe_events();
        monitor.start().unwrap();

        assert!(matches!(
            events.recv().await.unwrap(),
            MonitorEvent::SpawnFailed { retry_in_ms: 0, .. }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            MonitorEvent::Stopped { .. }
        ));
        // The loop exits on its own, without a stop request.
        tokio::time::timeout(Duration::from_secs(1), monitor.finished.cancelled())
            .await
            .unwrap();
        assert!(!monitor.is_running());
        assert!(!monitor.is_stopped());
    }

    #[test]
    fn test_display_is_name() {
        let monitor = ArtistMonitor::new("alice", Arc::new(SilentProbe));
        assert_eq!(monitor.to_string(), "alice");
    }
}
