//! One-off liveness check for a single artist.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::Result;
use crate::config::MonitorConfig;
use crate::monitor::ArtistMonitor;
use crate::notification::ArtistNotification;
use crate::probe::Probe;

/// Default time allowed for a check to observe a stream.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Check whether an artist is live.
///
/// Starts a monitor for `name` and races its first notification against
/// `deadline`. Returns the notification if the artist went live in time,
/// `None` otherwise. The monitor is stopped and closed before returning.
pub async fn check_live(
    probe: Arc<dyn Probe>,
    name: &str,
    config: MonitorConfig,
    deadline: Duration,
) -> Result<Option<ArtistNotification>> {
    let monitor = ArtistMonitor::with_config(name, probe, config);
    monitor.start()?;

    let result = tokio::select! {
        notification = monitor.recv() => notification,
        _ = tokio::time::sleep(deadline) => {
            debug!("No stream from {} within {:?}", name, deadline);
            None
        }
    };

    monitor.stop().await;
    monitor.close();
    Ok(result)
}
