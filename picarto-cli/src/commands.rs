use crate::{config::AppConfig, error::Result, output::OutputManager};
use picarto_watch::{MonitorEvent, NotificationHub, Probe, ProcessProbe, check_live};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct CommandExecutor {
    config: AppConfig,
    output: OutputManager,
}

impl CommandExecutor {
    pub fn new(config: AppConfig, output: OutputManager) -> Self {
        Self { config, output }
    }

    fn probe(&self) -> Result<Arc<dyn Probe>> {
        Ok(Arc::new(ProcessProbe::new(self.config.probe.clone())?))
    }

    /// Check a single artist. Returns whether the artist is live.
    pub async fn check(&self, artist: &str, timeout_secs: Option<u64>) -> Result<bool> {
        let deadline = timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.config.check_timeout());

        if !self.output.is_json() {
            println!("{}", self.output.format_check_started(artist));
        }

        let result = check_live(self.probe()?, artist, self.config.monitor, deadline).await?;
        println!(
            "{}",
            self.output.format_check_result(artist, result.as_ref())?
        );
        Ok(result.is_some())
    }

    /// Watch artists until interrupted.
    pub async fn watch(&self, artists: &[String], show_events: bool) -> Result<()> {
        let mut hub = NotificationHub::with_config(self.probe()?, self.config.monitor);
        let mut events = hub.subscribe_events();

        for artist in artists {
            if let Err(e) = hub.add(artist.as_str()) {
                hub.shutdown().await;
                return Err(e.into());
            }
        }
        info!("Watching {} artists", hub.len());

        let cancel = CancellationToken::new();
        let mut merged = hub.merge(cancel.clone());
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut events_open = show_events;

        loop {
            tokio::select! {
                signal = &mut ctrl_c, if !cancel.is_cancelled() => {
                    if let Err(e) = signal {
                        warn!("Failed to listen for Ctrl-C: {}", e);
                    }
                    info!("Interrupted, shutting down");
                    cancel.cancel();
                }
                next = merged.recv() => match next {
                    Some(notification) => {
                        println!("{}", self.output.format_notification(&notification)?);
                    }
                    None => break,
                },
                event = events.recv(), if events_open => match event {
                    // Live events are already printed as notifications.
                    Ok(MonitorEvent::Live { .. }) => {}
                    Ok(event) => println!("{}", self.output.format_event(&event)?),
                    Err(RecvError::Lagged(skipped)) => warn!("Skipped {} monitor events", skipped),
                    Err(RecvError::Closed) => events_open = false,
                },
            }
        }

        hub.shutdown().await;
        Ok(())
    }
}
