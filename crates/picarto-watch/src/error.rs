//! Error types for the watcher.

use thiserror::Error;

/// Watcher result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Watcher error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The probe mechanism cannot be used at all (e.g. the binary is missing).
    #[error("Probe unavailable: {0}")]
    ProbeUnavailable(String),

    /// A running probe ended before or after producing data.
    #[error("Probe disconnected: {0}")]
    ProbeDisconnected(String),

    /// The probe process could not be started.
    #[error("Failed to spawn probe: {0}")]
    ProbeSpawn(#[source] std::io::Error),

    #[error("Artist not found: {0}")]
    NotFound(String),

    #[error("Artist already tracked: {0}")]
    AlreadyTracked(String),

    #[error("Monitor for {0} already started")]
    AlreadyStarted(String),

    #[error("Monitor for {0} was stopped and cannot be restarted")]
    MonitorStopped(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ProbeUnavailable(msg.into())
    }

    pub fn disconnected(msg: impl Into<String>) -> Self {
        Self::ProbeDisconnected(msg.into())
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether the polling loop retries after this error. Any other error
    /// from a probe ends the loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ProbeDisconnected(_) | Self::ProbeSpawn(_))
    }
}
