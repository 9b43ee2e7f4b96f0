//! Monitor and probe configuration.
//!
//! Durations are stored as integer milliseconds so the types round-trip
//! through TOML cleanly; use the accessor methods to get a [`Duration`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default pause after a live session ends before probing again.
pub const DEFAULT_QUIESCENCE_INTERVAL_MS: u64 = 2_000;

/// Default delay before reconnecting after a disconnect or spawn failure.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2_000;

/// Default probe binary.
pub const DEFAULT_PROBE_PROGRAM: &str = "rtmpdump";

/// Default Picarto RTMP endpoint; `{artist}` is replaced by the artist name.
pub const DEFAULT_ENDPOINT: &str = "rtmp://167.114.157.137:1935/golive/?/{artist}";

/// Default time allowed for a killed probe to be reaped.
pub const DEFAULT_KILL_TIMEOUT_MS: u64 = 2_000;

/// Maximum exponent to prevent overflow.
const MAX_EXPONENT: u32 = 10;

/// Delay policy applied after consecutive probe failures.
///
/// The delay for the n-th consecutive failure is `base * 2^(n-1)`, capped at
/// `max`. With `max == base` the delay is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            max_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that always waits `delay`.
    pub fn fixed(delay: Duration) -> Self {
        let ms = duration_ms(delay);
        Self {
            base_delay_ms: ms,
            max_delay_ms: ms,
        }
    }

    /// Exponential backoff from `base` up to `max`.
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self {
            base_delay_ms: duration_ms(base),
            max_delay_ms: duration_ms(max),
        }
    }

    /// Delay to wait after `consecutive_failures` failures in a row.
    pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }
        let exponent = (consecutive_failures - 1).min(MAX_EXPONENT);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms.max(self.base_delay_ms)))
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Per-monitor timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Pause after a live session ends, to avoid hot-looping on flapping probes.
    pub quiescence_interval_ms: u64,
    pub reconnect: ReconnectPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            quiescence_interval_ms: DEFAULT_QUIESCENCE_INTERVAL_MS,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl MonitorConfig {
    pub fn quiescence_interval(&self) -> Duration {
        Duration::from_millis(self.quiescence_interval_ms)
    }

    pub fn with_quiescence_interval(mut self, interval: Duration) -> Self {
        self.quiescence_interval_ms = duration_ms(interval);
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

/// Configuration for the process-backed probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Program to run.
    pub program: String,
    /// Stream endpoint template, `{artist}` is substituted.
    pub endpoint: String,
    /// Argument templates, `{url}` and `{artist}` are substituted.
    pub args: Vec<String>,
    pub kill_timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROBE_PROGRAM.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            args: vec!["-r".to_string(), "{url}".to_string()],
            kill_timeout_ms: DEFAULT_KILL_TIMEOUT_MS,
        }
    }
}

impl ProbeConfig {
    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }

    /// Stream URL for an artist.
    pub fn endpoint_for(&self, artist: &str) -> String {
        self.endpoint.replace("{artist}", artist)
    }

    /// Full argument list for probing an artist.
    pub fn args_for(&self, artist: &str) -> Vec<String> {
        let url = self.endpoint_for(artist);
        self.args
            .iter()
            .map(|arg| arg.replace("{url}", &url).replace("{artist}", artist))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(Error::config("probe program must not be empty"));
        }
        if !self.endpoint.contains("{artist}")
            && !self.args.iter().any(|arg| arg.contains("{artist}"))
        {
            return Err(Error::config(
                "either the endpoint or the probe arguments must contain {artist}",
            ));
        }
        Ok(())
    }
}
