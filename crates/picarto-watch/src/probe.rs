//! Probe collaborator: something that connects to an artist's stream and
//! reports whether data is flowing.
//!
//! The monitor only depends on the [`Probe`] and [`ProbeSession`] traits.
//! [`ProcessProbe`] is the default implementation and runs an external
//! program (`rtmpdump` unless configured otherwise) against the artist's
//! stream endpoint, treating any byte on its stdout as proof of a live stream.

use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tracing::{debug, warn};

use crate::config::ProbeConfig;
use crate::{Error, Result};

/// Size of the buffer used to drain a live probe's output.
const DRAIN_BUFFER_SIZE: usize = 8192;

/// Factory for probe sessions.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Check that the probe mechanism can be used at all.
    ///
    /// Fails with [`Error::ProbeUnavailable`] when it cannot, e.g. because
    /// the external program is not installed.
    fn check_available(&self) -> Result<()>;

    /// Start probing an artist's stream.
    async fn spawn(&self, artist: &str) -> Result<Box<dyn ProbeSession>>;
}

/// A single running probe.
#[async_trait]
pub trait ProbeSession: Send {
    /// Wait until the probe produces its first byte.
    ///
    /// Returns [`Error::ProbeDisconnected`] if the stream ends or fails first.
    async fn wait_for_data(&mut self) -> Result<()>;

    /// Wait until a live stream ends.
    async fn wait_for_end(&mut self);

    /// Force the probe to stop and reap it. Safe to call more than once and
    /// after the probe has already exited.
    async fn terminate(&mut self);
}

/// Probe backed by an external process.
#[derive(Debug, Clone)]
pub struct ProcessProbe {
    config: ProbeConfig,
    /// Why the program cannot be run, detected once at construction.
    unavailable: Option<String>,
}

impl ProcessProbe {
    /// Create a probe, validating its configuration and checking once that
    /// the program can be run.
    ///
    /// A missing program is not an error here; it is reported by
    /// [`Probe::check_available`].
    pub fn new(config: ProbeConfig) -> Result<Self> {
        config.validate()?;
        let unavailable = Self::detect(&config.program);
        match &unavailable {
            Some(reason) => warn!("Probe program unusable: {}", reason),
            None => debug!("Probe program {} is available", config.program),
        }
        Ok(Self {
            config,
            unavailable,
        })
    }

    fn detect(program: &str) -> Option<String> {
        process_utils::probe_program(program)
            .err()
            .map(|e| match e.kind() {
                io::ErrorKind::NotFound => format!("{} not installed", program),
                _ => format!("cannot run {}: {}", program, e),
            })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }
}

#[async_trait]
impl Probe for ProcessProbe {
    fn check_available(&self) -> Result<()> {
        match &self.unavailable {
            Some(reason) => Err(Error::unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    async fn spawn(&self, artist: &str) -> Result<Box<dyn ProbeSession>> {
        let args = self.config.args_for(artist);
        debug!("Starting {} for {} with args: {:?}", self.config.program, artist, args);

        let mut command = process_utils::tokio_command(&self.config.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = command.spawn().map_err(Error::ProbeSpawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ProbeSpawn(io::Error::other("probe stdout not captured")))?;

        if let Some(stderr) = child.stderr.take() {
            let artist = artist.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[{}] {}", artist, line);
                }
            });
        }

        Ok(Box::new(ProcessSession {
            artist: artist.to_string(),
            child,
            stdout,
            kill_timeout: self.config.kill_timeout(),
        }))
    }
}

/// Session over a spawned probe process.
struct ProcessSession {
    artist: String,
    child: Child,
    stdout: ChildStdout,
    kill_timeout: Duration,
}

#[async_trait]
impl ProbeSession for ProcessSession {
    async fn wait_for_data(&mut self) -> Result<()> {
        let mut buf = [0u8; 1];
        match self.stdout.read(&mut buf).await {
            Ok(0) => Err(Error::disconnected("EOF")),
            Ok(_) => Ok(()),
            Err(e) => Err(Error::disconnected(e.to_string())),
        }
    }

    async fn wait_for_end(&mut self) {
        let mut buf = [0u8; DRAIN_BUFFER_SIZE];
        loop {
            match self.stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!("Probe output for {} failed: {}", self.artist, e);
                    break;
                }
            }
        }
    }

    async fn terminate(&mut self) {
        match process_utils::terminate(&mut self.child, self.kill_timeout).await {
            Some(status) => debug!("Probe for {} exited: {}", self.artist, status),
            None => warn!(
                "Probe for {} was not reaped within {:?}",
                self.artist, self.kill_timeout
            ),
        }
    }
}
