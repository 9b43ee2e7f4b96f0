//! Live-stream watcher for Picarto artists.
//!
//! An [`ArtistMonitor`] keeps an external probe pointed at one artist's stream
//! endpoint, restarts it whenever it drops, and emits an [`ArtistNotification`]
//! each time the artist goes live. A [`NotificationHub`] owns any number of
//! monitors and merges their notifications into a single closable stream.
//!
//! The probe itself is a collaborator behind the [`Probe`] trait; the default
//! [`ProcessProbe`] wraps `rtmpdump`.

pub mod check;
pub mod config;
pub mod error;
pub mod events;
pub mod hub;
pub mod monitor;
pub mod notification;
pub mod probe;

pub use check::{DEFAULT_CHECK_TIMEOUT, check_live};
pub use config::{MonitorConfig, ProbeConfig, ReconnectPolicy};
pub use error::{Error, Result};
pub use events::{MonitorEvent, MonitorEventBroadcaster};
pub use hub::NotificationHub;
pub use monitor::ArtistMonitor;
pub use notification::{ArtistNotification, NotificationChannel};
pub use probe::{ProcessProbe, Probe, ProbeSession};
