use crate::error::{AppError, Result};
use picarto_watch::{DEFAULT_CHECK_TIMEOUT, MonitorConfig, ProbeConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const CONFIG_DIR_NAME: &str = "picarto";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Seconds `check` waits for a stream.
    pub check_timeout_secs: u64,
    pub probe: ProbeConfig,
    pub monitor: MonitorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            check_timeout_secs: DEFAULT_CHECK_TIMEOUT.as_secs(),
            probe: ProbeConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from the default location. A missing file at
    /// the default location yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !explicit && !path.exists() {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&content)?;
        config.probe.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write the defaults to `path` or the default location.
    pub fn reset(path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_path().ok_or(AppError::NoConfigDir)?,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, Self::default().show()?)?;
        Ok(path)
    }

    pub fn show(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }
}

fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "check_timeout_secs = 10\n\n[monitor.reconnect]\nmax_delay_ms = 60000\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.check_timeout(), Duration::from_secs(10));
        assert_eq!(config.monitor.reconnect.max_delay_ms, 60_000);
        assert_eq!(config.monitor.reconnect.base_delay_ms, 2_000);
        assert_eq!(config.probe, ProbeConfig::default());
    }

    #[test]
    fn test_reset_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let written = AppConfig::reset(Some(path.as_path())).unwrap();
        assert_eq!(written, path);
        assert_eq!(AppConfig::load(Some(path.as_path())).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load(Some(dir.path().join("missing.toml").as_path()));
        assert!(matches!(result, Err(AppError::Io(_))));
    }

    #[test]
    fn test_invalid_probe_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[probe]\nprogram = \"\"\n").unwrap();

        let result = AppConfig::load(Some(path.as_path()));
        assert!(matches!(
            result,
            Err(AppError::Watch(picarto_watch::Error::Configuration(_)))
        ));
    }
}
