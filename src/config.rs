//! Recorder settings store.
//!
//! YAML settings file with sensible defaults. A missing file is initialized
//! with defaults; an unparseable file is backed up to `<name>.bak` and
//! replaced with defaults rather than stopping the client.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::SessionConfig;
use crate::{CaptureError, Result};

/// Persistent recorder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Radio server address for the control connection.
    pub server_ip: String,
    /// Radio server port.
    pub server_port: u16,
    /// Default destination for recording sessions.
    pub recording_file: PathBuf,
    /// Session audio sample rate in Hz.
    pub sample_rate: u32,
    /// Session audio channel count.
    pub channels: u16,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            server_ip: "127.0.0.1".to_string(),
            server_port: 5002,
            recording_file: PathBuf::from("recorded_audio.vxl"),
            sample_rate: 48_000,
            channels: 1,
        }
    }
}

impl RecorderConfig {
    /// Load settings from `path`.
    ///
    /// A missing file is created with defaults. A corrupt file is copied to
    /// `<path>.bak` and rewritten with defaults; the defaults are returned.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("no recorder config at {}, writing defaults", path.display());
                let config = Self::default();
                config.save(path)?;
                return Ok(config);
            }
            Err(err) => return Err(CaptureError::io_error(path, err)),
        };

        match serde_yaml_ng::from_str(&raw) {
            Ok(config) => Ok(config),
            Err(err) => {
                warn!("recorder config at {} is corrupt ({err}), resetting", path.display());
                let backup = backup_path(path);
                if let Err(copy_err) = std::fs::copy(path, &backup) {
                    warn!("failed to back up corrupt config to {}: {copy_err}", backup.display());
                }
                let config = Self::default();
                config.save(path)?;
                Ok(config)
            }
        }
    }

    /// Write settings to `path` as YAML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml_ng::to_string(self).map_err(|err| CaptureError::Config {
            path: path.to_path_buf(),
            details: format!("failed to serialize settings: {err}"),
        })?;
        std::fs::write(path, yaml).map_err(|err| CaptureError::io_error(path, err))
    }

    /// Session constants derived from these settings.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig { sample_rate: self.sample_rate, channels: self.channels }
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    path.with_file_name(name)
}
