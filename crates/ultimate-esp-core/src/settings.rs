//! Application settings
//!
//! Persisted as pretty-printed JSON, by default under the user's config
//! directory (`<config>/UltimateESP/settings.json`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::device::{HostSerial, SessionConfig, DEFAULT_BAUD_RATE};

/// Connection/communication settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionSettings {
    /// Serial port name; the first detected port when unset
    pub port: Option<String>,

    /// Baud rate
    pub baud_rate: u32,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Firmware catalog location (URL or path)
    pub catalog: String,

    /// Serial connection settings
    pub connection: ConnectionSettings,

    /// Forward engine console output to the log
    pub engine_log: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog: "firmware.json".to_string(),
            connection: ConnectionSettings::default(),
            engine_log: false,
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> io::Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "Could not find config directory")
        })?;
        Ok(base.join("UltimateESP").join("settings.json"))
    }

    /// Load settings from a JSON file
    pub fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Load settings, falling back to defaults when the file is missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!("Ignoring settings at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save settings as JSON, creating parent directories as needed
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)
    }

    /// Session configuration derived from these settings
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::from(self)
    }

    /// Host serial capability honoring the configured port
    pub fn host_serial(&self) -> HostSerial {
        match &self.connection.port {
            Some(port) => HostSerial::with_port(port.clone()),
            None => HostSerial::new(),
        }
    }
}

impl From<&Settings> for SessionConfig {
    fn from(settings: &Settings) -> Self {
        let baud_rate = if settings.connection.baud_rate == 0 {
            tracing::warn!(
                "settings: baud rate 0, defaulting to {}",
                DEFAULT_BAUD_RATE
            );
            DEFAULT_BAUD_RATE
        } else {
            settings.connection.baud_rate
        };

        Self {
            baud_rate,
            engine_log: settings.engine_log,
        }
    }
}
