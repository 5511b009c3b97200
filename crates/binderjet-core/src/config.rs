//! Printer configuration
//!
//! Ports, line settings and start-up values of the serial devices, stored as
//! JSON. Every section falls back to its defaults, so a file listing only
//! the ports is a complete configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::jetdrive::{self, ControllerKind, DeviceProfile, JetDrive, Settings, Timing};
use crate::pcd::{self, Pcd};
use crate::protocol::{PortSettings, DEFAULT_RESPONSE_TIMEOUT};

/// Why a configuration file could not be read or written
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration of every serial device on the printer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    pub jetdrive: JetDriveConfig,
    pub pressure: PcdConfig,
}

impl PrinterConfig {
    /// `binderjet/printer.json` under the platform configuration directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("binderjet").join("printer.json"))
    }

    /// Load the configuration at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no printer config, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Write the configuration, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(io_error)
    }
}

/// JetDrive connection and start-up settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JetDriveConfig {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub response_timeout_ms: u64,
    pub connect_delay_ms: u64,
    pub controller: ControllerKind,
    /// Assumed firmware version until the device reports its own
    pub firmware_version: u8,
    pub multi_channel: bool,
    pub settings: Settings,
}

impl Default for JetDriveConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: jetdrive::DEFAULT_BAUD_RATE,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT.as_millis() as u64,
            connect_delay_ms: 500,
            controller: ControllerKind::Dream,
            firmware_version: 0,
            multi_channel: false,
            settings: Settings::default(),
        }
    }
}

impl JetDriveConfig {
    /// Line settings at the configured baud rate
    pub fn port_settings(&self) -> PortSettings {
        PortSettings::new(self.baud_rate)
    }

    pub fn profile(&self) -> DeviceProfile {
        DeviceProfile {
            kind: self.controller,
            firmware_version: self.firmware_version,
            multi_channel: self.multi_channel,
            ..DeviceProfile::default()
        }
    }

    pub fn timing(&self) -> Timing {
        Timing {
            connect_delay: Duration::from_millis(self.connect_delay_ms),
            response_timeout: Duration::from_millis(self.response_timeout_ms),
            ..Timing::default()
        }
    }

    /// A controller set up from this configuration
    pub fn controller(&self) -> JetDrive {
        JetDrive::with_timing(self.profile(), self.settings, self.timing())
            .with_port_settings(self.port_settings())
    }
}

/// PCD connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcdConfig {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub response_timeout_ms: u64,
    pub connect_delay_ms: u64,
    /// Identification string the controller answers `Q` with
    pub init_reply: String,
}

impl Default for PcdConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: pcd::DEFAULT_BAUD_RATE,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT.as_millis() as u64,
            connect_delay_ms: pcd::DEFAULT_CONNECT_DELAY.as_millis() as u64,
            init_reply: pcd::DEFAULT_INIT_REPLY.to_string(),
        }
    }
}

impl PcdConfig {
    /// Line settings at the configured baud rate
    pub fn port_settings(&self) -> PortSettings {
        PortSettings::new(self.baud_rate)
    }

    /// Disconnected PCD controller with this configuration
    pub fn controller(&self) -> Pcd {
        Pcd::new()
            .with_connect_delay(Duration::from_millis(self.connect_delay_ms))
            .with_response_timeout(Duration::from_millis(self.response_timeout_ms))
            .with_init_reply(self.init_reply.clone())
            .with_port_settings(self.port_settings())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SerialDevice;

    #[test]
    fn test_defaults() {
        let config = PrinterConfig::default();
        assert_eq!(config.jetdrive.baud_rate, 9600);
        assert_eq!(config.jetdrive.connect_delay_ms, 500);
        assert_eq!(config.jetdrive.response_timeout_ms, 3000);
        assert_eq!(config.pressure.baud_rate, 19200);
        assert_eq!(config.pressure.connect_delay_ms, 1500);
        assert_eq!(config.pressure.init_reply, "PCD");
    }

    #[test]
    fn test_partial_file() {
        let json = r#"{ "jetdrive": { "port": "COM3", "controller": "Standard" } }"#;
        let config: PrinterConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.jetdrive.port.as_deref(), Some("COM3"));
        assert_eq!(config.jetdrive.controller, ControllerKind::Standard);
        assert_eq!(config.jetdrive.baud_rate, 9600);
        assert_eq!(config.pressure, PcdConfig::default());
    }

    #[test]
    fn test_controllers_follow_config() {
        let mut config = PrinterConfig::default();
        config.jetdrive.baud_rate = 115200;
        config.jetdrive.firmware_version = 42;
        config.pressure.connect_delay_ms = 10;

        let jet = config.jetdrive.controller();
        assert_eq!(jet.port_settings().baud_rate, 115200);
        assert_eq!(jet.firmware_version(), 42);
        assert_eq!(jet.timing().connect_delay, Duration::from_millis(500));

        let pcd = config.pressure.controller();
        assert_eq!(pcd.port_settings().baud_rate, 19200);
    }

    #[test]
    fn test_default_path() {
        if let Some(path) = PrinterConfig::default_path() {
            assert!(path.ends_with("binderjet/printer.json"));
        }
    }
}
