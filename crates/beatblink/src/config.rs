//! Application configuration file
//!
//! Every section is optional; missing keys fall back to their defaults.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 3001
//!
//! [hub]
//! autoplay = true
//!
//! [audio]
//! fftSize = 1024
//! updateRate = 60
//!
//! [logging]
//! level = "debug"
//! file_output = true
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use beatblink_control::{HubConfig, WebServerConfig};
use beatblink_core::{AudioConfiguration, LogConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration of the `beatblink` server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP / WebSocket listener
    pub server: WebServerConfig,
    /// Broadcast hub
    pub hub: HubConfig,
    /// Initial audio configuration, changeable at runtime
    pub audio: AudioConfiguration,
    /// Log output
    pub logging: LogConfig,
}

impl AppConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content).context("Invalid configuration file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml_str(&content).with_context(|| format!("In config file {:?}", path))
    }

    /// Load `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        self.audio
            .validate()
            .context("Invalid [audio] section")?;
        self.logging
            .try_parse_level()
            .context("Invalid [logging] section")?;
        self.server
            .socket_addr()
            .context("Invalid [server] section")?;
        if self.hub.outbound_capacity == 0 {
            anyhow::bail!("Invalid [hub] section: outbound_capacity must be at least 1");
        }
        Ok(())
    }
}
