//! Configuration providers.
//!
//! The TOML file holds a single `[gossip]` table whose keys are the
//! `OverlayConfig` field names; missing keys keep their defaults.
//!
//! ```toml
//! [gossip]
//! p2p_address = "0.0.0.0:4002"
//! api_address = "127.0.0.1:7001"
//! bootstrapper = "10.0.0.1:4002"
//! degree = 30
//! cache_size = 1000
//! enroll_hardness = 2
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::domain::{ConfigError, OverlayConfig};
use crate::ports::ConfigProvider;

/// Fixed configuration, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    config: OverlayConfig,
}

impl StaticConfigProvider {
    #[must_use]
    pub fn new(config: OverlayConfig) -> Self {
        Self { config }
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn overlay_config(&self) -> Result<OverlayConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    gossip: OverlayConfig,
}

/// Configuration read from a TOML document.
#[derive(Debug, Clone)]
pub struct TomlConfigProvider {
    config: OverlayConfig,
}

impl TomlConfigProvider {
    /// Read and parse the file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(Self {
            config: file.gossip,
        })
    }

}

impl ConfigProvider for TomlConfigProvider {
    fn overlay_config(&self) -> Result<OverlayConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config.clone())
    }
}
