//! User configuration.
//!
//! Stored as JSON at `<config dir>/plenum/config.json`. Every field has a
//! default, so a missing file or a partial file is fine.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use std::{fs, path::Path, path::PathBuf};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Where the inter-process bus connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub url: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3030/ws".to_string(),
        }
    }
}

/// Chrome auto-hide timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromeConfig {
    /// Delay before a bar hides after the pointer leaves its edge band.
    pub hide_delay_ms: u64,
    /// Height of the edge band that reveals a bar, in logical pixels.
    pub edge_band_px: f64,
}

impl ChromeConfig {
    pub fn hide_delay(&self) -> Duration {
        Duration::from_millis(self.hide_delay_ms)
    }
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            hide_delay_ms: 2500,
            edge_band_px: 64.0,
        }
    }
}

/// Size and name of the presenter window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenterWindowConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl Default for PresenterWindowConfig {
    fn default() -> Self {
        Self {
            name: "plenum-presenter".to_string(),
            width: 1280,
            height: 800,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlenumConfig {
    pub relay: RelayConfig,
    pub chrome: ChromeConfig,
    pub presenter_window: PresenterWindowConfig,
}

impl PlenumConfig {
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        serde_json::from_str(json).map_err(|e| ConfigError::Serialization(e.to_string()))
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialization(e.to_string()))
    }

    /// Default config file location, if the platform has one.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("plenum").join("config.json"))
    }

    /// Load from `path`. A missing file yields the defaults.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&json)
            .map_err(|e| ConfigError::Serialization(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Load from the default location, falling back to defaults on any error.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!("Ignoring config: {}", e);
            Self::default()
        })
    }

    /// Write to `path`, creating parent directories.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Io(format!("Failed to create config directory: {}", e))
            })?;
        }
        let json = self.to_json()?;
        fs::write(path, json)
            .map_err(|e| ConfigError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = PlenumConfig::from_json(r#"{"chrome":{"hide_delay_ms":1000}}"#).unwrap();
        assert_eq!(config.chrome.hide_delay(), Duration::from_millis(1000));
        assert_eq!(config.chrome.edge_band_px, 64.0);
        assert_eq!(config.relay, RelayConfig::default());
        assert_eq!(config.presenter_window.width, 1280);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = PlenumConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, PlenumConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = PlenumConfig::default();
        config.relay.url = "ws://127.0.0.1:4000/ws".to_string();
        config.presenter_window.name = "podium".to_string();

        config.save(&path).unwrap();

        assert_eq!(PlenumConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(PlenumConfig::load(&path), Err(ConfigError::Serialization(_))));
    }
}
