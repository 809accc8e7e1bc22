use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::services::classifier::ClassifierConfig;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub device: Option<String>,      // None = first device pcap reports
    pub classifier: ClassifierConfig,
    pub max_datagrams: Option<usize>,
    pub csv_path: String,
    pub json_path: String,
    pub read_timeout_ms: i32,
    pub is_debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: None,
            classifier: ClassifierConfig::default(),
            max_datagrams: None,
            csv_path: "blackmarket.csv".to_string(),
            json_path: "mails.json".to_string(),
            read_timeout_ms: 500,
            is_debug: false,
        }
    }
}

/// Loads the config file, writing the defaults out first when it does not exist yet.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        let default_config = AppConfig::default();
        if let Err(e) = save_config(path, &default_config) {
            log::warn!("[Config] Could not write default config: {}", e);
        }
        return Ok(default_config);
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Json { path: path.to_path_buf(), source })
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Json { path: path.to_path_buf(), source })?;
    fs::write(path, json).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");

        let config = load_config(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{ "device": "eth1", "classifier": { "ports": [6000] } }"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.device.as_deref(), Some("eth1"));
        assert_eq!(config.classifier.ports, vec![6000]);
        assert_eq!(config.classifier.server_prefixes.len(), 4);
        assert_eq!(config.read_timeout_ms, 500);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Json { .. })));
    }
}
