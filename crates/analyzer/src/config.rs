//! Analyzer configuration management

use anyhow::{Context, Result, anyhow};
use protocol::MonitorConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub analyzer: AnalyzerSettings,
    pub capture: CaptureSettings,
    pub link: LinkSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerSettings {
    pub service_mode: bool,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Capture ring size in bytes; must be a power of two
    #[serde(default = "CaptureSettings::default_ring_capacity")]
    pub ring_capacity: usize,
    /// Seconds between unsolicited STATUS_REPORT frames
    #[serde(default = "CaptureSettings::default_status_interval")]
    pub status_interval_secs: u64,
    /// Capture configuration applied until the host sends its own
    #[serde(default)]
    pub filter: MonitorConfig,
}

impl CaptureSettings {
    fn default_ring_capacity() -> usize {
        4096
    }

    fn default_status_interval() -> u64 {
        1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSettings {
    /// Transmit ring size in bytes; must be a power of two
    #[serde(default = "LinkSettings::default_tx_ring_capacity")]
    pub tx_ring_capacity: usize,
}

impl LinkSettings {
    fn default_tx_ring_capacity() -> usize {
        4096
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerSettings {
                service_mode: false,
                log_level: "info".to_string(),
            },
            capture: CaptureSettings {
                ring_capacity: CaptureSettings::default_ring_capacity(),
                status_interval_secs: CaptureSettings::default_status_interval(),
                filter: MonitorConfig::default(),
            },
            link: LinkSettings {
                tx_ring_capacity: LinkSettings::default_tx_ring_capacity(),
            },
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/usbshark/analyzer.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: AnalyzerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usbshark").join("analyzer.toml")
        } else {
            PathBuf::from(".config/usbshark/analyzer.toml")
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.analyzer.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.analyzer.log_level,
                valid_levels.join(", ")
            ));
        }

        for (name, capacity) in [
            ("capture.ring_capacity", self.capture.ring_capacity),
            ("link.tx_ring_capacity", self.link.tx_ring_capacity),
        ] {
            if !capacity.is_power_of_two() || capacity < 2 {
                return Err(anyhow!(
                    "Invalid {} = {}, must be a power of two >= 2",
                    name,
                    capacity
                ));
            }
        }

        if self.capture.status_interval_secs == 0 {
            return Err(anyhow!("capture.status_interval_secs must be at least 1"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.analyzer.log_level, "info");
        assert!(!config.analyzer.service_mode);
        assert_eq!(config.capture.ring_capacity, 4096);
        assert_eq!(config.capture.filter, MonitorConfig::default());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AnalyzerConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: AnalyzerConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.analyzer.log_level, parsed.analyzer.log_level);
        assert_eq!(config.capture.ring_capacity, parsed.capture.ring_capacity);
        assert_eq!(config.capture.filter, parsed.capture.filter);
    }

    #[test]
    fn test_validate_ring_capacity() {
        let mut config = AnalyzerConfig::default();
        assert!(config.validate().is_ok());

        config.capture.ring_capacity = 1000;
        assert!(config.validate().is_err());

        config.capture.ring_capacity = 1024;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = AnalyzerConfig::default();
        config.analyzer.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyzer.toml");

        let mut config = AnalyzerConfig::default();
        config.capture.filter.addr_filter = 5;
        config.save(&path).unwrap();

        let loaded = AnalyzerConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.capture.filter.addr_filter, 5);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyzer.toml");
        fs::write(&path, "analyzer = \"not a table\"").unwrap();
        assert!(AnalyzerConfig::load(Some(path)).is_err());
    }
}
