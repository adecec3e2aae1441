//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::ReporterConfig;
use crate::utils::logger::LogLevel;

/// Configuration file locations (in order of precedence)
pub const CONFIG_LOCATIONS: &[&str] = &[
    "./run-tracker.yaml",
    "./run-tracker.yml",
    "./.run-tracker.yaml",
    "~/.config/run-tracker/config.yaml",
];

const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

impl ReporterConfig {
    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self> {
        match Self::find() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        if LogLevel::from_str(&self.log_level).is_none() {
            anyhow::bail!(
                "Invalid log level '{}'. Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        if let Some(component) = self
            .platform_components
            .iter()
            .find(|c| c.component.trim().is_empty())
        {
            anyhow::bail!("Platform component with empty name (version {:?})", component.version);
        }

        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        use crate::config::{StoreBackend, StoreConfig};
        use crate::models::VersionedComponent;

        Self {
            store: StoreConfig {
                backend: StoreBackend::File,
                path: Some(PathBuf::from("./run-tracker-store")),
            },
            environment: Some("staging".to_string()),
            environment_version: Some("0.9.2".to_string()),
            suite: Some("api".to_string()),
            release: Some("2026.10".to_string()),
            platform_components: vec![
                VersionedComponent::new("console", "1.4.0"),
                VersionedComponent::new("data-catalog", "0.9.1"),
            ],
            failed_tests_file_path: Some(PathBuf::from("failed_tests.txt")),
            ..Self::default()
        }
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::CountingMode;
    use tempfile::tempdir;

    #[test]
    fn test_config_save_load_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let config = ReporterConfig::example();
        config.save(&path).unwrap();

        let loaded = ReporterConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_save_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = ReporterConfig::example();
        config.save(&path).unwrap();

        let loaded = ReporterConfig::load(&path).unwrap();
        assert_eq!(loaded.suite.as_deref(), Some("api"));
        assert_eq!(loaded.platform_components.len(), 2);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "suite: smoke\ncounting: sub_test_groups\nstore:\n  backend: memory\n",
        )
        .unwrap();

        let config = ReporterConfig::load(&path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.suite.as_deref(), Some("smoke"));
        assert_eq!(config.counting, CountingMode::SubTestGroups);
        assert_eq!(config.store.backend, crate::config::StoreBackend::Memory);
    }

    #[test]
    fn test_validate_config() {
        let mut config = ReporterConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        config.log_level = "warning".to_string();
        config.version = "2.0".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_path() {
        let path = expand_path("./test.yaml");
        assert_eq!(path, PathBuf::from("./test.yaml"));
    }
}
