//! Manager configuration management

use crate::classifier::DEFAULT_NAME_PATTERN;
use anyhow::{Context, Result, anyhow};
use protocol::DeviceFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    pub manager: ManagerSettings,
    #[serde(default)]
    pub usb: UsbSettings,
    /// Grant policy of the native host
    #[serde(default)]
    pub permissions: PermissionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerSettings {
    /// Package that permission results are scoped to
    pub package_name: String,
    pub log_level: String,
    #[serde(default)]
    pub service_mode: bool,
    /// Deliver a launch intent at startup (first video device scan)
    #[serde(default)]
    pub scan_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsbSettings {
    /// Substring matched against device display names (case-insensitive)
    #[serde(default = "UsbSettings::default_name_pattern")]
    pub name_pattern: String,
    /// Devices the host reports at all (VID:PID patterns, empty = all)
    #[serde(default)]
    pub filters: Vec<String>,
    /// Poll interval used when libusb has no hot-plug support
    #[serde(default = "UsbSettings::default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for UsbSettings {
    fn default() -> Self {
        Self {
            name_pattern: Self::default_name_pattern(),
            filters: Vec::new(),
            poll_interval_ms: Self::default_poll_interval(),
        }
    }
}

impl UsbSettings {
    fn default_name_pattern() -> String {
        DEFAULT_NAME_PATTERN.to_string()
    }

    fn default_poll_interval() -> u64 {
        1000
    }
}

/// How the native host answers permission requests
///
/// # Example Configuration
/// ```toml
/// [permissions]
/// auto_grant = ["0x0b00:*"]       # Only this vendor
/// restricted_classes = [8]       # Never mass storage
/// require_node_access = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionSettings {
    /// VID:PID patterns granted on request (empty = any device)
    #[serde(default)]
    pub auto_grant: Vec<String>,
    /// USB class codes that are never granted
    #[serde(default)]
    pub restricted_classes: Vec<u8>,
    /// Only grant when the device node can be opened by this process
    #[serde(default = "PermissionSettings::default_require_node_access")]
    pub require_node_access: bool,
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            auto_grant: Vec::new(),
            restricted_classes: Vec::new(),
            require_node_access: Self::default_require_node_access(),
        }
    }
}

impl PermissionSettings {
    fn default_require_node_access() -> bool {
        true
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            manager: ManagerSettings {
                package_name: "pinpad-usb".to_string(),
                log_level: "info".to_string(),
                service_mode: false,
                scan_on_start: false,
            },
            usb: UsbSettings::default(),
            permissions: PermissionSettings::default(),
        }
    }
}

/// First existing file among `candidates`
fn find_config(candidates: &[PathBuf]) -> Result<PathBuf> {
    candidates
        .iter()
        .find(|p| p.exists())
        .cloned()
        .ok_or_else(|| anyhow!("No configuration file found"))
}

impl ManagerConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/pinpad-usb/manager.toml"),
            ];

            find_config(&candidates)?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: ManagerConfig = toml::from_str(&content)
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
            config_dir.join("pinpad-usb").join("manager.toml")
        } else {
            PathBuf::from(".config/pinpad-usb/manager.toml")
        }
    }

    /// Parsed `[usb] filters`
    pub fn device_filters(&self) -> Result<Vec<DeviceFilter>> {
        DeviceFilter::parse_all(&self.usb.filters).context("Invalid [usb] filters")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.manager.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.manager.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.manager.package_name.trim().is_empty() {
            return Err(anyhow!("package_name must not be empty"));
        }

        if self.usb.name_pattern.is_empty() {
            return Err(anyhow!("name_pattern must not be empty"));
        }

        if self.usb.poll_interval_ms == 0 {
            return Err(anyhow!("poll_interval_ms must be greater than 0"));
        }

        self.device_filters()?;
        DeviceFilter::parse_all(&self.permissions.auto_grant)
            .context("Invalid [permissions] auto_grant")?;

        Ok(())
    }
}

/// Load a configuration file from a user-supplied path (`~` expanded)
pub fn load_config(path: &str) -> Result<ManagerConfig> {
    let path_buf = PathBuf::from(shellexpand::tilde(path).as_ref());
    ManagerConfig::load(Some(path_buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_config_first_existing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let present = dir.path().join("manager.toml");
        fs::write(&present, "").unwrap();

        let found = find_config(&[missing.clone(), present.clone()]).unwrap();
        assert_eq!(found, present);

        let err = find_config(&[missing]).unwrap_err();
        assert_eq!(err.to_string(), "No configuration file found");
    }

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.manager.log_level, "info");
        assert_eq!(config.usb.name_pattern, "pinpad");
        assert!(!config.manager.scan_on_start);
        assert!(config.permissions.require_node_access);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = ManagerConfig::default();
        config.manager.log_level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.manager.log_level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_filters() {
        let mut config = ManagerConfig::default();
        config.usb.filters = vec!["0x0b00:*".to_string()];
        assert!(config.validate().is_ok());

        config.permissions.auto_grant = vec!["0b00:*".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_values() {
        let mut config = ManagerConfig::default();
        config.manager.package_name = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = ManagerConfig::default();
        config.usb.name_pattern = String::new();
        assert!(config.validate().is_err());

        let mut config = ManagerConfig::default();
        config.usb.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = ManagerConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: ManagerConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.manager.package_name, parsed.manager.package_name);
        assert_eq!(config.usb.poll_interval_ms, parsed.usb.poll_interval_ms);
    }
}
