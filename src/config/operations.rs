//! Config loading, validation, and path resolution.

use super::model::Config;
use super::types::{CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH, MAX_MOUNT_CANCEL_ACK_SECS};
use crate::error::{LeaseError, Result};
use std::path::{Path, PathBuf};

/// Pick the configuration path: explicit flag, then environment, then default.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}

impl Config {
    /// Load config from a YAML file.
    ///
    /// A missing file at the default location yields the default config;
    /// a missing file anywhere else is an error, since the caller named it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            LeaseError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // serde_yaml rejects an empty document as a map; treat it as defaults.
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml)
                .map_err(|e| LeaseError::Config(format!("failed to parse config YAML: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| LeaseError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("default_timeout_minutes", self.default_timeout_minutes),
            ("ready_max_attempts", u64::from(self.ready_max_attempts)),
            ("door_settle_attempts", u64::from(self.door_settle_attempts)),
            ("watchdog_interval_secs", self.watchdog_interval_secs),
            ("watchdog_handshake_secs", self.watchdog_handshake_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(LeaseError::Config(format!(
                    "config validation failed: {} must be greater than 0",
                    name
                )));
            }
        }

        if !(1..=MAX_MOUNT_CANCEL_ACK_SECS).contains(&self.mount_cancel_ack_secs) {
            return Err(LeaseError::Config(format!(
                "config validation failed: mount_cancel_ack_secs must be between 1 and {} (found {})",
                MAX_MOUNT_CANCEL_ACK_SECS, self.mount_cancel_ack_secs
            )));
        }

        if !(1..=60_000).contains(&self.reply_poll_ms) {
            return Err(LeaseError::Config(format!(
                "config validation failed: reply_poll_ms must be between 1 and 60000 (found {})",
                self.reply_poll_ms
            )));
        }

        let words = shell_words::split(&self.broker_command).map_err(|e| {
            LeaseError::Config(format!(
                "config validation failed: broker_command is not parsable: {}",
                e
            ))
        })?;
        if words.is_empty() {
            return Err(LeaseError::Config(
                "config validation failed: broker_command must not be empty".to_string(),
            ));
        }

        for (name, value) in [
            ("registry_path", &self.registry_path),
            ("state_dir", &self.state_dir),
            ("lease_dir", &self.lease_dir),
            ("default_device_attribute", &self.default_device_attribute),
        ] {
            if value.trim().is_empty() {
                return Err(LeaseError::Config(format!(
                    "config validation failed: {} must not be empty",
                    name
                )));
            }
        }

        Ok(())
    }
}
