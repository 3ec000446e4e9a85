//! Per-invocation context for drivelease commands.
//!
//! This is the "environment resolution" layer: it loads the configuration
//! once and derives every path and setting a command needs from it, so no
//! component reads process-wide state on its own.

use crate::config::{Config, resolve_config_path};
use crate::drive::DriveSettings;
use crate::error::Result;
use crate::events::EventLog;
use crate::registry::DeviceGroupRegistry;
use std::path::{Path, PathBuf};

/// Resolved configuration and paths for one command.
#[derive(Debug, Clone)]
pub struct LeaseContext {
    pub config: Config,

    /// Directory holding the lease records.
    pub lease_dir: PathBuf,

    /// Device group registry.
    pub registry: DeviceGroupRegistry,

    /// Audit log.
    pub events: EventLog,

    /// Readiness and door-open settings.
    pub drive: DriveSettings,
}

impl LeaseContext {
    /// Load the configuration named by `--config`, `DRIVELEASE_CONFIG`, or
    /// the default path, and resolve the context from it.
    pub fn resolve(explicit_config: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(explicit_config);
        let config = Config::load(&path)?;
        tracing::debug!(config = %path.display(), "configuration loaded");
        Ok(Self::from_config(config))
    }

    /// Build the context from an already loaded configuration.
    pub fn from_config(config: Config) -> Self {
        Self {
            lease_dir: config.lease_dir(),
            registry: DeviceGroupRegistry::new(config.registry_path()),
            events: EventLog::new(config.events_file()),
            drive: DriveSettings::from_config(&config),
            config,
        }
    }
}
