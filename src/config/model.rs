//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for drivelease.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Paths
    // =========================================================================
    /// Device group registry (`group host device [flags]` per line).
    #[serde(default = "default_registry_path")]
    pub registry_path: String,

    /// Directory for the audit event log and the diagnostic log.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Directory holding one lease record per physical drive.
    #[serde(default = "default_lease_dir")]
    pub lease_dir: String,

    // =========================================================================
    // Broker
    // =========================================================================
    /// Helper program speaking to the allocation broker (shell-words parsed).
    #[serde(default = "default_broker_command")]
    pub broker_command: String,

    /// Allocation and mount timeout when `allocate -n` is not given.
    #[serde(default = "default_timeout_minutes")]
    pub default_timeout_minutes: u64,

    /// Length of one slice of a blocking broker wait.
    #[serde(default = "default_reply_poll_ms")]
    pub reply_poll_ms: u64,

    /// Bound on the wait for the acknowledgement of a mount cancel.
    #[serde(default = "default_mount_cancel_ack_secs")]
    pub mount_cancel_ack_secs: u64,

    // =========================================================================
    // Drive
    // =========================================================================
    /// Status polls (one per second) before a mounted drive counts as not ready.
    #[serde(default = "default_ready_max_attempts")]
    pub ready_max_attempts: u32,

    /// Status polls before each door-open step.
    #[serde(default = "default_door_settle_attempts")]
    pub door_settle_attempts: u32,

    /// Attribute used to resolve the device special file of a drive.
    #[serde(default = "default_device_attribute")]
    pub default_device_attribute: String,

    // =========================================================================
    // Watchdog
    // =========================================================================
    /// Seconds between owner liveness probes.
    #[serde(default = "default_watchdog_interval_secs")]
    pub watchdog_interval_secs: u64,

    /// Seconds the allocating process waits for the watchdog to record the lease.
    #[serde(default = "default_watchdog_handshake_secs")]
    pub watchdog_handshake_secs: u64,

    // =========================================================================
    // Operator
    // =========================================================================
    /// Operator channel used by `notify`.
    #[serde(default = "default_operator_target")]
    pub operator_target: String,

    /// Operator channel used for unattended reclamation notices.
    #[serde(default = "default_reclaim_target")]
    pub reclaim_target: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
            state_dir: default_state_dir(),
            lease_dir: default_lease_dir(),
            broker_command: default_broker_command(),
            default_timeout_minutes: default_timeout_minutes(),
            reply_poll_ms: default_reply_poll_ms(),
            mount_cancel_ack_secs: default_mount_cancel_ack_secs(),
            ready_max_attempts: default_ready_max_attempts(),
            door_settle_attempts: default_door_settle_attempts(),
            default_device_attribute: default_device_attribute(),
            watchdog_interval_secs: default_watchdog_interval_secs(),
            watchdog_handshake_secs: default_watchdog_handshake_secs(),
            operator_target: default_operator_target(),
            reclaim_target: default_reclaim_target(),
        }
    }
}

impl Config {
    pub fn registry_path(&self) -> PathBuf {
        PathBuf::from(&self.registry_path)
    }

    pub fn state_dir(&self) -> PathBuf {
        PathBuf::from(&self.state_dir)
    }

    pub fn lease_dir(&self) -> PathBuf {
        PathBuf::from(&self.lease_dir)
    }

    /// Path of the NDJSON audit log.
    pub fn events_file(&self) -> PathBuf {
        self.state_dir().join("events.ndjson")
    }

    /// Path of the diagnostic log shared by commands and watchdogs.
    pub fn log_file(&self) -> PathBuf {
        self.state_dir().join("drivelease.log")
    }

    /// Allocation/mount timeout for an `allocate -n` value; non-positive
    /// values fall back to the configured default. Capped at
    /// `MAX_TIMEOUT_MINUTES`.
    pub fn lease_timeout(&self, minutes: Option<i64>) -> Duration {
        let minutes = match minutes {
            Some(m) if m > 0 => m.unsigned_abs(),
            _ => self.default_timeout_minutes,
        };
        if minutes > MAX_TIMEOUT_MINUTES {
            tracing::warn!(minutes, max = MAX_TIMEOUT_MINUTES, "timeout capped");
        }
        Duration::from_secs(minutes.min(MAX_TIMEOUT_MINUTES) * 60)
    }

    pub fn reply_poll(&self) -> Duration {
        Duration::from_millis(self.reply_poll_ms)
    }

    pub fn mount_cancel_ack(&self) -> Duration {
        Duration::from_secs(self.mount_cancel_ack_secs)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs)
    }

    pub fn watchdog_handshake(&self) -> Duration {
        Duration::from_secs(self.watchdog_handshake_secs)
    }
}
