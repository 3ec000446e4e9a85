//! Configuration defaults for drivelease.

/// Location of the configuration file when neither `--config` nor
/// `DRIVELEASE_CONFIG` names one.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/drivelease/config.yaml";

/// Environment variable overriding the configuration path.
pub const CONFIG_ENV_VAR: &str = "DRIVELEASE_CONFIG";

/// Longest allocation/mount timeout, in minutes (one week). Larger values
/// are clamped to it.
pub const MAX_TIMEOUT_MINUTES: u64 = 7 * 24 * 60;

/// Upper bound for the wait on a mount-cancel acknowledgement.
pub const MAX_MOUNT_CANCEL_ACK_SECS: u64 = 20;

// Default value functions for serde
pub(crate) fn default_registry_path() -> String {
    "/etc/drivelease/devgroups".to_string()
}
pub(crate) fn default_state_dir() -> String {
    "/var/lib/drivelease".to_string()
}
pub(crate) fn default_lease_dir() -> String {
    "/var/lib/drivelease/leases".to_string()
}
pub(crate) fn default_broker_command() -> String {
    "ocs-client".to_string()
}
pub(crate) fn default_timeout_minutes() -> u64 {
    60
}
pub(crate) fn default_reply_poll_ms() -> u64 {
    1000
}
pub(crate) fn default_mount_cancel_ack_secs() -> u64 {
    20
}
pub(crate) fn default_ready_max_attempts() -> u32 {
    120
}
pub(crate) fn default_door_settle_attempts() -> u32 {
    60
}
pub(crate) fn default_watchdog_interval_secs() -> u64 {
    10
}
pub(crate) fn default_watchdog_handshake_secs() -> u64 {
    10
}
pub(crate) fn default_device_attribute() -> String {
    "8500".to_string()
}
pub(crate) fn default_operator_target() -> String {
    "any".to_string()
}
pub(crate) fn default_reclaim_target() -> String {
    "all".to_string()
}
