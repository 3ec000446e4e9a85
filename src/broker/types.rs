//! Request and reply values exchanged with the broker.

use std::fmt;

/// Broker-assigned allocation request id.
pub type RequestId = i64;

/// Wildcard accepted by the broker for any allocation hint.
pub const ANY: &str = "any";

/// Constraints for an allocation request; `any` leaves a field open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocRequest {
    pub host: String,
    pub group: String,
    pub device_type: String,
}

impl AllocRequest {
    pub fn new(host: Option<&str>, group: Option<&str>, device_type: Option<&str>) -> Self {
        Self {
            host: host.unwrap_or(ANY).to_string(),
            group: group.unwrap_or(ANY).to_string(),
            device_type: device_type.unwrap_or(ANY).to_string(),
        }
    }
}

/// A granted allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub bid: RequestId,
    pub host: String,
    pub device: String,
}

/// Outcome of waiting for an allocation reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocReply {
    Granted(Grant),
    /// Nothing arrived within the wait.
    TimedOut,
    /// No allocation request is outstanding any more.
    NonePending,
}

/// Read or write access to the mounted volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MountMode {
    #[default]
    Read,
    Write,
}

impl MountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MountMode::Read => "r",
            MountMode::Write => "w",
        }
    }
}

impl fmt::Display for MountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mount request for an already allocated drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    pub host: String,
    pub device: String,
    pub volume: String,
    pub mode: MountMode,
    /// Operator directive, e.g. `overwrite`.
    pub directive: Option<String>,
}

/// The broker's answer to a mount request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountResult {
    /// Drive the volume actually ended up on.
    pub host: String,
    pub device: String,
    /// 0 on success.
    pub status: i32,
    pub message: String,
}

/// Outcome of waiting for a mount reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountReply {
    Reply(MountResult),
    TimedOut,
}

/// Result of a dismount or deallocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStatus {
    Done,
    /// Nothing to release; treated like success.
    AlreadyReleased,
}
