//! In-memory description of a leased drive.

use super::token::LeaseToken;
use std::fmt;

/// Capability bits resolved from the device group registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFlags(u32);

impl DeviceFlags {
    /// Do not poll the drive for readiness after the mount.
    pub const SKIP_READY_WAIT: DeviceFlags = DeviceFlags(0x1);

    pub const fn empty() -> Self {
        DeviceFlags(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: DeviceFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: DeviceFlags) {
        self.0 |= other.0;
    }

    /// Parse the registry's free-form flags token.
    ///
    /// Only the substring `notready` is meaningful today.
    pub fn from_registry_token(token: &str) -> Self {
        let mut flags = DeviceFlags::empty();
        if token.contains("notready") {
            flags.insert(DeviceFlags::SKIP_READY_WAIT);
        }
        flags
    }
}

/// A drive held (or being negotiated) by this process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Host the drive is attached to, as assigned by the broker.
    pub host: String,

    /// Drive name on that host, as assigned by the broker.
    pub device: String,

    /// Process the lease belongs to; the watchdog supervises it.
    pub owner_pid: u32,

    /// Detached watchdog of this lease, 0 until it is spawned.
    pub watchdog_pid: u32,

    pub flags: DeviceFlags,

    /// Last mount status reported by the broker (0 = success).
    pub status: i32,

    /// Diagnostic text from the most recent failed operation.
    pub message: String,
}

impl DeviceDescriptor {
    pub fn new(host: impl Into<String>, device: impl Into<String>, owner_pid: u32) -> Self {
        Self {
            host: host.into(),
            device: device.into(),
            owner_pid,
            ..Self::default()
        }
    }

    /// Rebuild a descriptor from a caller's handle.
    pub fn from_token(token: &LeaseToken) -> Self {
        Self {
            host: token.host.clone(),
            device: token.device.clone(),
            owner_pid: token.owner_pid,
            watchdog_pid: token.watchdog_pid,
            ..Self::default()
        }
    }

    /// The handle identifying this lease.
    pub fn token(&self) -> LeaseToken {
        LeaseToken {
            host: self.host.clone(),
            device: self.device.clone(),
            owner_pid: self.owner_pid,
            watchdog_pid: self.watchdog_pid,
        }
    }

    /// `host.device`, the physical identity of the drive.
    pub fn drive_name(&self) -> String {
        format!("{}.{}", self.host, self.device)
    }

    pub fn skips_ready_wait(&self) -> bool {
        self.flags.contains(DeviceFlags::SKIP_READY_WAIT)
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}
