//! Lease token codec.
//!
//! Wire format: `host.device.ownerPID.watchdogPID`. Parsing is tolerant in
//! the way long-lived scripts expect: a handle with fewer than four fields is
//! rejected, but the rejection still carries whatever host and device could be
//! read, with both pids left at zero.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The handle a caller holds for a lease.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LeaseToken {
    pub host: String,
    pub device: String,
    pub owner_pid: u32,
    pub watchdog_pid: u32,
}

/// A handle that could not be parsed completely.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("illegal device handle '{raw}'")]
pub struct MalformedToken {
    /// The input as given.
    pub raw: String,

    /// Best-effort fields; pids are always zero here.
    pub partial: LeaseToken,
}

impl LeaseToken {
    /// Parse a handle, failing on fewer than four fields or non-numeric pids.
    pub fn parse(raw: &str) -> Result<Self, MalformedToken> {
        let raw = raw.trim();
        let mut fields = raw.splitn(4, '.');

        let host = fields.next().unwrap_or_default().to_string();
        let device = fields.next().unwrap_or_default().to_string();
        let owner = fields.next();
        let watchdog = fields.next();

        let malformed = || MalformedToken {
            raw: raw.to_string(),
            partial: LeaseToken {
                host: host.clone(),
                device: device.clone(),
                owner_pid: 0,
                watchdog_pid: 0,
            },
        };

        let (Some(owner), Some(watchdog)) = (owner, watchdog) else {
            return Err(malformed());
        };
        if host.is_empty() || device.is_empty() {
            return Err(malformed());
        }
        let (Ok(owner_pid), Ok(watchdog_pid)) = (owner.parse::<u32>(), watchdog.parse::<u32>())
        else {
            return Err(malformed());
        };

        Ok(LeaseToken {
            host,
            device,
            owner_pid,
            watchdog_pid,
        })
    }
}

impl FromStr for LeaseToken {
    type Err = MalformedToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LeaseToken::parse(s)
    }
}

impl fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.host, self.device, self.owner_pid, self.watchdog_pid
        )
    }
}

impl From<MalformedToken> for crate::error::LeaseError {
    fn from(err: MalformedToken) -> Self {
        crate::error::LeaseError::UserError(err.to_string())
    }
}
