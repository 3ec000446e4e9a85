//! Tape drive control.
//!
//! Only three hardware operations are ever issued: status query, rewind, and
//! unload (plus offline for the direct `offline` command). They sit behind
//! the `TapeDrive` and `DriveOpener` traits so the readiness poller and the
//! door-open sequence can run against a fake drive.

mod door;
mod mtio;
mod readiness;


pub use door::{DoorReport, open_door};
pub use mtio::{MtDrive, MtOpener};
pub use readiness::{Readiness, ReadinessPoller};

use crate::config::Config;
use crate::error::Result;
use std::path::Path;
use std::time::Duration;

/// Interval between two status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Snapshot of the drive's status registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveStatus {
    pub drive_type: i64,
    pub resid: i64,
    pub dsreg: i64,
    pub gstat: i64,
    pub erreg: i64,
    pub fileno: i32,
    pub blkno: i32,
}

impl DriveStatus {
    /// No pending error condition in the error register.
    pub fn is_ready(&self) -> bool {
        self.erreg == 0
    }
}

/// How to open the device special file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Plain read-only open; waits for the medium.
    Blocking,
    /// Read-only with `O_NONBLOCK`, usable on a drive without a medium.
    NonBlocking,
}

/// An open control channel to one drive.
pub trait TapeDrive {
    fn status(&mut self) -> Result<DriveStatus>;
    fn rewind(&mut self) -> Result<()>;
    fn unload(&mut self) -> Result<()>;
    fn offline(&mut self) -> Result<()>;
}

/// Opens control channels by device path.
pub trait DriveOpener {
    fn open(&self, path: &Path, mode: OpenMode) -> Result<Box<dyn TapeDrive>>;
}

/// Drive-related settings shared by readiness and door-open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveSettings {
    /// Attribute passed to the broker when resolving a device path.
    pub attribute: String,
    pub ready_max_attempts: u32,
    pub settle_attempts: u32,
    pub poll_interval: Duration,
}

impl DriveSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attribute: config.default_device_attribute.clone(),
            ready_max_attempts: config.ready_max_attempts,
            settle_attempts: config.door_settle_attempts,
            poll_interval: POLL_INTERVAL,
        }
    }
}
