//! The single recovery point of the allocate command.

use crate::error::PROTOCOL_TAG_BASE;
use crate::exit_codes;
use crate::lease::DeviceDescriptor;
use crate::release::{ReleaseReport, Releaser};

/// Guards the drive leased by this process until it is handed to a watchdog.
///
/// `recover` runs the release at most once, no matter how many failures or
/// signals reach it.
#[derive(Debug, Default)]
pub struct RecoveryController {
    armed: Option<DeviceDescriptor>,
    released: bool,
}

impl RecoveryController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the recovery point for a freshly leased drive.
    pub fn arm(&mut self, dev: &DeviceDescriptor) {
        tracing::debug!(drive = %dev.drive_name(), "recovery point armed");
        self.armed = Some(dev.clone());
        self.released = false;
    }

    /// Hand the lease over; from now on the watchdog is responsible.
    pub fn disarm(&mut self) {
        if let Some(dev) = self.armed.take() {
            tracing::debug!(drive = %dev.drive_name(), "recovery point handed to watchdog");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Transfer to the recovery point with `tag`.
    ///
    /// Returns the exit code the process must end with and, when this call
    /// performed the release, its report.
    pub fn recover(&mut self, tag: i32, releaser: &mut Releaser<'_>) -> (i32, Option<ReleaseReport>) {
        let exit_code = exit_code_for(tag);

        let Some(dev) = self.armed.as_ref() else {
            // Nothing leased yet, nothing to clean up.
            let code = if tag < PROTOCOL_TAG_BASE {
                exit_codes::FAILURE
            } else {
                exit_code
            };
            return (code, None);
        };

        if self.released {
            tracing::debug!(tag, drive = %dev.drive_name(), "release already done");
            return (exit_code, None);
        }
        self.released = true;

        if tag < PROTOCOL_TAG_BASE {
            tracing::warn!(signal = tag, drive = %dev.drive_name(), "cleaning up after signal");
        } else {
            tracing::warn!(
                code = tag - PROTOCOL_TAG_BASE,
                drive = %dev.drive_name(),
                "cleaning up after failed hold"
            );
        }

        let report = releaser.release(dev);
        (exit_code, Some(report))
    }
}

/// Exit code of a recovery transfer with `tag`.
pub fn exit_code_for(tag: i32) -> i32 {
    if tag < PROTOCOL_TAG_BASE {
        exit_codes::INTERRUPTED
    } else {
        tag - PROTOCOL_TAG_BASE
    }
}
