//! Door-open: rewind then unload, so the drive is physically free again.

use super::readiness::poll_until_ready;
use super::{DriveOpener, DriveSettings, OpenMode};
use crate::broker::Broker;
use crate::lease::DeviceDescriptor;
use crate::recovery::NeverInterrupted;

/// What went wrong while opening the door. Every step is best effort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoorReport {
    pub failures: Vec<String>,
}

impl DoorReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, step: &str, reason: impl std::fmt::Display) {
        tracing::warn!(step, reason = %reason, "door-open step failed");
        self.failures.push(format!("{}: {}", step, reason));
    }

    /// One-line summary of the failures.
    pub fn summary(&self) -> String {
        self.failures.join("; ")
    }
}

/// Rewind and unload the drive of `dev`, collecting failures instead of
/// stopping on them. The hardware may already be in the target state.
///
/// Signals are not consulted here: door-open runs as part of cleanup and
/// must finish.
pub fn open_door(
    broker: &mut dyn Broker,
    opener: &dyn DriveOpener,
    dev: &DeviceDescriptor,
    settings: &DriveSettings,
) -> DoorReport {
    let mut report = DoorReport::default();

    let path = match broker.device_file(&dev.host, &dev.device, &settings.attribute) {
        Ok(path) => path,
        Err(e) => {
            report.fail("resolve device", e);
            return report;
        }
    };

    tracing::debug!(drive = %dev.drive_name(), device = %path.display(), "opening door");
    let mut drive = match opener.open(&path, OpenMode::NonBlocking) {
        Ok(drive) => drive,
        Err(e) => {
            report.fail("open", e);
            return report;
        }
    };

    let settle = |drive: &mut dyn super::TapeDrive| {
        let _ = poll_until_ready(
            drive,
            &NeverInterrupted,
            settings.settle_attempts,
            settings.poll_interval,
        );
    };

    settle(drive.as_mut());
    if let Err(e) = drive.rewind() {
        report.fail("rewind", e);
    }
    settle(drive.as_mut());
    if let Err(e) = drive.unload() {
        report.fail("unload", e);
    }

    report
}
