//! Waiting for a freshly mounted drive to become ready.

use super::{DriveOpener, DriveSettings, OpenMode, TapeDrive};
use crate::broker::Broker;
use crate::error::Result;
use crate::lease::DeviceDescriptor;
use crate::recovery::{Interrupt, pause};

/// Outcome of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Ready after this many status polls (0 when the wait was skipped).
    Ready { attempts: u32 },
    TimedOut,
}

/// Bounded status poll on one drive.
pub struct ReadinessPoller<'a> {
    broker: &'a mut dyn Broker,
    opener: &'a dyn DriveOpener,
    interrupt: &'a dyn Interrupt,
    settings: &'a DriveSettings,
}

impl<'a> ReadinessPoller<'a> {
    pub fn new(
        broker: &'a mut dyn Broker,
        opener: &'a dyn DriveOpener,
        interrupt: &'a dyn Interrupt,
        settings: &'a DriveSettings,
    ) -> Self {
        Self {
            broker,
            opener,
            interrupt,
            settings,
        }
    }

    /// Poll until the drive reports no pending error or `max_attempts` polls
    /// were made.
    ///
    /// A drive that cannot be opened or queried is still settling, so both
    /// count as a timeout here rather than as a hard error.
    pub fn wait_ready(&mut self, dev: &DeviceDescriptor, max_attempts: u32) -> Result<Readiness> {
        if dev.skips_ready_wait() {
            tracing::info!(drive = %dev.drive_name(), "readiness wait skipped by registry flag");
            return Ok(Readiness::Ready { attempts: 0 });
        }

        let path = self
            .broker
            .device_file(&dev.host, &dev.device, &self.settings.attribute)?;

        let mut drive = match self.opener.open(&path, OpenMode::Blocking) {
            Ok(drive) => drive,
            Err(e) => {
                tracing::warn!(device = %path.display(), error = %e, "drive not openable yet");
                return Ok(Readiness::TimedOut);
            }
        };

        let readiness = poll_until_ready(
            drive.as_mut(),
            self.interrupt,
            max_attempts,
            self.settings.poll_interval,
        )?;
        match readiness {
            Readiness::Ready { attempts } => {
                tracing::info!(drive = %dev.drive_name(), attempts, "drive ready");
            }
            Readiness::TimedOut => {
                tracing::warn!(drive = %dev.drive_name(), max_attempts, "drive never became ready");
            }
        }
        Ok(readiness)
    }
}

/// Query status up to `max_attempts` times, pausing `interval` between polls.
pub(crate) fn poll_until_ready(
    drive: &mut dyn TapeDrive,
    interrupt: &dyn Interrupt,
    max_attempts: u32,
    interval: std::time::Duration,
) -> Result<Readiness> {
    for attempt in 1..=max_attempts {
        interrupt.check()?;
        match drive.status() {
            Ok(status) if status.is_ready() => {
                return Ok(Readiness::Ready { attempts: attempt });
            }
            Ok(status) => {
                tracing::debug!(attempt, erreg = status.erreg, "drive not ready");
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "status query failed");
                return Ok(Readiness::TimedOut);
            }
        }
        if attempt < max_attempts {
            pause(interrupt, interval)?;
        }
    }
    Ok(Readiness::TimedOut)
}
