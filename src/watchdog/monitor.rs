//! The watchdog's supervise-then-decide loop.

use super::Liveness;
use crate::error::Result;
use crate::lease::{DeviceDescriptor, LeaseRecord, RecordState};
use crate::release::{ReleaseReport, Releaser};
use std::thread;
use std::time::Duration;

/// How a watchdog ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The record was gone: the owner released the drive itself.
    Released,
    /// The record names a newer lease, which must be left alone.
    Superseded(String),
    /// The lease was abandoned and has been reclaimed.
    Reclaimed {
        report: ReleaseReport,
        notice: String,
        notified: bool,
    },
}

/// Supervisor of one lease.
pub struct Watchdog<'a> {
    lease: DeviceDescriptor,
    record: LeaseRecord,
    liveness: &'a dyn Liveness,
    interval: Duration,
}

impl<'a> Watchdog<'a> {
    /// `lease` must carry this watchdog's pid; its token is what the record
    /// is compared against.
    pub fn new(
        lease: DeviceDescriptor,
        record: LeaseRecord,
        liveness: &'a dyn Liveness,
        interval: Duration,
    ) -> Self {
        Self {
            lease,
            record,
            liveness,
            interval,
        }
    }

    pub fn lease(&self) -> &DeviceDescriptor {
        &self.lease
    }

    /// Block until the owner process is gone. Sleeps one interval before the
    /// first probe.
    pub fn wait_for_owner_exit(&self) {
        let owner = self.lease.owner_pid;
        tracing::info!(drive = %self.lease.drive_name(), owner, "watchdog supervising");
        loop {
            thread::sleep(self.interval);
            if !self.liveness.is_alive(owner) {
                tracing::info!(drive = %self.lease.drive_name(), owner, "owner process gone");
                return;
            }
        }
    }

    /// Decide what the owner's disappearance means and act on it.
    ///
    /// Only a record still naming this lease leads to a release; the record
    /// is then deleted and the operator at `target` is told to check the
    /// drive. The operator hears about the reclamation even when the record
    /// cannot be deleted.
    pub fn settle(&self, releaser: &mut Releaser<'_>, target: &str) -> Result<WatchOutcome> {
        let token = self.lease.token();
        match self.record.check(&token)? {
            RecordState::Missing => {
                tracing::info!(lease = %token, "lease released by owner");
                Ok(WatchOutcome::Released)
            }
            RecordState::Superseded(newer) => {
                tracing::info!(lease = %token, newer = %newer, "drive leased again, leaving it alone");
                Ok(WatchOutcome::Superseded(newer))
            }
            RecordState::Current => {
                tracing::warn!(lease = %token, "lease abandoned, reclaiming drive");
                let report = releaser.release(&self.lease);
                let stale_record = match self.record.delete() {
                    Ok(_) => None,
                    Err(e) => {
                        tracing::error!(lease = %token, error = %e, "lease record not removed");
                        Some(e.to_string())
                    }
                };

                let notice = reclaim_notice(&self.lease, &report, stale_record.as_deref());
                let notified = match releaser.broker().operator_message(target, &notice) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::error!(lease = %token, error = %e, "operator notice failed");
                        false
                    }
                };
                Ok(WatchOutcome::Reclaimed {
                    report,
                    notice,
                    notified,
                })
            }
        }
    }

    /// Supervise, then settle.
    pub fn run(&self, releaser: &mut Releaser<'_>, target: &str) -> Result<WatchOutcome> {
        self.wait_for_owner_exit();
        self.settle(releaser, target)
    }
}

/// Operator text for an unattended reclamation.
///
/// A door-open that did not go through is called out, since the drive may
/// still hold the volume. So is a lease record that is still on disk.
pub fn reclaim_notice(
    dev: &DeviceDescriptor,
    report: &ReleaseReport,
    stale_record: Option<&str>,
) -> String {
    let mut notice = format!("Please dismount drive {} on {}", dev.device, dev.host);
    if !report.door.is_clean() {
        notice.push_str(&format!(
            " (door-open failed: {}; drive may still be busy)",
            report.door.summary()
        ));
    }
    if let Some(reason) = stale_record {
        notice.push_str(&format!(" (stale lease record left behind: {})", reason));
    }
    notice
}
