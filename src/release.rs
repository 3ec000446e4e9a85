//! The release sequence shared by every cleanup path.
//!
//! `release()` = dismount, deallocate, door-open. Dismount and deallocate
//! treat "nothing to release" as success, so running the sequence twice for
//! one lease is harmless. Failures are reported, never raised: a release runs
//! on paths that are already failing, or in a watchdog nobody is watching.

use crate::broker::{Broker, ReleaseStatus};
use crate::drive::{DoorReport, DriveOpener, DriveSettings, open_door};
use crate::lease::DeviceDescriptor;

/// Options passed with a release dismount.
const DISMOUNT_OPTIONS: &str = "";

/// Outcome of one broker step of a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    AlreadyReleased,
    Failed(String),
}

impl StepOutcome {
    fn from_result(result: crate::error::Result<ReleaseStatus>) -> Self {
        match result {
            Ok(ReleaseStatus::Done) => StepOutcome::Done,
            Ok(ReleaseStatus::AlreadyReleased) => StepOutcome::AlreadyReleased,
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

/// What a release did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    pub dismount: StepOutcome,
    pub deallocate: StepOutcome,
    pub door: DoorReport,
}

impl ReleaseReport {
    /// Both broker steps found nothing left to release.
    pub fn was_already_released(&self) -> bool {
        self.dismount == StepOutcome::AlreadyReleased
            && self.deallocate == StepOutcome::AlreadyReleased
    }
}

/// Runs `release()` against one broker and drive opener.
pub struct Releaser<'a> {
    broker: &'a mut dyn Broker,
    opener: &'a dyn DriveOpener,
    settings: &'a DriveSettings,
}

impl<'a> Releaser<'a> {
    pub fn new(
        broker: &'a mut dyn Broker,
        opener: &'a dyn DriveOpener,
        settings: &'a DriveSettings,
    ) -> Self {
        Self {
            broker,
            opener,
            settings,
        }
    }

    /// Access to the broker, e.g. for the operator notice after a release.
    pub fn broker(&mut self) -> &mut dyn Broker {
        &mut *self.broker
    }

    pub fn release(&mut self, dev: &DeviceDescriptor) -> ReleaseReport {
        let drive = dev.drive_name();

        let dismount =
            StepOutcome::from_result(self.broker.dismount(&dev.host, &dev.device, DISMOUNT_OPTIONS));
        match &dismount {
            StepOutcome::Failed(reason) => tracing::warn!(%drive, %reason, "dismount failed"),
            outcome => tracing::info!(%drive, ?outcome, "dismount"),
        }

        let deallocate = StepOutcome::from_result(self.broker.deallocate(&dev.host, &dev.device));
        match &deallocate {
            StepOutcome::Failed(reason) => tracing::warn!(%drive, %reason, "deallocate failed"),
            outcome => tracing::info!(%drive, ?outcome, "deallocate"),
        }

        let door = open_door(&mut *self.broker, self.opener, dev, self.settings);
        if door.is_clean() {
            tracing::info!(%drive, "door open");
        }

        ReleaseReport {
            dismount,
            deallocate,
            door,
        }
    }
}
