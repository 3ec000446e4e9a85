//! Mounting a volume on the leased drive.

use super::{Waited, wait_sliced};
use crate::broker::{Broker, MountMode, MountReply, MountRequest, MountResult};
use crate::error::{LeaseError, Result};
use crate::lease::DeviceDescriptor;
use crate::recovery::Interrupt;
use std::time::Duration;

/// Directive asking the operator to accept overwriting the volume.
const OVERWRITE_DIRECTIVE: &str = "overwrite";

/// Options of a dismount issued for a mount that landed on the wrong drive.
const STRAY_DISMOUNT_OPTIONS: &str = "NoOptions";

/// What to mount and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    pub volume: String,
    pub mode: MountMode,
    pub overwrite: bool,
    pub timeout: Duration,
}

/// Runs one mount request against an allocated drive.
pub struct MountEngine<'a> {
    broker: &'a mut dyn Broker,
    interrupt: &'a dyn Interrupt,
    slice: Duration,
    cancel_ack: Duration,
}

impl<'a> MountEngine<'a> {
    pub fn new(
        broker: &'a mut dyn Broker,
        interrupt: &'a dyn Interrupt,
        slice: Duration,
        cancel_ack: Duration,
    ) -> Self {
        Self {
            broker,
            interrupt,
            slice,
            cancel_ack,
        }
    }

    /// Mount `spec.volume` on `dev` and verify where it landed.
    ///
    /// The broker's status and message are stored in `dev` whenever a reply
    /// arrives.
    pub fn mount(&mut self, dev: &mut DeviceDescriptor, spec: &MountSpec) -> Result<()> {
        let request = MountRequest {
            host: dev.host.clone(),
            device: dev.device.clone(),
            volume: spec.volume.clone(),
            mode: spec.mode,
            directive: spec.overwrite.then(|| OVERWRITE_DIRECTIVE.to_string()),
        };
        self.broker.mount_request(&request)?;
        tracing::info!(
            drive = %dev.drive_name(),
            volume = %spec.volume,
            mode = %spec.mode,
            overwrite = spec.overwrite,
            "mount requested"
        );

        let broker = &mut *self.broker;
        let waited = wait_sliced(self.interrupt, self.slice, spec.timeout, |slice| {
            Ok(match broker.mount_reply(slice)? {
                MountReply::Reply(result) => Some(result),
                MountReply::TimedOut => None,
            })
        })?;

        let result = match waited {
            Waited::Reply(result) => result,
            Waited::TimedOut => {
                self.cancel(dev)?;
                return Err(LeaseError::Timeout(format!(
                    "volume {} not mounted on {} within {} seconds",
                    spec.volume,
                    dev.drive_name(),
                    spec.timeout.as_secs()
                )));
            }
            Waited::Interrupted(signal) => {
                tracing::warn!(drive = %dev.drive_name(), signal, "mount interrupted, cancelling");
                if let Err(e) = self.broker.mount_cancel(&dev.host, &dev.device) {
                    tracing::warn!(error = %e, "mount cancel failed");
                }
                return Err(LeaseError::Interrupted(signal));
            }
        };

        dev.status = result.status;
        dev.message = result.message.clone();
        if result.status != 0 {
            tracing::error!(
                drive = %dev.drive_name(),
                status = result.status,
                message = %result.message,
                "mount failed"
            );
            return Err(LeaseError::MountFailed {
                status: result.status,
                message: result.message,
            });
        }

        self.verify_identity(dev, result)?;
        tracing::info!(drive = %dev.drive_name(), volume = %spec.volume, "volume mounted");
        Ok(())
    }

    /// Cancel the pending mount and wait once for the broker's
    /// acknowledgement. A missing acknowledgement is only logged.
    fn cancel(&mut self, dev: &DeviceDescriptor) -> Result<()> {
        tracing::warn!(drive = %dev.drive_name(), "mount timed out, cancelling");
        self.broker.mount_cancel(&dev.host, &dev.device)?;
        match self.broker.mount_reply(self.cancel_ack) {
            Ok(MountReply::Reply(ack)) => {
                tracing::debug!(status = ack.status, message = %ack.message, "mount cancel acknowledged");
            }
            Ok(MountReply::TimedOut) => {
                tracing::warn!(drive = %dev.drive_name(), "no acknowledgement for mount cancel");
            }
            Err(e) => {
                tracing::warn!(drive = %dev.drive_name(), error = %e, "mount cancel acknowledgement failed");
            }
        }
        Ok(())
    }

    fn verify_identity(&mut self, dev: &DeviceDescriptor, result: MountResult) -> Result<()> {
        if result.host == dev.host && result.device == dev.device {
            return Ok(());
        }
        tracing::error!(
            expected = %dev.drive_name(),
            got_host = %result.host,
            got_device = %result.device,
            "volume mounted on the wrong drive"
        );
        if let Err(e) = self
            .broker
            .dismount(&result.host, &result.device, STRAY_DISMOUNT_OPTIONS)
        {
            tracing::error!(error = %e, "dismount of stray mount failed");
        }
        Err(LeaseError::IdentityMismatch {
            host: dev.host.clone(),
            device: dev.device.clone(),
            got_host: result.host,
            got_device: result.device,
        })
    }
}
