//! Implementation of the `drivelease deallocate` command.
//!
//! Releases the drive of a lease and removes its record, which tells the
//! lease's watchdog that the owner let go on purpose.

use crate::broker::{Broker, CommandBroker};
use crate::cli::TokenArgs;
use crate::context::LeaseContext;
use crate::drive::{DriveOpener, MtOpener};
use crate::error::Result;
use crate::events::{Event, EventAction};
use crate::lease::{DeviceDescriptor, LeaseRecord, LeaseToken, RecordState};
use crate::release::{ReleaseReport, Releaser};
use serde_json::json;

pub fn cmd_deallocate(ctx: &LeaseContext, args: TokenArgs) -> Result<()> {
    let token = LeaseToken::parse(&args.token)?;
    let mut broker = CommandBroker::from_config(&ctx.config)?;
    release_lease(ctx, &mut broker, &MtOpener, &token)?;
    Ok(())
}

/// Release the drive of `token` and remove its lease record.
///
/// A record that already names a newer lease of the drive is left in place
/// so that lease's watchdog keeps guarding it.
pub(crate) fn release_lease(
    ctx: &LeaseContext,
    broker: &mut dyn Broker,
    opener: &dyn DriveOpener,
    token: &LeaseToken,
) -> Result<ReleaseReport> {
    let dev = DeviceDescriptor::from_token(token);
    let report = Releaser::new(broker, opener, &ctx.drive).release(&dev);

    let record = LeaseRecord::for_token(&ctx.lease_dir, token);
    let record_removed = match record.check(token)? {
        RecordState::Superseded(newer) => {
            tracing::warn!(lease = %token, newer = %newer, "lease record belongs to a newer lease, keeping it");
            false
        }
        RecordState::Current | RecordState::Missing => record.delete()?,
    };

    tracing::info!(lease = %token, record_removed, "lease released");
    ctx.events.record(
        Event::new(EventAction::Release)
            .with_lease(token)
            .with_details(json!({
                "already_released": report.was_already_released(),
                "record_removed": record_removed,
                "door_failures": report.door.failures,
            })),
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeOpener, MockBroker, fast_drive_settings, temp_config};

    fn context() -> (tempfile::TempDir, LeaseContext) {
        let (temp, config) = temp_config();
        let mut ctx = LeaseContext::from_config(config);
        ctx.drive = fast_drive_settings();
        (temp, ctx)
    }

    #[test]
    fn test_release_removes_record() {
        let (_temp, ctx) = context();
        let token = LeaseToken::parse("robot1.drv3.10.11").unwrap();
        let record = LeaseRecord::for_token(&ctx.lease_dir, &token);
        record.write(&token).unwrap();
        let mut broker = MockBroker::new();
        broker.hold("robot1", "drv3");
        let opener = FakeOpener::new();

        let report = release_lease(&ctx, &mut broker, &opener, &token).unwrap();

        assert!(!report.was_already_released());
        assert_eq!(record.read().unwrap(), None);
        assert_eq!(opener.ops(), vec!["rewind", "unload"]);
        assert!(broker.messages.is_empty());
        let events = ctx.events.read_all().unwrap();
        assert_eq!(events[0].action, EventAction::Release);
    }

    #[test]
    fn test_second_release_is_harmless() {
        let (_temp, ctx) = context();
        let token = LeaseToken::parse("robot1.drv3.10.11").unwrap();
        let mut broker = MockBroker::new();
        broker.hold("robot1", "drv3");
        let opener = FakeOpener::new();

        release_lease(&ctx, &mut broker, &opener, &token).unwrap();
        let second = release_lease(&ctx, &mut broker, &opener, &token).unwrap();

        assert!(second.was_already_released());
        assert!(broker.messages.is_empty());
    }

    #[test]
    fn test_newer_lease_record_is_kept() {
        let (_temp, ctx) = context();
        let old = LeaseToken::parse("robot1.drv3.10.11").unwrap();
        let newer = LeaseToken::parse("robot1.drv3.20.21").unwrap();
        let record = LeaseRecord::for_token(&ctx.lease_dir, &newer);
        record.write(&newer).unwrap();
        let mut broker = MockBroker::new();
        let opener = FakeOpener::new();

        release_lease(&ctx, &mut broker, &opener, &old).unwrap();

        assert_eq!(
            record.read().unwrap().as_deref(),
            Some("robot1.drv3.20.21")
        );
    }
}
