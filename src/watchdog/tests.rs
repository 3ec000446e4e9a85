//! Tests for watchdog supervision and reclamation.

use super::*;
use crate::lease::{DeviceDescriptor, LeaseRecord};
use crate::drive::DoorReport;
use crate::release::{ReleaseReport, Releaser, StepOutcome};
use crate::test_support::{FakeLauncher, FakeLiveness, FakeOpener, MockBroker, fast_drive_settings};
use std::time::Duration;
use tempfile::TempDir;

fn lease(owner: u32, watchdog: u32) -> DeviceDescriptor {
    let mut dev = DeviceDescriptor::new("robot1", "drv3", owner);
    dev.watchdog_pid = watchdog;
    dev
}

struct Fixture {
    temp: TempDir,
    record: LeaseRecord,
    broker: MockBroker,
    opener: FakeOpener,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let record = LeaseRecord::for_drive(temp.path(), "robot1", "drv3");
    let mut broker = MockBroker::new();
    broker.hold("robot1", "drv3");
    Fixture {
        temp,
        record,
        broker,
        opener: FakeOpener::new(),
    }
}

fn settle(fx: &mut Fixture, dev: &DeviceDescriptor) -> WatchOutcome {
    let liveness = FakeLiveness::alive_for(0);
    let settings = fast_drive_settings();
    let watchdog = Watchdog::new(dev.clone(), fx.record.clone(), &liveness, Duration::ZERO);
    let mut releaser = Releaser::new(&mut fx.broker, &fx.opener, &settings);
    watchdog.settle(&mut releaser, "all").unwrap()
}

#[test]
fn test_missing_record_means_owner_released() {
    let mut fx = fixture();

    let outcome = settle(&mut fx, &lease(100, 200));

    assert_eq!(outcome, WatchOutcome::Released);
    assert!(fx.broker.calls.is_empty());
    assert!(fx.opener.ops().is_empty());
}

#[test]
fn test_superseded_record_is_left_alone() {
    let mut fx = fixture();
    let newer = lease(300, 400);
    fx.record.write(&newer.token()).unwrap();

    let outcome = settle(&mut fx, &lease(100, 200));

    assert_eq!(
        outcome,
        WatchOutcome::Superseded("robot1.drv3.300.400".to_string())
    );
    assert!(fx.broker.calls.is_empty());
    assert!(fx.opener.ops().is_empty());
    assert_eq!(
        fx.record.read().unwrap().as_deref(),
        Some("robot1.drv3.300.400")
    );
}

#[test]
fn test_abandoned_lease_is_reclaimed() {
    let mut fx = fixture();
    let dev = lease(100, 200);
    fx.record.write(&dev.token()).unwrap();

    let outcome = settle(&mut fx, &dev);

    match outcome {
        WatchOutcome::Reclaimed {
            report,
            notice,
            notified,
        } => {
            assert!(notified);
            assert!(report.door.is_clean());
            assert_eq!(notice, "Please dismount drive drv3 on robot1");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(fx.broker.called("dismount robot1 drv3"));
    assert!(fx.broker.called("deallocate robot1 drv3"));
    assert_eq!(fx.opener.ops(), vec!["rewind", "unload"]);
    assert_eq!(
        fx.broker.messages,
        vec![(
            "all".to_string(),
            "Please dismount drive drv3 on robot1".to_string()
        )]
    );
    assert_eq!(fx.record.read().unwrap(), None);
}

#[test]
fn test_reclaim_notice_flags_failed_door_open() {
    let mut fx = fixture();
    fx.opener.fail_unload("drive busy");
    let dev = lease(100, 200);
    fx.record.write(&dev.token()).unwrap();

    let outcome = settle(&mut fx, &dev);

    let WatchOutcome::Reclaimed { notice, .. } = outcome else {
        panic!("expected reclamation");
    };
    assert!(notice.starts_with("Please dismount drive drv3 on robot1 (door-open failed: unload"));
    assert!(notice.ends_with("; drive may still be busy)"));
}

#[test]
fn test_failed_notice_still_reclaims() {
    let mut fx = fixture();
    fx.broker.operator_error = Some("no operator console".to_string());
    let dev = lease(100, 200);
    fx.record.write(&dev.token()).unwrap();

    let outcome = settle(&mut fx, &dev);

    assert!(matches!(
        outcome,
        WatchOutcome::Reclaimed {
            notified: false,
            ..
        }
    ));
    assert_eq!(fx.record.read().unwrap(), None);
}

#[test]
fn test_undeletable_record_still_notifies_operator() {
    let mut fx = fixture();
    let dev = lease(100, 200);
    fx.record.write(&dev.token()).unwrap();
    fx.broker.wedge_on_deallocate = Some(fx.record.path().to_path_buf());

    let outcome = settle(&mut fx, &dev);

    let WatchOutcome::Reclaimed {
        notice, notified, ..
    } = outcome
    else {
        panic!("expected reclamation");
    };
    assert!(notified);
    assert!(
        notice.starts_with("Please dismount drive drv3 on robot1 (stale lease record left behind:")
    );
    assert!(fx.broker.called("deallocate robot1 drv3"));
    assert_eq!(fx.broker.messages.len(), 1);
    assert_eq!(fx.broker.messages[0].1, notice);
}

#[test]
fn test_notice_names_stale_record() {
    let dev = lease(100, 200);
    let report = ReleaseReport {
        dismount: StepOutcome::Done,
        deallocate: StepOutcome::Done,
        door: DoorReport::default(),
    };

    assert_eq!(
        reclaim_notice(&dev, &report, Some("permission denied")),
        "Please dismount drive drv3 on robot1 (stale lease record left behind: permission denied)"
    );
}

#[test]
fn test_newer_lease_on_same_drive_blocks_old_watchdog() {
    let mut fx = fixture();
    let old = lease(100, 200);
    fx.record.write(&old.token()).unwrap();

    // A second lease lands on the drive before the first watchdog looks.
    let lease_dir = fx.temp.path().to_path_buf();
    let mut launcher = FakeLauncher::with_pid(401);
    launcher.launch(&lease(300, 0), &lease_dir).unwrap();

    let outcome = settle(&mut fx, &old);

    assert!(matches!(outcome, WatchOutcome::Superseded(_)));
    assert!(fx.broker.calls.is_empty());
    assert_eq!(
        fx.record.read().unwrap().as_deref(),
        Some("robot1.drv3.300.401")
    );
}

#[test]
fn test_run_probes_until_owner_is_gone() {
    let mut fx = fixture();
    let dev = lease(100, 200);
    let liveness = FakeLiveness::alive_for(3);
    let settings = fast_drive_settings();
    let watchdog = Watchdog::new(dev, fx.record.clone(), &liveness, Duration::ZERO);
    let mut releaser = Releaser::new(&mut fx.broker, &fx.opener, &settings);

    let outcome = watchdog.run(&mut releaser, "all").unwrap();

    assert_eq!(outcome, WatchOutcome::Released);
    assert_eq!(liveness.probes.get(), 4);
}

#[test]
fn test_process_probe_sees_own_process() {
    assert!(ProcessProbe.is_alive(std::process::id()));
}

#[test]
fn test_process_probe_rejects_invalid_pids() {
    assert!(!ProcessProbe.is_alive(0));
    assert!(!ProcessProbe.is_alive(u32::MAX));
}

#[test]
fn test_process_probe_sees_reaped_child_as_dead() {
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();

    assert!(!ProcessProbe.is_alive(pid));
}
