//! Tests for the lease data model.

use super::*;
use tempfile::TempDir;

fn descriptor(host: &str, device: &str, owner: u32, watchdog: u32) -> DeviceDescriptor {
    let mut dev = DeviceDescriptor::new(host, device, owner);
    dev.watchdog_pid = watchdog;
    dev
}

#[test]
fn test_token_format() {
    let dev = descriptor("robot1", "drv3", 4711, 4712);
    assert_eq!(dev.token().to_string(), "robot1.drv3.4711.4712");
    assert_eq!(dev.to_string(), "robot1.drv3.4711.4712");
}

#[test]
fn test_token_round_trip_preserves_lease_fields() {
    let cases = [
        descriptor("robot1", "drv3", 4711, 4712),
        descriptor("stk-silo-2", "rmt0", 1, 0),
        descriptor("h", "d", u32::MAX, u32::MAX),
    ];

    for dev in cases {
        let parsed = LeaseToken::parse(&dev.token().to_string()).unwrap();
        assert_eq!(DeviceDescriptor::from_token(&parsed), dev);
    }
}

#[test]
fn test_parse_short_handle_keeps_partial_fields() {
    let err = LeaseToken::parse("robot1.drv3.4711").unwrap_err();
    assert_eq!(err.partial.host, "robot1");
    assert_eq!(err.partial.device, "drv3");
    assert_eq!(err.partial.owner_pid, 0);
    assert_eq!(err.partial.watchdog_pid, 0);

    let err = LeaseToken::parse("robot1").unwrap_err();
    assert_eq!(err.partial.host, "robot1");
    assert_eq!(err.partial.device, "");

    let err = LeaseToken::parse("").unwrap_err();
    assert_eq!(err.partial, LeaseToken::default());
}

#[test]
fn test_parse_rejects_non_numeric_pids() {
    let err = LeaseToken::parse("robot1.drv3.abc.12").unwrap_err();
    assert_eq!(err.partial.owner_pid, 0);
    assert!(LeaseToken::parse("robot1.drv3.12.1.2").is_err());
}

#[test]
fn test_parse_trims_trailing_newline() {
    let token: LeaseToken = "robot1.drv3.10.11\n".parse().unwrap();
    assert_eq!(token.watchdog_pid, 11);
}

#[test]
fn test_malformed_token_becomes_user_error() {
    let err: crate::error::LeaseError = LeaseToken::parse("x.y").unwrap_err().into();
    assert_eq!(err.exit_code(), crate::exit_codes::FAILURE);
    assert!(err.to_string().contains("illegal device handle"));
}

#[test]
fn test_registry_flags_token() {
    assert!(DeviceFlags::from_registry_token("notready").contains(DeviceFlags::SKIP_READY_WAIT));
    assert!(DeviceFlags::from_registry_token("fast,notready").contains(DeviceFlags::SKIP_READY_WAIT));
    assert_eq!(DeviceFlags::from_registry_token(""), DeviceFlags::empty());
    assert_eq!(DeviceFlags::from_registry_token("ready"), DeviceFlags::empty());
}

#[test]
fn test_record_path_is_per_drive() {
    let dir = std::path::Path::new("/leases");
    let a = LeaseRecord::for_token(dir, &descriptor("robot1", "drv3", 1, 2).token());
    let b = LeaseRecord::for_token(dir, &descriptor("robot1", "drv3", 3, 4).token());
    assert_eq!(a, b);
    assert_eq!(a.path(), dir.join("robot1.drv3"));
}

#[test]
fn test_record_write_and_check() {
    let temp = TempDir::new().unwrap();
    let first = descriptor("robot1", "drv3", 10, 11).token();
    let second = descriptor("robot1", "drv3", 20, 21).token();
    let record = LeaseRecord::for_token(temp.path(), &first);

    assert_eq!(record.check(&first).unwrap(), RecordState::Missing);

    record.write(&first).unwrap();
    assert_eq!(
        std::fs::read_to_string(record.path()).unwrap(),
        "robot1.drv3.10.11\n"
    );
    assert_eq!(record.check(&first).unwrap(), RecordState::Current);

    record.write(&second).unwrap();
    assert_eq!(
        record.check(&first).unwrap(),
        RecordState::Superseded("robot1.drv3.20.21".to_string())
    );

    assert!(record.delete().unwrap());
    assert!(!record.delete().unwrap());
    assert_eq!(record.check(&second).unwrap(), RecordState::Missing);
}
