//! Shared fakes for unit tests: a scripted broker, a fake tape drive, a
//! scripted interrupt source, and stand-ins for the watchdog's process
//! plumbing.

use crate::broker::{
    AllocReply, AllocRequest, Broker, Grant, MountReply, MountRequest, MountResult, ReleaseStatus,
    RequestId,
};
use crate::config::Config;
use crate::drive::{DriveOpener, DriveSettings, DriveStatus, OpenMode, TapeDrive};
use crate::error::{LeaseError, Result};
use crate::lease::{DeviceDescriptor, LeaseRecord};
use crate::recovery::Interrupt;
use crate::watchdog::{Liveness, WatchdogLauncher};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Broker
// ============================================================================

/// A broker whose replies are scripted up front.
///
/// It also tracks which drives are allocated and mounted, so dismount and
/// deallocate answer `AlreadyReleased` the second time. Every call is
/// appended to `calls` as a short text line.
#[derive(Debug, Default)]
pub(crate) struct MockBroker {
    pub next_bid: RequestId,
    pub queue_error: Option<String>,
    pub alloc_replies: VecDeque<AllocReply>,
    pub cancel_error: Option<String>,
    pub mount_error: Option<String>,
    pub mount_replies: VecDeque<MountReply>,
    pub mount_reply_error: Option<String>,
    pub mount_cancel_error: Option<String>,
    pub dismount_error: Option<String>,
    pub deallocate_error: Option<String>,
    pub operator_error: Option<String>,
    pub device_file_error: Option<String>,
    pub device_dir: PathBuf,
    /// When set, deallocate turns this path into a non-empty directory, so
    /// a later `remove_file` on it fails.
    pub wedge_on_deallocate: Option<PathBuf>,
    pub allocated: BTreeSet<(String, String)>,
    pub mounted: BTreeSet<(String, String)>,
    pub messages: Vec<(String, String)>,
    pub calls: Vec<String>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            next_bid: 42,
            device_dir: PathBuf::from("/dev/fake"),
            ..Self::default()
        }
    }

    /// Pretend `host.device` is allocated and mounted.
    pub fn hold(&mut self, host: &str, device: &str) {
        let key = (host.to_string(), device.to_string());
        self.allocated.insert(key.clone());
        self.mounted.insert(key);
    }

    pub fn grant(&mut self, bid: RequestId, host: &str, device: &str) {
        self.alloc_replies.push_back(AllocReply::Granted(Grant {
            bid,
            host: host.to_string(),
            device: device.to_string(),
        }));
    }

    pub fn mount_ok(&mut self, host: &str, device: &str) {
        self.mount_result(host, device, 0, "");
    }

    pub fn mount_result(&mut self, host: &str, device: &str, status: i32, message: &str) {
        self.mount_replies.push_back(MountReply::Reply(MountResult {
            host: host.to_string(),
            device: device.to_string(),
            status,
            message: message.to_string(),
        }));
    }

    pub fn fail_deallocate(&mut self, reason: &str) {
        self.deallocate_error = Some(reason.to_string());
    }

    /// Whether a call line starting with `prefix` was made.
    pub fn called(&self, prefix: &str) -> bool {
        self.calls.iter().any(|c| c.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn fail(reason: &Option<String>) -> Result<()> {
        match reason {
            Some(reason) => Err(LeaseError::Broker(reason.clone())),
            None => Ok(()),
        }
    }
}

impl Broker for MockBroker {
    fn queue_alloc(&mut self, request: &AllocRequest) -> Result<RequestId> {
        self.calls.push(format!(
            "queue_alloc {} {} {}",
            request.host, request.group, request.device_type
        ));
        Self::fail(&self.queue_error)?;
        Ok(self.next_bid)
    }

    fn alloc_reply(&mut self, timeout: Duration) -> Result<AllocReply> {
        self.calls.push(format!("alloc_reply {}", timeout.as_millis()));
        let reply = self.alloc_replies.pop_front().unwrap_or(AllocReply::TimedOut);
        if let AllocReply::Granted(grant) = &reply {
            self.allocated
                .insert((grant.host.clone(), grant.device.clone()));
        }
        Ok(reply)
    }

    fn alloc_cancel(&mut self, bid: RequestId) -> Result<()> {
        self.calls.push(format!("alloc_cancel {}", bid));
        Self::fail(&self.cancel_error)
    }

    fn deallocate(&mut self, host: &str, device: &str) -> Result<ReleaseStatus> {
        self.calls.push(format!("deallocate {} {}", host, device));
        Self::fail(&self.deallocate_error)?;
        if let Some(path) = self.wedge_on_deallocate.take() {
            std::fs::remove_file(&path).ok();
            std::fs::create_dir_all(path.join("pinned"))
                .map_err(|e| LeaseError::io("wedge", e))?;
        }
        if self.allocated.remove(&(host.to_string(), device.to_string())) {
            Ok(ReleaseStatus::Done)
        } else {
            Ok(ReleaseStatus::AlreadyReleased)
        }
    }

    fn mount_request(&mut self, request: &MountRequest) -> Result<()> {
        self.calls.push(format!(
            "mount {} {} {} {}",
            request.host, request.device, request.volume, request.mode
        ));
        Self::fail(&self.mount_error)
    }

    fn mount_reply(&mut self, timeout: Duration) -> Result<MountReply> {
        self.calls.push(format!("mount_reply {}", timeout.as_millis()));
        Self::fail(&self.mount_reply_error)?;
        let reply = self.mount_replies.pop_front().unwrap_or(MountReply::TimedOut);
        if let MountReply::Reply(result) = &reply {
            self.mounted
                .insert((result.host.clone(), result.device.clone()));
        }
        Ok(reply)
    }

    fn mount_cancel(&mut self, host: &str, device: &str) -> Result<()> {
        self.calls.push(format!("mount_cancel {} {}", host, device));
        Self::fail(&self.mount_cancel_error)
    }

    fn dismount(&mut self, host: &str, device: &str, options: &str) -> Result<ReleaseStatus> {
        self.calls
            .push(format!("dismount {} {} {}", host, device, options).trim_end().to_string());
        Self::fail(&self.dismount_error)?;
        if self.mounted.remove(&(host.to_string(), device.to_string())) {
            Ok(ReleaseStatus::Done)
        } else {
            Ok(ReleaseStatus::AlreadyReleased)
        }
    }

    fn operator_message(&mut self, target: &str, text: &str) -> Result<()> {
        self.calls.push(format!("operator {}", target));
        Self::fail(&self.operator_error)?;
        self.messages.push((target.to_string(), text.to_string()));
        Ok(())
    }

    fn device_file(&mut self, host: &str, device: &str, attribute: &str) -> Result<PathBuf> {
        self.calls
            .push(format!("device_file {} {} {}", host, device, attribute));
        Self::fail(&self.device_file_error)?;
        Ok(self.device_dir.join(format!("{}.{}", host, device)))
    }
}

// ============================================================================
// Tape drive
// ============================================================================

#[derive(Debug, Default)]
struct DriveScript {
    fail_open: Option<String>,
    statuses: VecDeque<DriveStatus>,
    status_error: Option<String>,
    rewind_error: Option<String>,
    unload_error: Option<String>,
    offline_error: Option<String>,
    opens: Vec<(PathBuf, OpenMode)>,
    ops: Vec<String>,
    status_queries: u32,
}

/// Opens `FakeDrive`s that share one script.
///
/// Status polls pop from the scripted queue and report ready once it is
/// empty. Successful control operations are recorded in `ops`.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeOpener {
    script: Rc<RefCell<DriveScript>>,
}

impl FakeOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_open(&self, reason: &str) {
        self.script.borrow_mut().fail_open = Some(reason.to_string());
    }

    /// Report "not ready" for the next `polls` status queries.
    pub fn not_ready_for(&self, polls: usize) {
        let mut script = self.script.borrow_mut();
        for _ in 0..polls {
            script.statuses.push_back(DriveStatus {
                erreg: 0x8000,
                ..DriveStatus::default()
            });
        }
    }

    pub fn fail_status(&self, reason: &str) {
        self.script.borrow_mut().status_error = Some(reason.to_string());
    }

    pub fn fail_rewind(&self, reason: &str) {
        self.script.borrow_mut().rewind_error = Some(reason.to_string());
    }

    pub fn fail_unload(&self, reason: &str) {
        self.script.borrow_mut().unload_error = Some(reason.to_string());
    }

    pub fn ops(&self) -> Vec<String> {
        self.script.borrow().ops.clone()
    }

    pub fn opens(&self) -> Vec<(PathBuf, OpenMode)> {
        self.script.borrow().opens.clone()
    }

    pub fn status_queries(&self) -> u32 {
        self.script.borrow().status_queries
    }
}

impl DriveOpener for FakeOpener {
    fn open(&self, path: &Path, mode: OpenMode) -> Result<Box<dyn TapeDrive>> {
        let mut script = self.script.borrow_mut();
        if let Some(reason) = &script.fail_open {
            return Err(LeaseError::Device(format!(
                "cannot open {}: {}",
                path.display(),
                reason
            )));
        }
        script.opens.push((path.to_path_buf(), mode));
        Ok(Box::new(FakeDrive {
            script: Rc::clone(&self.script),
        }))
    }
}

pub(crate) struct FakeDrive {
    script: Rc<RefCell<DriveScript>>,
}

impl FakeDrive {
    fn control(&mut self, op: &str, error: Option<String>) -> Result<()> {
        match error {
            Some(reason) => Err(LeaseError::Device(format!("{}: {}", op, reason))),
            None => {
                self.script.borrow_mut().ops.push(op.to_string());
                Ok(())
            }
        }
    }
}

impl TapeDrive for FakeDrive {
    fn status(&mut self) -> Result<DriveStatus> {
        let mut script = self.script.borrow_mut();
        script.status_queries += 1;
        if let Some(reason) = &script.status_error {
            return Err(LeaseError::Device(reason.clone()));
        }
        Ok(script.statuses.pop_front().unwrap_or_default())
    }

    fn rewind(&mut self) -> Result<()> {
        let error = self.script.borrow().rewind_error.clone();
        self.control("rewind", error)
    }

    fn unload(&mut self) -> Result<()> {
        let error = self.script.borrow().unload_error.clone();
        self.control("unload", error)
    }

    fn offline(&mut self) -> Result<()> {
        let error = self.script.borrow().offline_error.clone();
        self.control("offline", error)
    }
}

/// Drive settings that never sleep.
pub(crate) fn fast_drive_settings() -> DriveSettings {
    DriveSettings {
        attribute: "8500".to_string(),
        ready_max_attempts: 5,
        settle_attempts: 3,
        poll_interval: Duration::ZERO,
    }
}

// ============================================================================
// Interrupts and processes
// ============================================================================

/// Fires `signal` once `checks_before` polls have gone by.
#[derive(Debug)]
pub(crate) struct ScriptedInterrupt {
    remaining: Cell<u32>,
    signal: i32,
}

impl ScriptedInterrupt {
    pub fn after(checks_before: u32, signal: i32) -> Self {
        Self {
            remaining: Cell::new(checks_before),
            signal,
        }
    }
}

impl Interrupt for ScriptedInterrupt {
    fn pending(&self) -> Option<i32> {
        match self.remaining.get() {
            0 => Some(self.signal),
            n => {
                self.remaining.set(n - 1);
                None
            }
        }
    }
}

/// Reports the owner alive for a fixed number of probes.
#[derive(Debug, Default)]
pub(crate) struct FakeLiveness {
    alive_probes: Cell<u32>,
    pub probes: Cell<u32>,
}

impl FakeLiveness {
    pub fn alive_for(probes: u32) -> Self {
        Self {
            alive_probes: Cell::new(probes),
            probes: Cell::new(0),
        }
    }
}

impl Liveness for FakeLiveness {
    fn is_alive(&self, _pid: u32) -> bool {
        self.probes.set(self.probes.get() + 1);
        match self.alive_probes.get() {
            0 => false,
            n => {
                self.alive_probes.set(n - 1);
                true
            }
        }
    }
}

/// Launcher that writes the lease record itself instead of forking.
#[derive(Debug)]
pub(crate) struct FakeLauncher {
    pub pid: u32,
    pub fail: Option<String>,
    pub launched: Vec<DeviceDescriptor>,
}

impl FakeLauncher {
    pub fn with_pid(pid: u32) -> Self {
        Self {
            pid,
            fail: None,
            launched: Vec::new(),
        }
    }
}

impl WatchdogLauncher for FakeLauncher {
    fn launch(&mut self, dev: &DeviceDescriptor, lease_dir: &Path) -> Result<u32> {
        if let Some(reason) = &self.fail {
            return Err(LeaseError::UserError(reason.clone()));
        }
        let mut leased = dev.clone();
        leased.watchdog_pid = self.pid;
        LeaseRecord::for_drive(lease_dir, &dev.host, &dev.device).write(&leased.token())?;
        self.launched.push(leased);
        Ok(self.pid)
    }
}

// ============================================================================
// Config
// ============================================================================

/// A config whose state and lease directories live in a fresh temp dir.
pub(crate) fn temp_config() -> (TempDir, Config) {
    let temp = TempDir::new().unwrap();
    let config = Config {
        state_dir: temp.path().join("state").to_string_lossy().into_owned(),
        lease_dir: temp.path().join("leases").to_string_lossy().into_owned(),
        registry_path: temp.path().join("devgroups").to_string_lossy().into_owned(),
        reply_poll_ms: 1,
        ..Config::default()
    };
    (temp, config)
}
