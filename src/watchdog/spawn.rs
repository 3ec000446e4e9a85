//! Forking the watchdog of a freshly leased drive.

use super::{ProcessProbe, Watchdog, WatchOutcome, WatchdogLauncher};
use crate::broker::CommandBroker;
use crate::config::Config;
use crate::drive::{DriveSettings, MtOpener};
use crate::error::{LeaseError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::lease::{DeviceDescriptor, LeaseRecord};
use crate::recovery::SignalTrap;
use crate::release::Releaser;
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::waitpid;
use nix::unistd::{ForkResult, Pid, dup2, fork, getpid, pipe, setsid};
use serde_json::json;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// Byte the watchdog sends once the lease record is on disk.
const RECORD_WRITTEN: u8 = b'+';

const HANDSHAKE_POLL: Duration = Duration::from_millis(20);

/// Launches the watchdog as a detached child process.
pub struct ForkLauncher<'a> {
    config: &'a Config,
}

impl<'a> ForkLauncher<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }
}

impl WatchdogLauncher for ForkLauncher<'_> {
    fn launch(&mut self, dev: &DeviceDescriptor, lease_dir: &Path) -> Result<u32> {
        let (read_end, write_end) =
            pipe().map_err(|e| LeaseError::UserError(format!("failed to create pipe: {}", e)))?;

        // SAFETY: the allocate command is single-threaded; the child only
        // uses the state it inherits from this one thread.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                drop(read_end);
                let code = run_child(self.config, dev, lease_dir, write_end);
                std::process::exit(code);
            }
            Ok(ForkResult::Parent { child }) => {
                drop(write_end);
                let record = LeaseRecord::for_drive(lease_dir, &dev.host, &dev.device);
                let pid = confirm_child(child, read_end, self.config.watchdog_handshake(), &record)?;
                tracing::info!(drive = %dev.drive_name(), watchdog = pid, "watchdog started");
                Ok(pid)
            }
            Err(e) => Err(LeaseError::UserError(format!(
                "failed to fork watchdog: {}",
                e
            ))),
        }
    }
}

/// Wait for `child` to confirm its lease record. A child that does not
/// confirm is killed and reaped before its record is removed, so it cannot
/// write the record again afterwards.
fn confirm_child(
    child: Pid,
    read_end: OwnedFd,
    timeout: Duration,
    record: &LeaseRecord,
) -> Result<u32> {
    match await_handshake(read_end, timeout) {
        Ok(()) => Ok(child.as_raw() as u32),
        Err(e) => {
            tracing::error!(watchdog = child.as_raw(), error = %e, "watchdog handshake failed");
            let _ = kill(child, Signal::SIGKILL);
            let _ = waitpid(child, None);
            if let Err(err) = record.delete() {
                tracing::warn!(error = %err, "failed to remove lease record");
            }
            Err(e)
        }
    }
}

/// Wait for the watchdog's confirmation byte.
fn await_handshake(read_end: OwnedFd, timeout: Duration) -> Result<()> {
    fcntl(read_end.as_raw_fd(), FcntlArg::F_SETFL(OFlag::O_NONBLOCK)).map_err(|e| {
        LeaseError::UserError(format!("failed to configure watchdog pipe: {}", e))
    })?;
    let mut pipe = File::from(read_end);
    let deadline = Instant::now() + timeout;
    let mut byte = [0u8; 1];

    loop {
        match pipe.read(&mut byte) {
            Ok(0) => {
                return Err(LeaseError::UserError(
                    "watchdog exited before recording the lease".to_string(),
                ));
            }
            Ok(_) if byte[0] == RECORD_WRITTEN => return Ok(()),
            Ok(_) => {
                return Err(LeaseError::UserError(
                    "unexpected reply from watchdog".to_string(),
                ));
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(LeaseError::io("failed to read from watchdog", e)),
        }
        if Instant::now() >= deadline {
            return Err(LeaseError::UserError(format!(
                "watchdog did not record the lease within {} seconds",
                timeout.as_secs()
            )));
        }
        thread::sleep(HANDSHAKE_POLL);
    }
}

/// Body of the watchdog process. Returns its exit status.
fn run_child(config: &Config, dev: &DeviceDescriptor, lease_dir: &Path, write_end: OwnedFd) -> i32 {
    // Paths are fixed before detach() leaves the caller's directory.
    let (lease_dir, events_file) =
        match (std::path::absolute(lease_dir), std::path::absolute(config.events_file())) {
            (Ok(lease_dir), Ok(events_file)) => (lease_dir, events_file),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "watchdog failed to resolve its paths");
                return 1;
            }
        };
    if let Err(e) = detach() {
        tracing::error!(error = %e, "watchdog failed to detach");
        return 1;
    }

    let mut lease = dev.clone();
    lease.watchdog_pid = getpid().as_raw() as u32;
    let record = LeaseRecord::for_drive(&lease_dir, &lease.host, &lease.device);
    if let Err(e) = record.write(&lease.token()) {
        tracing::error!(error = %e, "watchdog failed to write lease record");
        return 1;
    }
    let mut pipe = File::from(write_end);
    if let Err(e) = pipe.write_all(&[RECORD_WRITTEN]) {
        tracing::error!(error = %e, "watchdog failed to confirm lease record");
        return 1;
    }
    drop(pipe);

    match supervise(config, lease, record, &events_file) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "watchdog failed");
            1
        }
    }
}

/// New session, root working directory, default signal handling, standard
/// streams on `/dev/null`.
fn detach() -> Result<()> {
    setsid().map_err(|e| LeaseError::UserError(format!("setsid failed: {}", e)))?;
    std::env::set_current_dir("/").map_err(|e| LeaseError::io("failed to change to /", e))?;
    SignalTrap::restore_defaults()?;

    let null = OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")
        .map_err(|e| LeaseError::io("failed to open /dev/null", e))?;
    for target in 0..=2 {
        dup2(null.as_raw_fd(), target)
            .map_err(|e| LeaseError::UserError(format!("failed to redirect fd {}: {}", target, e)))?;
    }
    Ok(())
}

fn supervise(
    config: &Config,
    lease: DeviceDescriptor,
    record: LeaseRecord,
    events_file: &Path,
) -> Result<()> {
    let probe = ProcessProbe;
    let watchdog = Watchdog::new(lease, record, &probe, config.watchdog_interval());
    watchdog.wait_for_owner_exit();

    let mut broker = CommandBroker::from_config(config)?;
    let opener = MtOpener;
    let settings = DriveSettings::from_config(config);
    let mut releaser = Releaser::new(&mut broker, &opener, &settings);
    let outcome = watchdog.settle(&mut releaser, &config.reclaim_target)?;

    if let WatchOutcome::Reclaimed {
        report,
        notice,
        notified,
    } = &outcome
    {
        EventLog::new(events_file.to_path_buf()).record(
            Event::new(EventAction::Reclaim)
                .with_lease(&watchdog.lease().token())
                .with_details(json!({
                    "owner_pid": watchdog.lease().owner_pid,
                    "already_released": report.was_already_released(),
                    "door_failures": report.door.failures,
                    "notice": notice,
                    "notified": notified,
                })),
        );
    }
    tracing::info!(outcome = ?outcome, "watchdog done");
    Ok(())
}
