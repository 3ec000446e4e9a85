//! Detached supervision of a handed-off lease.
//!
//! After a successful allocate, the lease is owned by the caller's process
//! and guarded by a watchdog process that outlives the allocating command.
//! The watchdog shares no memory with anyone: it talks to the broker and to
//! the lease record, nothing else.
//!
//! # Lifecycle
//!
//! 1. `spawn` forks and detaches the watchdog, which writes the lease record
//!    and confirms it over a pipe before the token is printed.
//! 2. `monitor` probes the owner until it is gone.
//! 3. The record decides: missing (released), superseded (a newer lease owns
//!    the drive), or current (abandoned, reclaim it).

mod monitor;
mod spawn;

#[cfg(test)]
mod tests;

pub use monitor::{Watchdog, WatchOutcome, reclaim_notice};
pub use spawn::ForkLauncher;

use crate::error::Result;
use crate::lease::DeviceDescriptor;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::path::Path;

/// Tells whether a process still exists.
pub trait Liveness {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Probes with a null signal, which checks existence without delivering
/// anything to the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessProbe;

impl Liveness for ProcessProbe {
    fn is_alive(&self, pid: u32) -> bool {
        // kill(0, ..) would address our own process group.
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        if raw <= 0 {
            return false;
        }
        match kill(Pid::from_raw(raw), None) {
            Ok(()) => true,
            // Exists, but belongs to someone else.
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}

/// Starts the watchdog of a freshly leased drive.
///
/// On success the lease record under `lease_dir` holds the lease's token with
/// the returned watchdog pid filled in.
pub trait WatchdogLauncher {
    fn launch(&mut self, dev: &DeviceDescriptor, lease_dir: &Path) -> Result<u32>;
}
