//! Termination signal capture.

use crate::error::{LeaseError, Result};
use nix::libc::c_int;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Signals that end a hold on a drive.
pub const TRAPPED_SIGNALS: [Signal; 6] = [
    Signal::SIGTERM,
    Signal::SIGUSR1,
    Signal::SIGUSR2,
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGHUP,
];

/// Longest stretch a sleeping wait goes without looking at the trap.
const PAUSE_SLICE: Duration = Duration::from_millis(100);

/// First trapped signal number, 0 while none arrived.
static PENDING: AtomicI32 = AtomicI32::new(0);

extern "C" fn record_signal(signal: c_int) {
    // Only the first signal counts; async-signal-safe store only.
    let _ = PENDING.compare_exchange(0, signal, Ordering::SeqCst, Ordering::SeqCst);
}

/// Source of asynchronous termination requests.
pub trait Interrupt {
    /// The signal that asked us to stop, if any.
    fn pending(&self) -> Option<i32>;

    /// `Err(Interrupted)` once a signal is pending.
    fn check(&self) -> Result<()> {
        match self.pending() {
            Some(signal) => Err(LeaseError::Interrupted(signal)),
            None => Ok(()),
        }
    }
}

/// Process-wide handler for the trapped signals.
#[derive(Debug)]
pub struct SignalTrap {
    _private: (),
}

impl SignalTrap {
    /// Route the trapped signals into the pending-signal record.
    pub fn install() -> Result<Self> {
        let action = SigAction::new(
            SigHandler::Handler(record_signal),
            SaFlags::empty(),
            SigSet::empty(),
        );
        for signal in TRAPPED_SIGNALS {
            // SAFETY: the handler performs a single atomic store.
            unsafe { sigaction(signal, &action) }.map_err(|e| {
                LeaseError::UserError(format!("failed to install handler for {}: {}", signal, e))
            })?;
        }
        Ok(Self { _private: () })
    }

    /// Put the trapped signals back to their default dispositions and
    /// forget any pending one. SIGHUP is ignored instead.
    pub fn restore_defaults() -> Result<()> {
        for signal in TRAPPED_SIGNALS {
            let handler = if signal == Signal::SIGHUP {
                SigHandler::SigIgn
            } else {
                SigHandler::SigDfl
            };
            let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());
            // SAFETY: installs a default or ignore disposition, no handler code.
            unsafe { sigaction(signal, &action) }.map_err(|e| {
                LeaseError::UserError(format!("failed to reset handler for {}: {}", signal, e))
            })?;
        }
        PENDING.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Raw pending signal record, also usable without an installed trap.
    pub fn pending_signal() -> Option<i32> {
        match PENDING.load(Ordering::SeqCst) {
            0 => None,
            signal => Some(signal),
        }
    }
}

impl Interrupt for SignalTrap {
    fn pending(&self) -> Option<i32> {
        Self::pending_signal()
    }
}

/// An interrupt source that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverInterrupted;

impl Interrupt for NeverInterrupted {
    fn pending(&self) -> Option<i32> {
        None
    }
}

/// Sleep for `duration`, returning early with `Interrupted` when a signal
/// arrives.
pub fn pause(interrupt: &dyn Interrupt, duration: Duration) -> Result<()> {
    let deadline = Instant::now() + duration;
    loop {
        interrupt.check()?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        thread::sleep(PAUSE_SLICE.min(deadline - now));
    }
}

#[cfg(test)]
pub(crate) fn clear_pending_for_tests() {
    PENDING.store(0, Ordering::SeqCst);
}
