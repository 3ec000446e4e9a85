//! Request/timeout/cancel protocols against the broker.
//!
//! Both engines block on the broker's reply channel in slices of the
//! configured poll length, so a pending termination signal is noticed within
//! one slice. A request that times out is always cancelled on the broker
//! side before the engine gives up.

mod allocation;
mod mount;


pub use allocation::AllocationEngine;
pub use mount::{MountEngine, MountSpec};

use crate::error::Result;
use crate::recovery::Interrupt;
use std::time::{Duration, Instant};

/// How a sliced wait ended.
#[derive(Debug, PartialEq, Eq)]
enum Waited<T> {
    Reply(T),
    TimedOut,
    Interrupted(i32),
}

/// Call `poll_once` with slices of at most `slice` until it yields a value,
/// `timeout` has elapsed, or a signal is pending. `poll_once` is called at
/// least once, even for a zero timeout.
///
/// A failed poll while a signal is pending counts as the interruption: the
/// signal is the likely reason the poll failed.
fn wait_sliced<T>(
    interrupt: &dyn Interrupt,
    slice: Duration,
    timeout: Duration,
    mut poll_once: impl FnMut(Duration) -> Result<Option<T>>,
) -> Result<Waited<T>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(signal) = interrupt.pending() {
            return Ok(Waited::Interrupted(signal));
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        match poll_once(slice.min(remaining)) {
            Ok(Some(reply)) => return Ok(Waited::Reply(reply)),
            Ok(None) => {}
            Err(e) => {
                return match interrupt.pending() {
                    Some(signal) => {
                        tracing::debug!(error = %e, signal, "broker poll failed after signal");
                        Ok(Waited::Interrupted(signal))
                    }
                    None => Err(e),
                };
            }
        }
        if Instant::now() >= deadline {
            return Ok(Waited::TimedOut);
        }
    }
}
