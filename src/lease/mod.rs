//! Lease data model.
//!
//! A lease is one exclusive hold on one physical drive. It lives in three
//! shapes:
//! - `DeviceDescriptor`: the in-memory state while a command works on it
//! - `LeaseToken`: the `host.device.ownerPID.watchdogPID` handle printed for
//!   the caller and passed back to every later command
//! - the lease record: a one-line file per `(host, device)` holding the token
//!   of the lease that currently owns the drive
//!
//! # Lease Records
//!
//! Records live in the configured lease directory, one file per drive named
//! `host.device`. A record only ever moves forward (a newer lease overwrites
//! it) or disappears (explicit release), which is what lets a watchdog decide
//! with a single read whether an abandoned lease is still its own.

mod descriptor;
mod record;
mod token;

#[cfg(test)]
mod tests;

pub use descriptor::{DeviceDescriptor, DeviceFlags};
pub use record::{LeaseRecord, RecordState};
pub use token::{LeaseToken, MalformedToken};
