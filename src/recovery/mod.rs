//! Crash-safe recovery for the leasing process.
//!
//! Termination signals only record themselves (`signals`); every blocking
//! wait polls that record through the `Interrupt` trait and turns a pending
//! signal into `LeaseError::Interrupted`. Protocol failures and interruptions
//! then travel the same way: up to the allocate command, which hands the
//! error's tag to the single `RecoveryController`.
//!
//! # Tags
//!
//! - tag < 1000: a signal number; the drive is released and the process
//!   exits with `INTERRUPTED`
//! - tag >= 1000: a deliberate abort; the drive is released and the process
//!   exits with `tag - 1000`

mod controller;
mod signals;


pub use controller::RecoveryController;
pub use signals::{Interrupt, NeverInterrupted, SignalTrap, pause};
