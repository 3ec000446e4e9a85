//! Exit code constants for the drivelease CLI.
//!
//! - 0: Success
//! - 1: Failure (broker rejection, mount failure, bad handle, delivery failure)
//! - 2: Usage error (reported by clap)
//! - 3: Timeout (broker or drive did not answer in time)
//! - 4: Interrupted (termination signal while holding a drive)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// Any fatal failure that is not a timeout or an interruption.
pub const FAILURE: i32 = 1;

/// Bad command line. clap exits with this code on its own.
pub const USAGE: i32 = 2;

/// The broker or the drive did not respond within the configured bound.
pub const TIMEOUT: i32 = 3;

/// The leasing process was asked to terminate while it held a drive.
pub const INTERRUPTED: i32 = 4;
