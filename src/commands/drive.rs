//! Direct drive commands: `check`, `rewind`, `unload`, `offline`.
//!
//! These talk to the device special file only; no lease or broker is
//! involved. A device that cannot be opened is an error, while a control
//! operation that the drive refuses is reported and not treated as one.

use crate::cli::DriveArgs;
use crate::drive::{DriveOpener, MtOpener, OpenMode, TapeDrive};
use crate::error::Result;
use std::path::Path;

/// Control operations available as commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOp {
    Rewind,
    Unload,
    Offline,
}

impl DriveOp {
    fn name(self) -> &'static str {
        match self {
            DriveOp::Rewind => "rewind",
            DriveOp::Unload => "unload",
            DriveOp::Offline => "offline",
        }
    }

    fn apply(self, drive: &mut dyn TapeDrive) -> Result<()> {
        match self {
            DriveOp::Rewind => drive.rewind(),
            DriveOp::Unload => drive.unload(),
            DriveOp::Offline => drive.offline(),
        }
    }
}

pub fn cmd_check(args: DriveArgs) -> Result<()> {
    print!("{}", check_report(&MtOpener, &args.device)?);
    Ok(())
}

pub fn cmd_drive_op(args: DriveArgs, op: DriveOp) -> Result<()> {
    println!("{}", run_drive_op(&MtOpener, &args.device, op)?);
    Ok(())
}

/// Status registers of the drive at `path`, one per line.
pub(crate) fn check_report(opener: &dyn DriveOpener, path: &Path) -> Result<String> {
    let mut drive = opener.open(path, OpenMode::Blocking)?;
    let status = drive.status()?;
    Ok(format!(
        "type   : {}\ndsreg  : {}\nerreg  : {}\nresid  : {}\nfileno : {}\nblkno  : {}\n",
        status.drive_type, status.dsreg, status.erreg, status.resid, status.fileno, status.blkno
    ))
}

/// Apply `op` to the drive at `path` and describe the result.
pub(crate) fn run_drive_op(opener: &dyn DriveOpener, path: &Path, op: DriveOp) -> Result<String> {
    let mut drive = opener.open(path, OpenMode::NonBlocking)?;
    match op.apply(drive.as_mut()) {
        Ok(()) => {
            tracing::info!(device = %path.display(), op = op.name(), "drive operation done");
            Ok(format!("{} {}: ok", op.name(), path.display()))
        }
        Err(e) => {
            tracing::warn!(device = %path.display(), op = op.name(), error = %e, "drive operation failed");
            Ok(format!("{} {}: {}", op.name(), path.display(), e))
        }
    }
}
