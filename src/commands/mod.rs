//! Command implementations for drivelease.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Lease commands resolve a `LeaseContext` from the
//! configuration first; the direct drive commands need none.

mod allocate;
mod deallocate;
mod device;
mod drive;
mod notify;

use crate::cli::Command;
use crate::context::LeaseContext;
use crate::error::{LeaseError, Result};
use drive::DriveOp;

/// Dispatch a command to its implementation.
pub fn dispatch(ctx: &LeaseContext, command: Command) -> Result<()> {
    match command {
        Command::Allocate(args) => allocate::cmd_allocate(ctx, args),
        Command::Device(args) => device::cmd_device(ctx, args),
        Command::Deallocate(args) => deallocate::cmd_deallocate(ctx, args),
        Command::Notify(args) => notify::cmd_notify(ctx, args),
        direct => dispatch_direct(direct),
    }
}

/// Dispatch one of the direct drive commands, which run without a context.
pub fn dispatch_direct(command: Command) -> Result<()> {
    match command {
        Command::Check(args) => drive::cmd_check(args),
        Command::Rewind(args) => drive::cmd_drive_op(args, DriveOp::Rewind),
        Command::Unload(args) => drive::cmd_drive_op(args, DriveOp::Unload),
        Command::Offline(args) => drive::cmd_drive_op(args, DriveOp::Offline),
        other => Err(LeaseError::UserError(format!(
            "{:?} needs the drivelease configuration",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::DriveArgs;
    use std::path::PathBuf;

    #[test]
    fn test_direct_commands_run_without_config() {
        let command = Command::Check(DriveArgs {
            device: PathBuf::from("/nonexistent/drivelease/nst0"),
        });
        assert!(!command.needs_config());

        let err = dispatch_direct(command).unwrap_err();

        assert!(matches!(err, LeaseError::Device(_)));
    }
}
