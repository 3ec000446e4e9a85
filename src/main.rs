//! Drivelease: crash-safe leases on shared tape drives.
//!
//! This is the main entry point for the `drivelease` CLI. It parses
//! arguments, loads the configuration, sets up logging, dispatches to the
//! appropriate command handler, and handles errors with proper exit codes.

mod cli;
mod commands;
pub mod broker;
pub mod config;
pub mod context;
pub mod drive;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fs;
pub mod lease;
pub mod logging;
pub mod protocol;
pub mod recovery;
pub mod registry;
pub mod release;
pub mod watchdog;

#[cfg(test)]
mod test_support;

use cli::{Cli, Command};
use context::LeaseContext;
use logging::LogSettings;
use std::process::ExitCode;

fn init_logging(settings: &LogSettings) {
    if let Err(e) = logging::init(settings) {
        eprintln!("warning: {}", e);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    let echo = matches!(&cli.command, Command::Allocate(args) if args.echo);

    let result = if cli.command.needs_config() {
        LeaseContext::resolve(cli.config.as_deref()).and_then(|ctx| {
            init_logging(&LogSettings::from_config(&ctx.config, echo));
            commands::dispatch(&ctx, cli.command)
        })
    } else {
        init_logging(&LogSettings::stderr_only());
        commands::dispatch_direct(cli.command)
    };

    match result {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            // Return appropriate exit code
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
