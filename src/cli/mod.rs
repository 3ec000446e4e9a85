//! CLI argument parsing for drivelease.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.
//!
//! The binary is also reachable through links named `drivelease-<command>`
//! (or `drivelease_<command>`), in which case the suffix selects the command.

use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Program name used in usage text.
pub const PROGRAM: &str = "drivelease";

/// Device attribute selected when `device` gets only a token.
pub const DEFAULT_ATTRIBUTE: &str = "default";

/// Drivelease: crash-safe leases on shared tape drives.
///
/// `allocate` leases a drive, mounts a volume and prints a lease token;
/// the token is passed to every later command. A detached watchdog releases
/// the drive if the caller goes away without `deallocate`.
#[derive(Parser, Debug)]
#[command(name = "drivelease")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (default: $DRIVELEASE_CONFIG or /etc/drivelease/config.yaml).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for drivelease.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lease a drive and mount a volume on it.
    ///
    /// Prints the lease token on success.
    Allocate(AllocateArgs),

    /// Print the device file of a leased drive.
    Device(DeviceArgs),

    /// Release a lease: dismount, deallocate, open the door.
    Deallocate(TokenArgs),

    /// Send a message to the operator about a lease.
    Notify(NotifyArgs),

    /// Print the status registers of a drive.
    Check(DriveArgs),

    /// Rewind a drive.
    Rewind(DriveArgs),

    /// Rewind and unload a drive.
    Unload(DriveArgs),

    /// Take a drive offline.
    Offline(DriveArgs),
}

/// Arguments for the `allocate` command.
#[derive(Args, Debug)]
pub struct AllocateArgs {
    /// Allocation and mount timeout in minutes (0 or less: configured default).
    #[arg(short = 'n', long = "timeout", allow_negative_numbers = true, value_name = "MINUTES")]
    pub timeout_minutes: Option<i64>,

    /// Mount the volume read-only (default).
    #[arg(short = 'r', long = "read", conflicts_with = "write")]
    pub read: bool,

    /// Mount the volume for writing.
    #[arg(short = 'w', long = "write")]
    pub write: bool,

    /// Ask the operator to accept overwriting the volume.
    #[arg(short = 'x', long = "overwrite")]
    pub overwrite: bool,

    /// Echo diagnostics on stderr.
    #[arg(short = 'e', long = "echo")]
    pub echo: bool,

    /// Label of the volume to mount.
    pub volume: String,

    /// Device group to take the drive from.
    #[arg(default_value = "any")]
    pub group: String,
}

/// Arguments for the `device` command.
#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Device attribute spec, or the lease token when given alone.
    pub first: String,

    /// Lease token.
    pub second: Option<String>,
}

impl DeviceArgs {
    /// `(attribute, token)`; the attribute defaults to `default`.
    ///
    /// A lone argument without a `.` cannot be a token, which most likely
    /// means the token was forgotten.
    pub fn attribute_and_token(&self) -> Result<(&str, &str), String> {
        match &self.second {
            Some(token) => Ok((self.first.as_str(), token.as_str())),
            None if self.first.contains('.') => Ok((DEFAULT_ATTRIBUTE, self.first.as_str())),
            None => Err(format!("illegal device handle '{}'", self.first)),
        }
    }
}

/// Arguments for commands taking only a lease token.
#[derive(Args, Debug)]
pub struct TokenArgs {
    /// Lease token printed by `allocate`.
    pub token: String,
}

/// Arguments for the `notify` command.
#[derive(Args, Debug)]
pub struct NotifyArgs {
    /// Lease token printed by `allocate`.
    pub token: String,

    /// Message for the operator.
    #[arg(required = true, num_args = 1..)]
    pub message: Vec<String>,
}

impl NotifyArgs {
    pub fn text(&self) -> String {
        self.message.join(" ")
    }
}

/// Arguments for the direct drive commands.
#[derive(Args, Debug)]
pub struct DriveArgs {
    /// Device special file, e.g. /dev/nst0.
    pub device: PathBuf,
}

const COMMANDS: [&str; 8] = [
    "allocate",
    "device",
    "deallocate",
    "notify",
    "check",
    "rewind",
    "unload",
    "offline",
];

/// Rewrite `drivelease-<command> args...` into `drivelease <command> args...`.
///
/// Any other invocation is returned unchanged.
pub fn expand_multi_call(mut args: Vec<OsString>) -> Vec<OsString> {
    let Some(argv0) = args.first() else {
        return args;
    };
    let Some(name) = Path::new(argv0).file_name().and_then(|n| n.to_str()) else {
        return args;
    };
    let command = [format!("{}-", PROGRAM), format!("{}_", PROGRAM)]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix.as_str()))
        .filter(|suffix| COMMANDS.contains(suffix))
        .map(str::to_string);

    if let Some(command) = command {
        args[0] = OsString::from(PROGRAM);
        args.insert(1, OsString::from(command));
    }
    args
}

impl Command {
    /// Whether the command needs the configuration. The direct drive
    /// commands work on a device special file and need none.
    pub fn needs_config(&self) -> bool {
        !matches!(
            self,
            Command::Check(_) | Command::Rewind(_) | Command::Unload(_) | Command::Offline(_)
        )
    }
}

impl Cli {
    /// Parse command line arguments, honoring multi-call links.
    pub fn parse_args() -> Self {
        Cli::parse_from(expand_multi_call(std::env::args_os().collect()))
    }
}
