//! Diagnostic logging setup.
//!
//! Commands run from scripts and cron jobs, and watchdogs run with their
//! standard streams on `/dev/null`, so the durable diagnostic channel is a
//! plain-text log file in the state directory. Echoing to stderr is opt-in.

use crate::config::Config;
use crate::error::{LeaseError, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Where diagnostics go for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Log file appended to, if it can be opened.
    pub log_file: Option<PathBuf>,
    /// Mirror diagnostics on stderr.
    pub echo_stderr: bool,
}

impl LogSettings {
    /// File logging into the configured state directory; stderr only when
    /// asked for or when `RUST_LOG` is set.
    pub fn from_config(config: &Config, echo: bool) -> Self {
        Self {
            log_file: Some(config.log_file()),
            echo_stderr: echo || std::env::var_os("RUST_LOG").is_some(),
        }
    }

    /// No log file; stderr only when `RUST_LOG` is set.
    pub fn stderr_only() -> Self {
        Self {
            log_file: None,
            echo_stderr: std::env::var_os("RUST_LOG").is_some(),
        }
    }
}

/// Install the global subscriber.
pub fn init(settings: &LogSettings) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = settings
        .log_file
        .as_deref()
        .and_then(open_log_file)
        .map(|file| {
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
        });

    let stderr_layer = settings.echo_stderr.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| LeaseError::Config(format!("failed to initialize logging: {}", e)))
}

/// Open `path` for appending, creating its directory. `None` when that is
/// not possible; logging must never stop a command.
pub(crate) fn open_log_file(path: &Path) -> Option<File> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
        && fs::create_dir_all(dir).is_err()
    {
        return None;
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}
