//! Audit event log for drivelease.
//!
//! Every lease transition is appended to an NDJSON file
//! (`<state_dir>/events.ndjson`, one JSON object per line) so an operator can
//! reconstruct who held which drive and how each lease ended, including
//! leases that were reclaimed by a watchdog long after the owner was gone.
//!
//! # Event Format
//!
//! Each event is a JSON object with the following fields:
//! - `ts`: RFC3339 timestamp
//! - `action`: The action performed (allocate, release, reclaim, etc.)
//! - `actor`: The owner string (e.g., `user@HOST`)
//! - `lease`: Optional lease token the event belongs to
//! - `details`: Freeform object with action-specific details
//!
//! Appending is best effort for callers: a lease is never refused or kept
//! because its audit line could not be written. Use [`EventLog::record`] for
//! that; [`append_event`] reports the failure to the caller.

use crate::error::{LeaseError, Result};
use crate::lease::LeaseToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Drive leased and handed to a watchdog
    Allocate,
    /// Allocate command failed
    AllocateFailed,
    /// Explicit deallocate
    Release,
    /// Watchdog reclaimed an abandoned lease
    Reclaim,
    /// Operator message sent for a lease
    Notify,
    /// Recovery point released a drive after a failure or signal
    Recover,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Allocate => write!(f, "allocate"),
            EventAction::AllocateFailed => write!(f, "allocate_failed"),
            EventAction::Release => write!(f, "release"),
            EventAction::Reclaim => write!(f, "reclaim"),
            EventAction::Notify => write!(f, "notify"),
            EventAction::Recover => write!(f, "recover"),
        }
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: EventAction,

    /// The actor who performed the action (e.g., `user@HOST`).
    pub actor: String,

    /// Lease token for lease-specific events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease: Option<String>,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl Event {
    /// Create a new event with the given action, stamped now and attributed
    /// to USER@HOSTNAME.
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: get_actor_string(),
            lease: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_lease(mut self, token: &LeaseToken) -> Self {
        self.lease = Some(token.to_string());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| LeaseError::UserError(format!("failed to serialize event to JSON: {}", e)))
    }
}

/// Get the actor string for event metadata.
fn get_actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Append an event to the NDJSON file at `events_file`, creating the file
/// and its directory as needed.
pub fn append_event(events_file: &Path, event: &Event) -> Result<()> {
    let json_line = event.to_ndjson_line()?;

    if let Some(dir) = events_file.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir).map_err(|e| {
            LeaseError::io(
                format!("failed to create events directory '{}'", dir.display()),
                e,
            )
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(events_file)
        .map_err(|e| {
            LeaseError::io(
                format!("failed to open events file '{}'", events_file.display()),
                e,
            )
        })?;

    writeln!(file, "{}", json_line).map_err(|e| {
        LeaseError::io(
            format!("failed to write event to '{}'", events_file.display()),
            e,
        )
    })?;

    file.sync_all().map_err(|e| {
        LeaseError::io(
            format!("failed to sync events file '{}'", events_file.display()),
            e,
        )
    })?;

    Ok(())
}

/// The audit log of one state directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `event`; a failure is logged and otherwise ignored.
    pub fn record(&self, event: Event) {
        if let Err(e) = append_event(&self.path, &event) {
            tracing::warn!(action = %event.action, error = %e, "failed to append audit event");
        }
    }

    /// All events in file order. Unparsable lines are skipped.
    pub fn read_all(&self) -> Result<Vec<Event>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(LeaseError::io(
                    format!("failed to read events file '{}'", self.path.display()),
                    e,
                ));
            }
        };
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}
