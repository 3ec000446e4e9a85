//! The per-drive lease record.

use super::token::LeaseToken;
use crate::error::{LeaseError, Result};
use crate::fs::{atomic_write_file, remove_if_exists};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// What a watchdog finds when it reads the record back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    /// No record: the lease was released explicitly.
    Missing,
    /// The record names a different lease on the same drive.
    Superseded(String),
    /// The record still names this lease.
    Current,
}

/// Handle on the record file of one physical drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRecord {
    path: PathBuf,
}

impl LeaseRecord {
    /// The record of drive `host.device` inside `lease_dir`.
    ///
    /// Every lease of the same drive maps to the same path.
    pub fn for_drive(lease_dir: &Path, host: &str, device: &str) -> Self {
        Self {
            path: lease_dir.join(format!("{}.{}", host, device)),
        }
    }

    pub fn for_token(lease_dir: &Path, token: &LeaseToken) -> Self {
        Self::for_drive(lease_dir, &token.host, &token.device)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `token` as the current owner of the drive, replacing any older
    /// record.
    pub fn write(&self, token: &LeaseToken) -> Result<()> {
        atomic_write_file(&self.path, &format!("{}\n", token))
    }

    /// Read the recorded token line, `None` if there is no record.
    pub fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(
                content.lines().next().unwrap_or_default().trim().to_string(),
            )),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LeaseError::io(
                format!("failed to read lease record '{}'", self.path.display()),
                e,
            )),
        }
    }

    /// Compare the record against the lease identified by `token`.
    pub fn check(&self, token: &LeaseToken) -> Result<RecordState> {
        let expected = token.to_string();
        Ok(match self.read()? {
            None => RecordState::Missing,
            Some(line) if line == expected => RecordState::Current,
            Some(line) => RecordState::Superseded(line),
        })
    }

    /// Delete the record. Returns whether a record existed.
    pub fn delete(&self) -> Result<bool> {
        remove_if_exists(&self.path)
    }
}
