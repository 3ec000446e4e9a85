//! Atomic replacement of small state files.
//!
//! Lease records are read by watchdogs that may wake at any moment, so a
//! record must never be observed half written. Writes go to a temporary file
//! in the same directory, are synced, and are then renamed over the target;
//! `rename()` is atomic on POSIX when both paths share a filesystem.
//!
//! The temporary file carries the writer's pid so two watchdogs writing the
//! record of the same drive never share a temporary file.

use crate::error::{LeaseError, Result};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Atomically write a string to a file, creating parent directories.
pub fn atomic_write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            LeaseError::io(
                format!("failed to create directory '{}'", parent.display()),
                e,
            )
        })?;
    }

    let temp_path = generate_temp_path(path)?;
    write_and_sync(&temp_path, content.as_bytes())?;
    atomic_replace(&temp_path, path)
}

/// Remove a file, treating "already gone" as success.
///
/// Returns whether a file was actually removed.
pub fn remove_if_exists<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(LeaseError::io(
            format!("failed to remove '{}'", path.display()),
            e,
        )),
    }
}

/// Temporary sibling of `target`: `.{filename}.{pid}.tmp`.
fn generate_temp_path(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            LeaseError::UserError(format!("invalid file path '{}'", target.display()))
        })?;

    Ok(parent.join(format!(".{}.{}.tmp", filename, std::process::id())))
}

fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        LeaseError::io(
            format!("failed to create temporary file '{}'", path.display()),
            e,
        )
    })?;

    let written = file.write_all(content).and_then(|()| file.sync_all());
    if let Err(e) = written {
        let _ = fs::remove_file(path);
        return Err(LeaseError::io(
            format!("failed to write temporary file '{}'", path.display()),
            e,
        ));
    }

    Ok(())
}

fn atomic_replace(source: &Path, target: &Path) -> Result<()> {
    fs::rename(source, target).map_err(|e| {
        let _ = fs::remove_file(source);
        LeaseError::io(
            format!("failed to atomically replace '{}'", target.display()),
            e,
        )
    })?;

    // Persist the directory entry as well.
    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}
