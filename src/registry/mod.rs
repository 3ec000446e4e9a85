//! Device group registry.
//!
//! Maps a logical group name to the host and device type the broker should be
//! asked for. The source is line oriented:
//!
//! ```text
//! # group    host     device   [flags]
//! tapes-a    robot1   drv3
//! tapes-b    robot2   lto      notready
//! ```
//!
//! The file is read again on every lookup. The first matching row wins and
//! lines starting with `#` are ignored.


use crate::lease::DeviceFlags;
use std::fs;
use std::path::{Path, PathBuf};

/// One registry row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceGroupEntry {
    pub group: String,
    pub host: String,
    pub device: String,
    pub flags: DeviceFlags,
}

impl DeviceGroupEntry {
    /// Parse one line; `None` for comments, blank lines, and short rows.
    pub fn parse_line(line: &str) -> Option<Self> {
        if line.starts_with('#') {
            return None;
        }
        let mut fields = line.split_whitespace();
        let group = fields.next()?;
        let host = fields.next()?;
        let device = fields.next()?;
        let flags = fields
            .next()
            .map(DeviceFlags::from_registry_token)
            .unwrap_or_default();

        Some(Self {
            group: group.to_string(),
            host: host.to_string(),
            device: device.to_string(),
            flags,
        })
    }
}

/// Registry backed by a configuration file.
#[derive(Debug, Clone)]
pub struct DeviceGroupRegistry {
    path: PathBuf,
}

impl DeviceGroupRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up `group`. An unreadable source resolves nothing, same as a
    /// missing row; callers fall back to an unconstrained request.
    pub fn resolve(&self, group: &str) -> Option<DeviceGroupEntry> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(
                    path = %self.path.display(),
                    error = %e,
                    "device group registry not readable"
                );
                return None;
            }
        };

        resolve_in(&content, group)
    }
}

/// First row of `content` whose group is `group`.
pub fn resolve_in(content: &str, group: &str) -> Option<DeviceGroupEntry> {
    content
        .lines()
        .filter_map(DeviceGroupEntry::parse_line)
        .find(|entry| entry.group == group)
}
