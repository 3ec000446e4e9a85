//! Filesystem helpers for the drivelease state files.

pub mod atomic;

pub use atomic::{atomic_write_file, remove_if_exists};
