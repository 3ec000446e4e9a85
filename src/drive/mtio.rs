//! Linux magnetic tape ioctls (`MTIOCTOP`, `MTIOCGET`).

use super::{DriveOpener, DriveStatus, OpenMode, TapeDrive};
use crate::error::{LeaseError, Result};
use nix::libc::{self, c_int, c_long, c_short};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

const MTREW: c_short = 6;
const MTOFFL: c_short = 7;
const MTUNLOAD: c_short = 31;

/// `struct mtop`
#[repr(C)]
#[derive(Debug, Default)]
pub struct MtOp {
    pub mt_op: c_short,
    pub mt_count: c_int,
}

/// `struct mtget`
#[repr(C)]
#[derive(Debug, Default)]
pub struct MtGet {
    pub mt_type: c_long,
    pub mt_resid: c_long,
    pub mt_dsreg: c_long,
    pub mt_gstat: c_long,
    pub mt_erreg: c_long,
    pub mt_fileno: c_int,
    pub mt_blkno: c_int,
}

nix::ioctl_write_ptr!(mtioctop, b'm', 1, MtOp);
nix::ioctl_read!(mtiocget, b'm', 2, MtGet);

/// A tape device opened through its special file.
#[derive(Debug)]
pub struct MtDrive {
    file: File,
    path: PathBuf,
}

impl MtDrive {
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.read(true);
        if mode == OpenMode::NonBlocking {
            options.custom_flags(libc::O_NONBLOCK);
        }
        let file = options.open(path).map_err(|e| {
            LeaseError::Device(format!("open {} failed: {}", path.display(), e))
        })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    fn operation(&mut self, name: &str, op: c_short) -> Result<()> {
        let request = MtOp {
            mt_op: op,
            mt_count: 1,
        };
        // SAFETY: `request` outlives the call and matches `struct mtop`.
        unsafe { mtioctop(self.file.as_raw_fd(), &request) }.map_err(|e| {
            LeaseError::Device(format!("ioctl {} on {} failed: {}", name, self.path.display(), e))
        })?;
        Ok(())
    }
}

impl TapeDrive for MtDrive {
    fn status(&mut self) -> Result<DriveStatus> {
        let mut raw = MtGet::default();
        // SAFETY: `raw` is a valid, writable `struct mtget`.
        unsafe { mtiocget(self.file.as_raw_fd(), &mut raw) }.map_err(|e| {
            LeaseError::Device(format!("ioctl MTIOCGET on {} failed: {}", self.path.display(), e))
        })?;
        Ok(DriveStatus {
            drive_type: raw.mt_type as i64,
            resid: raw.mt_resid as i64,
            dsreg: raw.mt_dsreg as i64,
            gstat: raw.mt_gstat as i64,
            erreg: raw.mt_erreg as i64,
            fileno: raw.mt_fileno,
            blkno: raw.mt_blkno,
        })
    }

    fn rewind(&mut self) -> Result<()> {
        self.operation("MTREW", MTREW)
    }

    fn unload(&mut self) -> Result<()> {
        self.operation("MTUNLOAD", MTUNLOAD)
    }

    fn offline(&mut self) -> Result<()> {
        self.operation("MTOFFL", MTOFFL)
    }
}

/// Opens real tape devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct MtOpener;

impl DriveOpener for MtOpener {
    fn open(&self, path: &Path, mode: OpenMode) -> Result<Box<dyn TapeDrive>> {
        Ok(Box::new(MtDrive::open(path, mode)?))
    }
}
