//! Exclusive lock held for the duration of a flashing run.
//!
//! Two flashing runs against the same device must never overlap. The lock is
//! an advisory `flock` on a well-known file; the kernel drops it if the
//! process dies, so a crashed run never leaves a stale lock behind.

use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::error::LockError;

/// Guard holding the lock; released on drop.
#[derive(Debug)]
pub struct DeviceLock {
    file: File,
    path: PathBuf,
}

impl DeviceLock {
    /// Take the lock at `path` without blocking.
    ///
    /// Fails with [`LockError::AlreadyHeld`] if another run (in this or any
    /// other process) holds it. On success the holder's pid is written into
    /// the file for diagnosis.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let io_err = |source: io::Error| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(io_err)?;

        let fd = file.as_raw_fd();
        // SAFETY: `fd` is owned by `file`, which outlives this call.
        let rc = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Err(LockError::AlreadyHeld {
                    path: path.to_path_buf(),
                });
            }
            return Err(io_err(err));
        }

        file.set_len(0).map_err(io_err)?;
        file.seek(SeekFrom::Start(0)).map_err(io_err)?;
        writeln!(file, "{}", std::process::id()).map_err(io_err)?;

        debug!("Acquired device lock {}", path.display());
        Ok(DeviceLock {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DeviceLock {
    fn drop(&mut self) {
        // SAFETY: the descriptor is still open; closing it would also unlock.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        debug!("Released device lock {}", self.path.display());
    }
}
