//! Exclusive advisory lock guarding a store against a second opener.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tabula_common::{Result, TabulaError};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Holds an exclusive lock on a `<name>.lock` file until dropped.
///
/// The lock file contains the holder's process ID for debugging.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquires the lock without blocking.
    ///
    /// Returns `TabulaError::Locked` if another handle already holds it.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = Self::try_lock(&file) {
            if e.kind() == io::ErrorKind::WouldBlock {
                return Err(TabulaError::Locked(path));
            }
            return Err(e.into());
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        Ok(Self { _file: file, path })
    }

    #[cfg(unix)]
    fn try_lock(file: &File) -> io::Result<()> {
        use libc::{flock, LOCK_EX, LOCK_NB};

        let fd = file.as_raw_fd();
        // SAFETY: fd is a valid descriptor owned by `file` for the whole call.
        let result = unsafe { flock(fd, LOCK_EX | LOCK_NB) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn try_lock(_file: &File) -> io::Result<()> {
        // No advisory locking on this platform.
        Ok(())
    }

    /// Releases the lock. The lock file itself is left in place.
    pub fn release(self) {
        drop(self);
    }

    /// Returns the path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
