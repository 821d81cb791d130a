use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Advisory lock held while writing documents into the store.
///
/// Uses flock (Unix) so concurrent `studio` processes never interleave
/// a read-modify-write of the same collection. The lock file itself is
/// never removed: a waiter still holding the old inode would otherwise
/// lock it while a newcomer locks a fresh file.
pub struct StoreLock {
    _file: File,
}

/// Error type for lock operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not create lock file at {path}: {source}")]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("store at {path} is busy: another studio process is writing")]
    Timeout { path: PathBuf },
}

impl StoreLock {
    /// Acquire the lock on the store directory, waiting up to `timeout`.
    pub fn acquire(store_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let lock_path = store_dir.join(".lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| LockError::CreateError {
                path: lock_path.clone(),
                source: e,
            })?;

        let start = Instant::now();
        while try_lock(&file).is_err() {
            if start.elapsed() >= timeout {
                tracing::warn!(path = %lock_path.display(), "store lock timed out");
                return Err(LockError::Timeout { path: lock_path });
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(StoreLock { _file: file })
    }

    /// Acquire with the default 5 second timeout
    pub fn acquire_default(store_dir: &Path) -> Result<Self, LockError> {
        Self::acquire(store_dir, Duration::from_secs(5))
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> Result<(), std::io::Error> {
    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> Result<(), std::io::Error> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_is_reacquirable_after_drop() {
        let tmp = TempDir::new().unwrap();
        let first = StoreLock::acquire_default(tmp.path()).unwrap();
        drop(first);
        assert!(StoreLock::acquire_default(tmp.path()).is_ok());
    }

    #[test]
    fn released_lock_keeps_its_file() {
        let tmp = TempDir::new().unwrap();
        let waiting = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(tmp.path().join(".lock"))
            .unwrap();
        drop(StoreLock::acquire_default(tmp.path()).unwrap());
        assert!(tmp.path().join(".lock").exists());

        // a descriptor opened before the release contends on the same file
        try_lock(&waiting).unwrap();
        let third = StoreLock::acquire(tmp.path(), Duration::from_millis(50));
        assert!(matches!(third, Err(LockError::Timeout { .. })));
    }

    #[test]
    fn second_writer_times_out() {
        let tmp = TempDir::new().unwrap();
        let _held = StoreLock::acquire_default(tmp.path()).unwrap();
        let second = StoreLock::acquire(tmp.path(), Duration::from_millis(50));
        assert!(matches!(second, Err(LockError::Timeout { .. })));
    }
}
