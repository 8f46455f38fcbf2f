use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::LockError;

const LOCK_SUFFIX: &str = ".lock";

/// Exclusive `<path>.lock` guard.
///
/// The lock file is created with `create_new`, so at most one holder exists
/// per target. New contents are written into the lock file and published by
/// [`commit`](LockFile::commit), which renames it over the target. Dropping an
/// uncommitted guard removes the lock file, so the lock is released on every
/// exit path.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
    done: bool,
}

/// `<path>.lock`, appended to the full file name.
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

impl LockFile {
    /// Take the lock or fail immediately with [`LockError::Contended`].
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref().to_path_buf();
        let lock_path = lock_path_for(&path);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    LockError::Contended {
                        path: lock_path.clone(),
                    }
                } else {
                    LockError::Create {
                        path: lock_path.clone(),
                        source: e,
                    }
                }
            })?;
        Ok(Self {
            path,
            lock_path,
            file: Some(file),
            done: false,
        })
    }

    /// Retry [`acquire`](LockFile::acquire) with exponential backoff until
    /// `timeout` elapses. A zero timeout tries exactly once.
    pub fn acquire_timeout(path: impl AsRef<Path>, timeout: Duration) -> Result<Self, LockError> {
        let path = path.as_ref();
        let deadline = Instant::now() + timeout;
        let mut backoff = Duration::from_millis(1);
        loop {
            match Self::acquire(path) {
                Err(e) if e.is_contended() && Instant::now() < deadline => {
                    tracing::trace!(path = %path.display(), ?backoff, "lock busy, retrying");
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    thread::sleep(backoff.min(remaining));
                    backoff = (backoff * 2).min(Duration::from_millis(50));
                }
                other => return other,
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Flush, fsync and rename the lock file over the target.
    pub fn commit(mut self) -> Result<(), LockError> {
        let commit_err = |path: &Path, source| LockError::Commit {
            path: path.to_path_buf(),
            source,
        };
        if let Some(mut file) = self.file.take() {
            file.flush().map_err(|e| commit_err(&self.lock_path, e))?;
            file.sync_all().map_err(|e| commit_err(&self.lock_path, e))?;
        }
        fs::rename(&self.lock_path, &self.path).map_err(|e| commit_err(&self.lock_path, e))?;
        self.done = true;
        Ok(())
    }

    /// Release the lock without touching the target.
    pub fn rollback(mut self) -> io::Result<()> {
        self.file.take();
        self.done = true;
        match fs::remove_file(&self.lock_path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Write for LockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock file already closed"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock file already closed"))?
            .flush()
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.done {
            self.file.take();
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}
