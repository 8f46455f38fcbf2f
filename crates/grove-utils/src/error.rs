use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("malformed identity: {0}")]
    Signature(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures of the `<path>.lock` protocol.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("unable to create '{}': lock is held by another process", path.display())]
    Contended { path: PathBuf },

    #[error("unable to create lock file '{}': {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to commit lock file '{}': {source}", path.display())]
    Commit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LockError {
    /// True when another holder owns the lock, as opposed to an I/O fault.
    pub fn is_contended(&self) -> bool {
        matches!(self, LockError::Contended { .. })
    }
}
