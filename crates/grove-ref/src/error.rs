use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RefError {
    #[error("invalid ref name: {0}")]
    InvalidName(String),

    #[error("ref not found: {0}")]
    NotFound(String),

    #[error("symbolic ref chain too deep at {0}")]
    SymrefLoop(String),

    #[error("ref {0} is symbolic")]
    Symbolic(String),

    #[error("could not lock {}: held by another writer", path.display())]
    LockContention { path: PathBuf },

    #[error("cannot create ref '{name}' because '{conflict}' exists")]
    DirectoryConflict { name: String, conflict: String },

    #[error("malformed ref file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("ancestry check failed: {0}")]
    Ancestry(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Lock(grove_utils::LockError),

    #[error(transparent)]
    Hash(#[from] grove_hash::HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<grove_utils::LockError> for RefError {
    fn from(e: grove_utils::LockError) -> Self {
        match e {
            grove_utils::LockError::Contended { path } => RefError::LockContention { path },
            other => RefError::Lock(other),
        }
    }
}
