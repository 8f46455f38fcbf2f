use std::path::PathBuf;

use grove_config::ConfigError;
use grove_hash::ObjectId;
use grove_index::IndexError;
use grove_odb::OdbError;
use grove_pack::PackError;
use grove_ref::{RefError, RejectReason};
use grove_revwalk::RevWalkError;
use grove_utils::LockError;
use grove_worktree::SyncError;

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not a grove repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("bare repository has no working tree")]
    NoWorkTree,

    #[error("object {0} is not a commit")]
    NotACommit(ObjectId),

    #[error("unknown revision '{0}'")]
    UnknownRevision(String),

    #[error("update of {name} rejected: {reason:?}")]
    RefRejected { name: String, reason: RejectReason },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Odb(#[from] OdbError),

    #[error(transparent)]
    Pack(#[from] PackError),

    #[error(transparent)]
    Ref(#[from] RefError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    RevWalk(#[from] RevWalkError),

    #[error(transparent)]
    Diff(#[from] grove_diff::DiffError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse classification shared by every error the engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    CorruptObject,
    LockContention,
    DirtyWorkingTree,
    TransportFailure,
    RefRejected,
    Cancelled,
    Io,
    Invalid,
}

impl ErrorKind {
    /// Whether retrying, or acting on the reported state, can succeed
    /// without repairing the repository.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::NotFound | ErrorKind::LockContention | ErrorKind::RefRejected | ErrorKind::Cancelled
        )
    }

    pub fn of_odb(err: &OdbError) -> Self {
        match err {
            OdbError::NotFound(_) => ErrorKind::NotFound,
            OdbError::WrongKind { .. } => ErrorKind::Invalid,
            OdbError::Cancelled(_) => ErrorKind::Cancelled,
            OdbError::Pack(e) => ErrorKind::of_pack(e),
            OdbError::Io(_) => ErrorKind::Io,
            OdbError::Loose(e) if !e.is_corruption() => ErrorKind::Io,
            _ => ErrorKind::CorruptObject,
        }
    }

    pub fn of_pack(err: &PackError) -> Self {
        match err {
            PackError::MissingBase(_) => ErrorKind::NotFound,
            PackError::Cancelled(_) => ErrorKind::Cancelled,
            PackError::Io(_) => ErrorKind::Io,
            _ => ErrorKind::CorruptObject,
        }
    }

    pub fn of_ref(err: &RefError) -> Self {
        match err {
            RefError::NotFound(_) => ErrorKind::NotFound,
            RefError::LockContention { .. } => ErrorKind::LockContention,
            RefError::Lock(e) => ErrorKind::of_lock(e),
            RefError::Io(_) => ErrorKind::Io,
            _ => ErrorKind::Invalid,
        }
    }

    pub fn of_index(err: &IndexError) -> Self {
        match err {
            IndexError::LockContention { .. } => ErrorKind::LockContention,
            IndexError::Lock(e) => ErrorKind::of_lock(e),
            IndexError::Odb(e) => ErrorKind::of_odb(e),
            IndexError::Io(_) => ErrorKind::Io,
            IndexError::InvalidPath(_)
            | IndexError::NotAFile(_)
            | IndexError::Unmerged(_)
            | IndexError::PathConflict(_) => ErrorKind::Invalid,
            _ => ErrorKind::CorruptObject,
        }
    }

    pub fn of_sync(err: &SyncError) -> Self {
        match err {
            SyncError::DirtyWorkingTree { .. } => ErrorKind::DirtyWorkingTree,
            SyncError::Cancelled => ErrorKind::Cancelled,
            SyncError::NotABlob { .. } | SyncError::Hash(_) => ErrorKind::CorruptObject,
            SyncError::Index(e) => ErrorKind::of_index(e),
            SyncError::Odb(e) => ErrorKind::of_odb(e),
            SyncError::Io(_) => ErrorKind::Io,
        }
    }

    fn of_lock(err: &LockError) -> Self {
        if err.is_contended() {
            ErrorKind::LockContention
        } else {
            ErrorKind::Io
        }
    }
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepoError::NotARepository(_) | RepoError::UnknownRevision(_) => ErrorKind::NotFound,
            RepoError::NoWorkTree | RepoError::NotACommit(_) => ErrorKind::Invalid,
            RepoError::RefRejected { .. } => ErrorKind::RefRejected,
            RepoError::Config(ConfigError::Lock(e)) => ErrorKind::of_lock(e),
            RepoError::Config(ConfigError::Io(_)) => ErrorKind::Io,
            RepoError::Config(_) => ErrorKind::Invalid,
            RepoError::Odb(e) => ErrorKind::of_odb(e),
            RepoError::Pack(e) => ErrorKind::of_pack(e),
            RepoError::Ref(e) => ErrorKind::of_ref(e),
            RepoError::Index(e) => ErrorKind::of_index(e),
            RepoError::RevWalk(RevWalkError::Odb(e)) => ErrorKind::of_odb(e),
            RepoError::RevWalk(RevWalkError::NotACommit(_)) => ErrorKind::Invalid,
            RepoError::Diff(grove_diff::DiffError::Odb(e)) => ErrorKind::of_odb(e),
            RepoError::Sync(e) => ErrorKind::of_sync(e),
            RepoError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind().is_recoverable()
    }
}
