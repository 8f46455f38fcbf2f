//! Working tree synchronization.
//!
//! [`Checkout`] brings the files under a work tree and the index in line
//! with a target tree. It plans every path first without touching the
//! disk, refuses to run when any planned change would destroy local work,
//! and only then applies deletions, directory changes and file writes. The
//! index is rewritten last, so an interrupted run can simply be repeated.

pub mod capabilities;
mod checkout;
mod plan;

use std::fmt;

use bstr::BString;
use grove_hash::ObjectId;

pub use capabilities::{FileModeOverride, FixedCapabilities, FsCapabilities, NativeFs};
pub use checkout::{Checkout, CheckoutOptions, CheckoutReport};
pub use error::SyncError;

/// Why a path blocks a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conflict {
    /// The file has local changes and the checkout would change it.
    DirtyFile,
    /// An untracked file sits where the target has a file.
    UntrackedOverwritten,
    /// A directory with content to keep sits where the target has a file.
    DirectoryInTheWay,
    /// A file sits where the target needs a directory.
    FileInTheWay,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Conflict::DirtyFile => "local changes would be overwritten",
            Conflict::UntrackedOverwritten => "untracked file would be overwritten",
            Conflict::DirectoryInTheWay => "directory in the way",
            Conflict::FileInTheWay => "file in the way",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConflict {
    pub path: BString,
    pub kind: Conflict,
}

impl fmt::Display for PathConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.kind)
    }
}

mod error {
    use bstr::BString;
    use grove_hash::ObjectId;
    use grove_utils::Cancelled;

    use crate::PathConflict;

    #[derive(Debug, thiserror::Error)]
    pub enum SyncError {
        #[error("checkout would overwrite {} path(s): {}", conflicts.len(), summary(conflicts))]
        DirtyWorkingTree { conflicts: Vec<PathConflict> },

        #[error("checkout cancelled")]
        Cancelled,

        #[error("object {oid} for '{path}' is not a blob")]
        NotABlob { path: BString, oid: ObjectId },

        #[error(transparent)]
        Index(#[from] grove_index::IndexError),

        #[error(transparent)]
        Odb(#[from] grove_odb::OdbError),

        #[error(transparent)]
        Hash(#[from] grove_hash::HashError),

        #[error(transparent)]
        Io(#[from] std::io::Error),
    }

    impl From<Cancelled> for SyncError {
        fn from(_: Cancelled) -> Self {
            SyncError::Cancelled
        }
    }

    fn summary(conflicts: &[PathConflict]) -> String {
        conflicts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    impl SyncError {
        pub fn conflicts(&self) -> &[PathConflict] {
            match self {
                SyncError::DirtyWorkingTree { conflicts } => conflicts,
                _ => &[],
            }
        }
    }
}

/// A target entry: what the path should hold after checkout.
pub(crate) type Target = (grove_object::EntryMode, ObjectId);
