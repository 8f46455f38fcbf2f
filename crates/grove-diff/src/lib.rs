//! Structural comparison of two trees.
//!
//! [`diff_trees`] merge-walks both trees level by level and never opens a
//! subtree whose id is the same on both sides. The result is a path-sorted
//! list of [`TreeChange`]s; with [`DiffOptions::renames`] set, matching
//! deletion/addition pairs are folded into renames.

pub mod rename;
mod tree;

use bstr::BString;
use grove_hash::ObjectId;
use grove_object::EntryMode;

pub use rename::similarity_score;
pub use tree::{diff_trees, entry_at_path};

#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error(transparent)]
    Odb(#[from] grove_odb::OdbError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    pub renames: bool,
    /// Minimum similarity percentage for a non-exact rename.
    pub rename_threshold: u8,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            renames: false,
            rename_threshold: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Deleted,
    Modified,
    Renamed { from: BString, score: u8 },
}

/// One changed path. `old` is absent for additions, `new` for deletions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeChange {
    pub kind: ChangeKind,
    pub path: BString,
    pub old: Option<(EntryMode, ObjectId)>,
    pub new: Option<(EntryMode, ObjectId)>,
}

impl TreeChange {
    /// The same change seen from the other side.
    pub fn reversed(&self) -> TreeChange {
        let (kind, path) = match &self.kind {
            ChangeKind::Added => (ChangeKind::Deleted, self.path.clone()),
            ChangeKind::Deleted => (ChangeKind::Added, self.path.clone()),
            ChangeKind::Modified => (ChangeKind::Modified, self.path.clone()),
            ChangeKind::Renamed { from, score } => (
                ChangeKind::Renamed {
                    from: self.path.clone(),
                    score: *score,
                },
                from.clone(),
            ),
        };
        TreeChange {
            kind,
            path,
            old: self.new,
            new: self.old,
        }
    }

    /// Single-letter status as printed by `diff-tree`.
    pub fn status(&self) -> char {
        match self.kind {
            ChangeKind::Added => 'A',
            ChangeKind::Deleted => 'D',
            ChangeKind::Modified => 'M',
            ChangeKind::Renamed { .. } => 'R',
        }
    }
}
