//! Commit graph traversal.
//!
//! [`RevWalk`] yields commits reachable from a set of starting points and
//! not reachable from a set of hidden ones. Commit records live in an arena
//! keyed by id and are loaded only when the walk first reaches them.
//! [`merge_base`], [`is_ancestor`] and [`list_objects`] answer the graph
//! queries needed by ref updates and by the upload side of fetch.

mod merge_base;
mod objects;
mod walk;

use grove_hash::ObjectId;

pub use merge_base::{is_ancestor, merge_base, CommitAncestry};
pub use objects::{list_objects, ReachableObject};
pub use walk::{RevWalk, SortOrder, WalkFlags, WalkOptions};

#[derive(Debug, thiserror::Error)]
pub enum RevWalkError {
    #[error("object is not a commit: {0}")]
    NotACommit(ObjectId),

    #[error(transparent)]
    Odb(#[from] grove_odb::OdbError),
}
