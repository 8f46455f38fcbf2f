//! References: names pointing at objects or at other names.
//!
//! [`FilesRefStore`] keeps the classic layout: loose files under the git
//! directory and a `packed-refs` file. Updates are compare-and-swap under a
//! per-ref lock; fast-forward checks are delegated to an [`Ancestry`]
//! oracle supplied by the caller.

mod error;
mod loose;
mod name;
mod packed;
mod store;
mod update;

pub use error::RefError;
pub use name::{RefName, HEAD};
pub use packed::{PackedRef, PackedRefs};
pub use store::{FilesRefStore, Peel, DEFAULT_LOCK_TIMEOUT, MAX_SYMREF_DEPTH};
pub use update::{Ancestry, DeleteOutcome, Expected, RefUpdate, RejectReason, UpdateOutcome};

use grove_hash::ObjectId;

/// A ref as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Direct(ObjectId),
    Symbolic(RefName),
}

impl Reference {
    pub fn target_id(&self) -> Option<ObjectId> {
        match self {
            Reference::Direct(id) => Some(*id),
            Reference::Symbolic(_) => None,
        }
    }

    pub fn symbolic_target(&self) -> Option<&RefName> {
        match self {
            Reference::Symbolic(name) => Some(name),
            Reference::Direct(_) => None,
        }
    }
}
