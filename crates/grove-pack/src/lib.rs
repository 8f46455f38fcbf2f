//! Packed object storage.
//!
//! A pack is an immutable `.pack` file (header, zlib-compressed entries that
//! may be deltas against other entries, SHA-1 trailer) plus an `.idx` file
//! mapping ids to offsets. This crate reads both through `memmap2`, codes
//! deltas, writes new packs, and indexes received packs.

pub mod delta;
pub mod entry;
mod index;
mod indexer;
mod install;
mod pack;
mod write;

pub use index::{write_index, IndexRecord, PackIndex};
pub use indexer::{index_pack, IndexedPack};
pub use install::install_pack;
pub use pack::{ExternalBase, PackFile, PackStream};
pub use write::PackWriter;

use grove_hash::ObjectId;
use grove_object::ObjectKind;

pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_VERSION: u32 = 2;
pub const PACK_HEADER_LEN: usize = 12;
pub const IDX_SIGNATURE: [u8; 4] = [0xff, b't', b'O', b'c'];
pub const IDX_VERSION: u32 = 2;

/// Longest delta chain followed when reading.
pub const MAX_DELTA_CHAIN_DEPTH: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("bad pack header: {0}")]
    BadHeader(String),

    #[error("unsupported pack version {0}")]
    UnsupportedVersion(u32),

    #[error("bad pack index: {0}")]
    BadIndex(String),

    #[error("corrupt pack entry at offset {offset}: {reason}")]
    CorruptEntry { offset: u64, reason: String },

    #[error("invalid delta: {0}")]
    BadDelta(String),

    #[error("delta base {0} is not available")]
    MissingBase(ObjectId),

    #[error("delta chain starting at offset {0} exceeds {MAX_DELTA_CHAIN_DEPTH}")]
    ChainTooDeep(u64),

    #[error("pack checksum mismatch: trailer says {expected}, content hashes to {actual}")]
    ChecksumMismatch {
        expected: ObjectId,
        actual: ObjectId,
    },

    #[error("pack declares {declared} objects but holds {actual}")]
    CountMismatch { declared: u32, actual: u32 },

    #[error("invalid {kind} object {oid} in pack: {source}")]
    BadObject {
        oid: ObjectId,
        kind: ObjectKind,
        #[source]
        source: grove_object::ObjectError,
    },

    #[error(transparent)]
    Hash(#[from] grove_hash::HashError),

    #[error(transparent)]
    Cancelled(#[from] grove_utils::Cancelled),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PackError {
    /// Checksum, delta or entry damage, as opposed to I/O trouble or a
    /// missing external base.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            PackError::BadHeader(_)
                | PackError::BadIndex(_)
                | PackError::CorruptEntry { .. }
                | PackError::BadDelta(_)
                | PackError::ChainTooDeep(_)
                | PackError::ChecksumMismatch { .. }
                | PackError::CountMismatch { .. }
                | PackError::BadObject { .. }
        )
    }
}
