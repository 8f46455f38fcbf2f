//! Loose objects: one zlib-compressed file per object at `objects/xx/yyyy…`,
//! holding `"<kind> <len>\0"` followed by the payload.

mod list;
mod read;
mod write;

pub use read::LooseReader;

use std::path::{Path, PathBuf};

use grove_hash::ObjectId;

/// The loose half of an objects directory.
#[derive(Debug, Clone)]
pub struct LooseStore {
    objects_dir: PathBuf,
    compression: flate2::Compression,
}

impl LooseStore {
    pub fn new(objects_dir: impl AsRef<Path>) -> Self {
        Self {
            objects_dir: objects_dir.as_ref().to_path_buf(),
            compression: flate2::Compression::default(),
        }
    }

    /// zlib level 0-9; out-of-range values are clamped.
    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = flate2::Compression::new(level.min(9));
        self
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    pub fn path_of(&self, oid: &ObjectId) -> PathBuf {
        self.objects_dir.join(oid.loose_path())
    }

    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.path_of(oid).is_file()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LooseError {
    #[error("corrupt loose object {oid}: {reason}")]
    Corrupt { oid: ObjectId, reason: String },

    #[error("loose object {expected} hashes to {actual}")]
    HashMismatch {
        expected: ObjectId,
        actual: ObjectId,
    },

    #[error(transparent)]
    Object(#[from] grove_object::ObjectError),

    #[error(transparent)]
    Hash(#[from] grove_hash::HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LooseError {
    /// Digest or encoding failures, as opposed to I/O trouble.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            LooseError::Corrupt { .. } | LooseError::HashMismatch { .. } | LooseError::Object(_)
        )
    }
}
