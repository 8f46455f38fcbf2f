//! The four immutable object kinds and their canonical encodings.
//!
//! An object's id is the SHA-1 of `"<kind> <len>\0"` followed by the
//! encoded payload, so encoding must be deterministic: trees are always
//! written in [`tree_order`] and commits with their headers in fixed order.

mod commit;
pub mod header;
mod tag;
mod tree;

pub use commit::Commit;
pub use tag::Tag;
pub use tree::{tree_order, EntryMode, Tree, TreeEntry};

use bstr::BString;
use grove_hash::{HashError, Hasher, ObjectId};

#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("unknown object kind {0:?}")]
    UnknownKind(BString),

    #[error("malformed object header: {0}")]
    BadHeader(String),

    #[error("truncated object: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("malformed tree entry at offset {offset}: {reason}")]
    BadTreeEntry { offset: usize, reason: &'static str },

    #[error("unsupported tree entry mode {0:?}")]
    BadMode(BString),

    #[error("{kind} is missing its '{field}' header")]
    MissingField {
        kind: ObjectKind,
        field: &'static str,
    },

    #[error("malformed {kind} header line: {line:?}")]
    BadField { kind: ObjectKind, line: BString },

    #[error("malformed identity: {0}")]
    BadSignature(String),

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// The kind tag stored in every object header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectKind {
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        match s {
            b"blob" => Ok(Self::Blob),
            b"tree" => Ok(Self::Tree),
            b"commit" => Ok(Self::Commit),
            b"tag" => Ok(Self::Tag),
            other => Err(ObjectError::UnknownKind(other.into())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObjectKind {
    type Err = ObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

/// A decoded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Vec<u8>),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    /// Decode a payload whose kind is already known (header stripped).
    pub fn parse(kind: ObjectKind, payload: &[u8]) -> Result<Self, ObjectError> {
        Ok(match kind {
            ObjectKind::Blob => Self::Blob(payload.to_vec()),
            ObjectKind::Tree => Self::Tree(Tree::parse(payload)?),
            ObjectKind::Commit => Self::Commit(Commit::parse(payload)?),
            ObjectKind::Tag => Self::Tag(Tag::parse(payload)?),
        })
    }

    /// Decode `"<kind> <len>\0<payload>"`.
    pub fn parse_with_header(data: &[u8]) -> Result<Self, ObjectError> {
        let (kind, size, header_len) = header::parse(data)?;
        let payload = &data[header_len..];
        if payload.len() != size {
            return Err(ObjectError::Truncated {
                expected: size,
                actual: payload.len(),
            });
        }
        Self::parse(kind, payload)
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Tree(_) => ObjectKind::Tree,
            Self::Commit(_) => ObjectKind::Commit,
            Self::Tag(_) => ObjectKind::Tag,
        }
    }

    /// Canonical payload bytes, without header.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Blob(data) => data.clone(),
            Self::Tree(t) => t.encode(),
            Self::Commit(c) => c.encode(),
            Self::Tag(t) => t.encode(),
        }
    }

    pub fn id(&self) -> Result<ObjectId, ObjectError> {
        Ok(compute_id(self.kind(), &self.encode())?)
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            Self::Tree(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            Self::Commit(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_blob(self) -> Option<Vec<u8>> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }
}

/// Id of `payload` stored as `kind`.
pub fn compute_id(kind: ObjectKind, payload: &[u8]) -> Result<ObjectId, HashError> {
    Hasher::hash_object(kind.as_str(), payload)
}
