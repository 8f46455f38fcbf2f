//! Object identity for grove.
//!
//! Every stored object is named by the SHA-1 digest of its canonical
//! encoding. [`ObjectId`] is that digest; [`Hasher`] computes it with
//! collision detection enabled.

mod hasher;
pub mod hex;
mod oid;

pub use hasher::Hasher;
pub use oid::ObjectId;

/// Length of a raw object id in bytes.
pub const RAW_LEN: usize = 20;

/// Length of a hex-encoded object id.
pub const HEX_LEN: usize = 40;

/// Errors produced while parsing or computing object ids.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid hex length: expected {expected}, got {actual}")]
    InvalidHexLength { expected: usize, actual: usize },

    #[error("invalid hex character {0:?}")]
    InvalidHex(char),

    #[error("invalid raw id length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("SHA-1 collision attack detected")]
    Sha1Collision,
}
