//! The fetch protocol.
//!
//! Both halves of the smart protocol over any [`Transport`]: the client
//! side ([`advertise`], [`negotiate`], [`ingest`], tied together by
//! [`fetch`]) and the serving side ([`UploadPack`]). Messages are framed as
//! pkt-lines; pack data may be multiplexed with progress and errors over
//! side-band channels.
//!
//! [`Transport`]: grove_transport::Transport

pub mod advertise;
pub mod capability;
pub mod fetch;
pub mod ingest;
pub mod negotiate;
pub mod pktline;
pub mod refspec;
pub mod sideband;
pub mod upload;

pub use advertise::{advertise, Advertisement};
pub use capability::Capabilities;
pub use fetch::{fetch, FetchOptions, FetchResult, RefOutcome};
pub use ingest::{ingest, IngestReport};
pub use negotiate::{negotiate, PackReader};
pub use refspec::RefSpec;
pub use upload::{UploadPack, UploadReport};

use std::io;

use grove_hash::ObjectId;
use grove_repository::ErrorKind;

/// User agent sent in capability lists.
pub const AGENT: &str = concat!("grove/", env!("CARGO_PKG_VERSION"));

/// An error message the peer sent on side-band 3 or as an `ERR` line,
/// carried through `io::Read` as the inner error.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct RemoteMessage(pub String);

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid pkt-line: {0}")]
    InvalidPktLine(String),

    #[error("connection closed unexpectedly")]
    UnexpectedEof,

    #[error("unexpected packet: {0}")]
    UnexpectedPacket(String),

    #[error("remote error: {0}")]
    Remote(String),

    #[error("{0} is not an advertised ref tip")]
    NotOurRef(ObjectId),

    #[error("invalid refspec: {0}")]
    InvalidRefSpec(String),

    #[error("object {0} still missing after fetch")]
    Incomplete(ObjectId),

    #[error(transparent)]
    Transport(#[from] grove_transport::TransportError),

    #[error(transparent)]
    Pack(#[from] grove_pack::PackError),

    #[error(transparent)]
    Odb(#[from] grove_odb::OdbError),

    #[error(transparent)]
    Ref(#[from] grove_ref::RefError),

    #[error(transparent)]
    RevWalk(#[from] grove_revwalk::RevWalkError),

    #[error(transparent)]
    Repo(#[from] grove_repository::RepoError),

    #[error(transparent)]
    Hash(#[from] grove_hash::HashError),

    #[error(transparent)]
    Cancelled(#[from] grove_utils::Cancelled),

    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<RemoteMessage>()) {
            let message = err
                .into_inner()
                .and_then(|inner| inner.downcast::<RemoteMessage>().ok())
                .map(|m| m.0)
                .unwrap_or_default();
            return ProtocolError::Remote(message);
        }
        if err.kind() == io::ErrorKind::UnexpectedEof {
            return ProtocolError::UnexpectedEof;
        }
        ProtocolError::Io(err)
    }
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::InvalidRefSpec(_) => ErrorKind::Invalid,
            ProtocolError::Cancelled(_) => ErrorKind::Cancelled,
            ProtocolError::Pack(e) => ErrorKind::of_pack(e),
            ProtocolError::Hash(_) => ErrorKind::CorruptObject,
            ProtocolError::Odb(e) => ErrorKind::of_odb(e),
            ProtocolError::Ref(e) => ErrorKind::of_ref(e),
            ProtocolError::RevWalk(grove_revwalk::RevWalkError::Odb(e)) => ErrorKind::of_odb(e),
            ProtocolError::RevWalk(_) => ErrorKind::CorruptObject,
            ProtocolError::Repo(e) => e.kind(),
            _ => ErrorKind::TransportFailure,
        }
    }
}

/// Strip one trailing newline from a pkt-line payload.
pub(crate) fn chomp(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\n").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_message_survives_io_round_trip() {
        let err = io::Error::new(io::ErrorKind::Other, RemoteMessage("access denied".into()));
        let converted = ProtocolError::from(err);
        assert!(matches!(&converted, ProtocolError::Remote(m) if m == "access denied"));
        assert_eq!(converted.kind(), ErrorKind::TransportFailure);
    }

    #[test]
    fn eof_is_a_transport_failure() {
        let err = ProtocolError::from(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(err, ProtocolError::UnexpectedEof));
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
    }
}
