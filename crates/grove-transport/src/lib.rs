//! Byte-stream transports.
//!
//! A [`Transport`] is a bidirectional byte channel to a peer running the
//! upload side of the fetch protocol. The protocol itself lives in
//! `grove-protocol`; this crate only moves bytes. Encrypted or
//! authenticated channels are provided by callers through
//! [`StreamTransport`].

pub mod pipe;
pub mod process;
pub mod stream;
pub mod tcp;
pub mod url;

use std::io::{Read, Write};

pub use process::ProcessTransport;
pub use stream::StreamTransport;
pub use tcp::{TcpOptions, TcpTransport};
pub use url::{RemoteUrl, Scheme};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("'{program}' exited with status {code}: {stderr}")]
    ProcessFailed {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A connection to a peer.
///
/// The lifecycle is: open through a constructor, exchange bytes through
/// [`reader`](Transport::reader) and [`writer`](Transport::writer), then
/// [`close`](Transport::close).
pub trait Transport: Send {
    fn reader(&mut self) -> &mut dyn Read;

    fn writer(&mut self) -> &mut dyn Write;

    /// Shut the connection down and report how the peer ended.
    fn close(self: Box<Self>) -> Result<(), TransportError>;
}

/// Open a transport for `url`. Local paths and `file://` URLs spawn
/// `upload_pack` with the repository path as its last argument.
pub fn connect(url: &RemoteUrl, upload_pack: &str) -> Result<Box<dyn Transport>, TransportError> {
    match url.scheme {
        Scheme::Git => Ok(Box::new(TcpTransport::connect(url, &TcpOptions::default())?)),
        Scheme::File | Scheme::Local => {
            Ok(Box::new(ProcessTransport::upload_pack(upload_pack, &url.path)?))
        }
    }
}
