use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::url::RemoteUrl;
use crate::{Transport, TransportError};

/// Timeouts for [`TcpTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpOptions {
    pub connect_timeout: Duration,
    /// Applied to every read and write; `None` blocks indefinitely.
    pub io_timeout: Option<Duration>,
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            io_timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// A `git://` connection.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect and send the service request for upload-pack on the URL's
    /// path.
    pub fn connect(url: &RemoteUrl, options: &TcpOptions) -> Result<Self, TransportError> {
        let (host, port) = url
            .address()
            .ok_or_else(|| TransportError::InvalidUrl(format!("{url} has no host")))?;
        let addrs = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| TransportError::ConnectionFailed(format!("{host}:{port}: {e}")))?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, options.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(options.io_timeout)?;
                    stream.set_write_timeout(options.io_timeout)?;
                    stream.set_nodelay(true)?;
                    let mut transport = Self { stream };
                    transport.request(&url.path, &host, port)?;
                    tracing::debug!(%host, port, path = %url.path, "connected");
                    return Ok(transport);
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(TransportError::ConnectionFailed(match last_error {
            Some(e) => format!("{host}:{port}: {e}"),
            None => format!("{host}:{port}: no addresses"),
        }))
    }

    /// Wrap an already connected stream and send the service request.
    pub fn from_stream(stream: TcpStream, path: &str, host: &str) -> Result<Self, TransportError> {
        let port = stream.peer_addr()?.port();
        let mut transport = Self { stream };
        transport.request(path, host, port)?;
        Ok(transport)
    }

    fn request(&mut self, path: &str, host: &str, port: u16) -> Result<(), TransportError> {
        let line = service_request(path, host, port);
        self.stream.write_all(&line)?;
        self.stream.flush()?;
        Ok(())
    }
}

/// The initial pkt-line of a `git://` session.
pub fn service_request(path: &str, host: &str, port: u16) -> Vec<u8> {
    let host = if port == crate::url::DEFAULT_GIT_PORT {
        host.to_string()
    } else {
        format!("{host}:{port}")
    };
    let body = format!("git-upload-pack {path}\0host={host}\0");
    let mut line = format!("{:04x}", body.len() + 4).into_bytes();
    line.extend_from_slice(body.as_bytes());
    line
}

impl Transport for TcpTransport {
    fn reader(&mut self) -> &mut dyn Read {
        &mut self.stream
    }

    fn writer(&mut self) -> &mut dyn Write {
        &mut self.stream
    }

    fn close(self: Box<Self>) -> Result<(), TransportError> {
        match self.stream.shutdown(std::net::Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_line_format() {
        assert_eq!(
            service_request("/repo.git", "example.com", 9418),
            b"002fgit-upload-pack /repo.git\0host=example.com\0".to_vec()
        );
        let line = service_request("/r", "h", 1234);
        assert!(line.ends_with(b"host=h:1234\0"));
        assert_eq!(&line[..4], format!("{:04x}", line.len()).as_bytes());
    }
}
