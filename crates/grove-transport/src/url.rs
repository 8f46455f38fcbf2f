//! Remote location parsing.
//!
//! Supported forms:
//! - `git://host[:port]/path`
//! - `file:///path`
//! - `/local/path`, `./relative/path`
//!
//! Other schemes are recognized and rejected: their sessions are set up by
//! the caller and handed over as a [`StreamTransport`](crate::StreamTransport).

use std::fmt;

use crate::TransportError;

pub const DEFAULT_GIT_PORT: u16 = 9418;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Git,
    File,
    /// A path without a scheme prefix.
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    pub scheme: Scheme,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: String,
}

impl RemoteUrl {
    pub fn parse(url: &str) -> Result<Self, TransportError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(TransportError::InvalidUrl("empty URL".into()));
        }
        if let Some(rest) = url.strip_prefix("git://") {
            return parse_git(rest);
        }
        if let Some(rest) = url.strip_prefix("file://") {
            return Ok(Self::local(Scheme::File, rest));
        }
        if let Some((scheme, _)) = url.split_once("://") {
            return Err(TransportError::UnsupportedScheme(scheme.to_string()));
        }
        let bytes = url.as_bytes();
        let drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
        if url.contains(':') && !drive {
            // scp-like `host:path`, which implies ssh
            return Err(TransportError::UnsupportedScheme("ssh".into()));
        }
        Ok(Self::local(Scheme::Local, url))
    }

    fn local(scheme: Scheme, path: &str) -> Self {
        Self {
            scheme,
            host: None,
            port: None,
            path: path.to_string(),
        }
    }

    /// Host and port to connect to, for network schemes.
    pub fn address(&self) -> Option<(String, u16)> {
        let host = self.host.clone()?;
        Some((host, self.port.unwrap_or(DEFAULT_GIT_PORT)))
    }
}

fn parse_git(rest: &str) -> Result<RemoteUrl, TransportError> {
    let (authority, path) = match rest.find('/') {
        Some(slash) => (&rest[..slash], &rest[slash..]),
        None => (rest, "/"),
    };
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| TransportError::InvalidUrl(format!("invalid port '{port}'")))?;
            (host, Some(port))
        }
        None => (authority, None),
    };
    if host.is_empty() {
        return Err(TransportError::InvalidUrl(format!("missing host in git://{rest}")));
    }
    Ok(RemoteUrl {
        scheme: Scheme::Git,
        host: Some(host.to_string()),
        port,
        path: path.to_string(),
    })
}

impl fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scheme {
            Scheme::Local => f.write_str(&self.path),
            Scheme::File => write!(f, "file://{}", self.path),
            Scheme::Git => {
                write!(f, "git://{}", self.host.as_deref().unwrap_or(""))?;
                if let Some(port) = self.port {
                    write!(f, ":{port}")?;
                }
                f.write_str(&self.path)
            }
        }
    }
}
