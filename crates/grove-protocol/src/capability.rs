//! Capability lists.
//!
//! The server appends its capabilities after a NUL on the first advertised
//! ref line; the client names the ones it wants on its first `want` line.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    entries: Vec<(String, Option<String>)>,
}

impl Capabilities {
    /// Parse a space-separated list of `name` or `name=value` items.
    pub fn parse(list: &str) -> Self {
        let entries = list
            .split_whitespace()
            .map(|cap| match cap.split_once('=') {
                Some((name, value)) => (name.to_owned(), Some(value.to_owned())),
                None => (cap.to_owned(), None),
            })
            .collect();
        Self { entries }
    }

    pub fn push(&mut self, name: &str, value: Option<&str>) {
        self.entries.push((name.to_owned(), value.map(str::to_owned)));
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Value of the first `name=value` entry.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// What a client asks for from a server offering `self`.
    ///
    /// Only single-ACK negotiation is spoken, so `multi_ack` variants are
    /// never requested.
    pub fn client_request(&self) -> Capabilities {
        let mut wanted = Capabilities::default();
        for name in ["side-band-64k", "ofs-delta", "thin-pack", "include-tag"] {
            if self.has(name) {
                wanted.push(name, None);
            }
        }
        wanted.push("agent", Some(crate::AGENT));
        wanted
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match value {
                Some(v) => write!(f, "{}={}", name, v)?,
                None => f.write_str(name)?,
            }
        }
        Ok(())
    }
}
