//! Ref advertisement.
//!
//! The first thing an upload server sends: one `<id> <name>` line per ref,
//! `HEAD` first, capabilities after a NUL on the first line, and a
//! `<id> <name>^{}` line after each annotated tag giving its peeled target.
//! An empty repository advertises the null id under `capabilities^{}`.

use std::collections::HashMap;
use std::io::{Read, Write};

use bstr::ByteSlice;
use grove_hash::ObjectId;
use grove_ref::RefName;
use grove_transport::Transport;

use crate::capability::Capabilities;
use crate::pktline::{PktLineReader, PktLineWriter};
use crate::{chomp, ProtocolError};

const EMPTY_MARKER: &[u8] = b"capabilities^{}";

#[derive(Debug, Clone, Default)]
pub struct Advertisement {
    /// Refs in advertised order.
    pub refs: Vec<(RefName, ObjectId)>,
    /// Peeled targets of annotated tags.
    pub peeled: HashMap<RefName, ObjectId>,
    pub capabilities: Capabilities,
    /// The branch the server's `HEAD` points at, when it says so.
    pub head_symref: Option<RefName>,
}

impl Advertisement {
    pub fn get(&self, name: &RefName) -> Option<ObjectId> {
        self.refs.iter().find(|(n, _)| n == name).map(|(_, id)| *id)
    }

    pub fn head(&self) -> Option<ObjectId> {
        self.get(&RefName::head())
    }

    /// Whether `id` is an advertised tip or the peeled target of one.
    pub fn offers(&self, id: &ObjectId) -> bool {
        self.refs.iter().any(|(_, tip)| tip == id) || self.peeled.values().any(|p| p == id)
    }

    /// The branch the server's `HEAD` names.
    ///
    /// Uses `symref=HEAD:` when advertised; otherwise picks a branch at the
    /// same commit, preferring `main`, then `master`.
    pub fn guess_head(&self) -> Option<RefName> {
        if let Some(name) = &self.head_symref {
            return Some(name.clone());
        }
        let head = self.head()?;
        let candidates: Vec<&RefName> = self
            .refs
            .iter()
            .filter(|(name, id)| name.is_branch() && *id == head)
            .map(|(name, _)| name)
            .collect();
        ["refs/heads/main", "refs/heads/master"]
            .iter()
            .find_map(|preferred| candidates.iter().find(|n| n.as_str() == *preferred))
            .or_else(|| candidates.first())
            .map(|n| (*n).clone())
    }

    /// Read an advertisement up to its closing flush.
    pub fn read_from<R: Read>(reader: &mut PktLineReader<R>) -> Result<Self, ProtocolError> {
        let mut adv = Advertisement::default();
        let mut first = true;

        while let Some(line) = reader.read_line()? {
            let line = chomp(&line);
            if let Some(message) = line.strip_prefix(b"ERR ") {
                return Err(ProtocolError::Remote(message.to_str_lossy().into_owned()));
            }

            let line = if first {
                first = false;
                match line.split_once_str(b"\0") {
                    Some((refline, caps)) => {
                        adv.capabilities = Capabilities::parse(&caps.to_str_lossy());
                        refline
                    }
                    None => line,
                }
            } else {
                line
            };

            let (hex, name) = line
                .split_once_str(b" ")
                .ok_or_else(|| ProtocolError::UnexpectedPacket(line.to_str_lossy().into_owned()))?;
            let id = ObjectId::from_hex(hex)?;
            if name == EMPTY_MARKER {
                continue;
            }
            if let Some(base) = name.strip_suffix(b"^{}") {
                if let Ok(base) = RefName::new(base) {
                    adv.peeled.insert(base, id);
                }
                continue;
            }
            match RefName::new(name) {
                Ok(name) => adv.refs.push((name, id)),
                Err(err) => {
                    tracing::warn!(name = %name.as_bstr(), %err, "ignoring advertised ref");
                }
            }
        }

        adv.head_symref = adv
            .capabilities
            .get("symref")
            .and_then(|v| v.strip_prefix("HEAD:"))
            .and_then(|target| RefName::new(target).ok());
        Ok(adv)
    }

    /// Send this advertisement, ending with a flush.
    pub fn write_to<W: Write>(&self, writer: &mut PktLineWriter<W>) -> Result<(), ProtocolError> {
        let caps = self.capabilities.to_string();
        if self.refs.is_empty() {
            let mut line = format!("{} ", ObjectId::NULL).into_bytes();
            line.extend_from_slice(EMPTY_MARKER);
            line.push(0);
            line.extend_from_slice(caps.as_bytes());
            line.push(b'\n');
            writer.write_line(&line)?;
        }
        for (i, (name, id)) in self.refs.iter().enumerate() {
            let mut line = format!("{} ", id).into_bytes();
            line.extend_from_slice(name.as_bstr());
            if i == 0 {
                line.push(0);
                line.extend_from_slice(caps.as_bytes());
            }
            line.push(b'\n');
            writer.write_line(&line)?;
            if let Some(peeled) = self.peeled.get(name) {
                writer.write_text(&format!("{} {}^{{}}", peeled, name))?;
            }
        }
        writer.write_flush()?;
        writer.flush()
    }
}

/// Read the ref advertisement that opens a fetch.
pub fn advertise(transport: &mut dyn Transport) -> Result<Advertisement, ProtocolError> {
    let mut reader = PktLineReader::new(transport.reader());
    let adv = Advertisement::read_from(&mut reader)?;
    tracing::debug!(
        refs = adv.refs.len(),
        capabilities = %adv.capabilities,
        "received advertisement"
    );
    Ok(adv)
}
