use bstr::{BStr, BString, ByteSlice};
use grove_hash::ObjectId;
use grove_utils::Signature;

use crate::{ObjectError, ObjectKind};

/// A commit. `summary` is derived once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    /// Headers after `committer`, such as `encoding` or `gpgsig`, in order.
    /// Multi-line values are stored with their continuation lines joined by `\n`.
    pub extra_headers: Vec<(BString, BString)>,
    pub message: BString,
}

fn missing(field: &'static str) -> ObjectError {
    ObjectError::MissingField {
        kind: ObjectKind::Commit,
        field,
    }
}

fn bad_line(line: &[u8]) -> ObjectError {
    ObjectError::BadField {
        kind: ObjectKind::Commit,
        line: line.into(),
    }
}

/// Split the header block into `(key, value)` pairs, folding continuation
/// lines (leading space) into the previous value. Returns the pairs and the
/// message that follows the blank separator line.
pub(crate) fn split_headers(data: &[u8]) -> (Vec<(&[u8], Vec<u8>)>, &[u8]) {
    let mut headers: Vec<(&[u8], Vec<u8>)> = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let end = data[pos..].find_byte(b'\n').map_or(data.len(), |i| pos + i);
        let line = &data[pos..end];
        pos = (end + 1).min(data.len());
        if line.is_empty() {
            return (headers, &data[pos..]);
        }
        if let Some(cont) = line.strip_prefix(b" ") {
            if let Some((_, value)) = headers.last_mut() {
                value.push(b'\n');
                value.extend_from_slice(cont);
                continue;
            }
        }
        match line.find_byte(b' ') {
            Some(sp) => headers.push((&line[..sp], line[sp + 1..].to_vec())),
            None => headers.push((line, Vec::new())),
        }
    }
    (headers, &data[data.len()..])
}

pub(crate) fn write_header(out: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    out.extend_from_slice(key);
    out.push(b' ');
    for (i, line) in value.split(|&b| b == b'\n').enumerate() {
        if i > 0 {
            out.extend_from_slice(b"\n ");
        }
        out.extend_from_slice(line);
    }
    out.push(b'\n');
}

impl Commit {
    pub fn parse(data: &[u8]) -> Result<Self, ObjectError> {
        let (headers, message) = split_headers(data);
        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        let mut extra_headers = Vec::new();

        for (key, value) in headers {
            match key {
                b"tree" if tree.is_none() => {
                    tree = Some(ObjectId::from_hex(&value).map_err(|_| bad_line(&value))?)
                }
                b"parent" if author.is_none() => {
                    parents.push(ObjectId::from_hex(&value).map_err(|_| bad_line(&value))?)
                }
                b"author" if author.is_none() => author = Some(parse_signature(&value)?),
                b"committer" if committer.is_none() => {
                    committer = Some(parse_signature(&value)?)
                }
                _ => extra_headers.push((BString::from(key), BString::from(value))),
            }
        }

        Ok(Self {
            tree: tree.ok_or_else(|| missing("tree"))?,
            parents,
            author: author.ok_or_else(|| missing("author"))?,
            committer: committer.ok_or_else(|| missing("committer"))?,
            extra_headers,
            message: message.into(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.message.len());
        write_header(&mut out, b"tree", self.tree.to_hex().as_bytes());
        for parent in &self.parents {
            write_header(&mut out, b"parent", parent.to_hex().as_bytes());
        }
        write_header(&mut out, b"author", &self.author.to_bytes());
        write_header(&mut out, b"committer", &self.committer.to_bytes());
        for (key, value) in &self.extra_headers {
            write_header(&mut out, key, value);
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }

    /// First paragraph of the message, lines joined by spaces.
    pub fn summary(&self) -> BString {
        let mut out = BString::default();
        for line in self.message.lines() {
            let line = line.trim();
            if line.is_empty() {
                if out.is_empty() {
                    continue;
                }
                break;
            }
            if !out.is_empty() {
                out.push(b' ');
            }
            out.extend_from_slice(line);
        }
        out
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Committer time, the ordering key for history traversal.
    pub fn time(&self) -> i64 {
        self.committer.when.seconds
    }

    pub fn header(&self, key: &str) -> Option<&BStr> {
        self.extra_headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_bstr())
    }
}

pub(crate) fn parse_signature(value: &[u8]) -> Result<Signature, ObjectError> {
    Signature::parse(value.as_bstr()).map_err(|e| ObjectError::BadSignature(e.to_string()))
}
