use std::io::{self, Read};

use grove_hash::{Hasher, ObjectId};
use grove_object::{header, ObjectKind};

/// Streaming view of an object's payload.
///
/// Bytes are hashed as they pass through; once the underlying reader is
/// exhausted the digest and length are compared with the requested id, and
/// a mismatch is returned as an [`io::ErrorKind::InvalidData`] error instead
/// of end-of-file.
pub struct ObjectStream {
    oid: ObjectId,
    kind: ObjectKind,
    size: u64,
    inner: Box<dyn Read + Send>,
    hasher: Option<Hasher>,
    seen: u64,
}

impl ObjectStream {
    pub(crate) fn new(oid: ObjectId, kind: ObjectKind, size: u64, inner: Box<dyn Read + Send>) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(&header::encode(kind, size as usize));
        Self {
            oid,
            kind,
            size,
            inner,
            hasher: Some(hasher),
            seen: 0,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.oid
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Declared payload length.
    pub fn size(&self) -> u64 {
        self.size
    }

    fn verify(&mut self) -> io::Result<()> {
        let Some(hasher) = self.hasher.take() else {
            return Ok(());
        };
        if self.seen != self.size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("object {} ended after {} of {} bytes", self.oid, self.seen, self.size),
            ));
        }
        let actual = hasher
            .finalize()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if actual != self.oid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("object {} streamed content hashes to {}", self.oid, actual),
            ));
        }
        Ok(())
    }
}

impl Read for ObjectStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        if n == 0 {
            self.verify()?;
            return Ok(0);
        }
        self.seen += n as u64;
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(&buf[..n]);
        }
        Ok(n)
    }
}

impl std::fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStream")
            .field("oid", &self.oid)
            .field("kind", &self.kind)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
