use std::fs::File;
use std::io::{self, BufReader, Read};

use flate2::bufread::ZlibDecoder;
use grove_hash::ObjectId;
use grove_object::{compute_id, header, ObjectKind};

use crate::{LooseError, LooseStore};

/// Decompressing reader positioned at the start of a loose object's payload
/// and limited to its declared length.
pub type LooseReader = io::Take<ZlibDecoder<BufReader<File>>>;

impl LooseStore {
    fn open(&self, oid: &ObjectId) -> Result<Option<File>, LooseError> {
        match File::open(self.path_of(oid)) {
            Ok(f) => Ok(Some(f)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and verify an object. The payload is re-hashed and compared
    /// with `oid` before it is returned.
    pub fn read(&self, oid: &ObjectId) -> Result<Option<(ObjectKind, Vec<u8>)>, LooseError> {
        let Some(file) = self.open(oid)? else {
            return Ok(None);
        };
        let mut raw = Vec::new();
        ZlibDecoder::new(BufReader::new(file))
            .read_to_end(&mut raw)
            .map_err(|e| LooseError::Corrupt {
                oid: *oid,
                reason: format!("zlib: {}", e),
            })?;
        let (kind, size, header_len) = header::parse(&raw).map_err(|e| LooseError::Corrupt {
            oid: *oid,
            reason: e.to_string(),
        })?;
        if raw.len() - header_len != size {
            return Err(LooseError::Corrupt {
                oid: *oid,
                reason: format!("declared {} bytes, found {}", size, raw.len() - header_len),
            });
        }
        let payload = raw.split_off(header_len);
        let actual = compute_id(kind, &payload)?;
        if actual != *oid {
            return Err(LooseError::HashMismatch {
                expected: *oid,
                actual,
            });
        }
        Ok(Some((kind, payload)))
    }

    /// Decompress just enough to learn kind and size.
    pub fn read_header(&self, oid: &ObjectId) -> Result<Option<(ObjectKind, usize)>, LooseError> {
        Ok(self.stream(oid)?.map(|(kind, size, _)| (kind, size)))
    }

    /// Open a streaming reader over the payload. The caller is responsible
    /// for digest verification of the streamed bytes.
    pub fn stream(
        &self,
        oid: &ObjectId,
    ) -> Result<Option<(ObjectKind, usize, LooseReader)>, LooseError> {
        let Some(file) = self.open(oid)? else {
            return Ok(None);
        };
        let mut decoder = ZlibDecoder::new(BufReader::new(file));
        let mut hdr = Vec::with_capacity(header::MAX_HEADER_LEN);
        let mut byte = [0u8; 1];
        loop {
            if hdr.len() >= header::MAX_HEADER_LEN {
                return Err(LooseError::Corrupt {
                    oid: *oid,
                    reason: "header too long".into(),
                });
            }
            let n = decoder.read(&mut byte).map_err(|e| LooseError::Corrupt {
                oid: *oid,
                reason: format!("zlib: {}", e),
            })?;
            if n == 0 {
                return Err(LooseError::Corrupt {
                    oid: *oid,
                    reason: "truncated header".into(),
                });
            }
            hdr.push(byte[0]);
            if byte[0] == 0 {
                break;
            }
        }
        let (kind, size, _) = header::parse(&hdr).map_err(|e| LooseError::Corrupt {
            oid: *oid,
            reason: e.to_string(),
        })?;
        Ok(Some((kind, size, decoder.take(size as u64))))
    }
}
