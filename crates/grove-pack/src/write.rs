use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use grove_hash::{Hasher, ObjectId};
use grove_object::{compute_id, ObjectKind};

use crate::entry::{encode_header, encode_ofs_distance, type_code, TYPE_OFS_DELTA, TYPE_REF_DELTA};
use crate::index::IndexRecord;
use crate::{PackError, PACK_HEADER_LEN, PACK_SIGNATURE, PACK_VERSION};

/// Streams a pack to any writer: header first, entries as they are added,
/// SHA-1 trailer on [`finish`](PackWriter::finish).
///
/// The object count must be known up front because it is part of the
/// header; `finish` fails if a different number of entries was added.
pub struct PackWriter<W: Write> {
    out: W,
    hasher: Hasher,
    declared: u32,
    position: u64,
    records: Vec<IndexRecord>,
    compression: Compression,
}

impl<W: Write> PackWriter<W> {
    pub fn new(mut out: W, count: u32) -> Result<Self, PackError> {
        let mut header = [0u8; PACK_HEADER_LEN];
        header[..4].copy_from_slice(PACK_SIGNATURE);
        header[4..8].copy_from_slice(&PACK_VERSION.to_be_bytes());
        header[8..].copy_from_slice(&count.to_be_bytes());
        out.write_all(&header)?;
        let mut hasher = Hasher::new();
        hasher.update(&header);
        Ok(Self {
            out,
            hasher,
            declared: count,
            position: PACK_HEADER_LEN as u64,
            records: Vec::with_capacity((count as usize).min(1 << 16)),
            compression: Compression::default(),
        })
    }

    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = Compression::new(level.min(9));
        self
    }

    /// Offset the next entry will be written at.
    pub fn position(&self) -> u64 {
        self.position
    }

    fn emit(&mut self, oid: ObjectId, prefix: &[u8], payload: &[u8]) -> Result<u64, PackError> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(payload.len() / 2 + 16), self.compression);
        encoder.write_all(payload)?;
        let compressed = encoder.finish()?;

        let offset = self.position;
        let mut crc = crc32fast::Hasher::new();
        for part in [prefix, &compressed[..]] {
            self.out.write_all(part)?;
            self.hasher.update(part);
            crc.update(part);
            self.position += part.len() as u64;
        }
        self.records.push(IndexRecord {
            oid,
            offset,
            crc32: crc.finalize(),
        });
        Ok(offset)
    }

    /// Append a whole object; returns its offset.
    pub fn add_object(&mut self, kind: ObjectKind, payload: &[u8]) -> Result<u64, PackError> {
        let oid = compute_id(kind, payload)?;
        let header = encode_header(type_code(kind), payload.len() as u64);
        self.emit(oid, &header, payload)
    }

    /// Append `target` as a delta against the entry at `base_offset`.
    pub fn add_ofs_delta(
        &mut self,
        target: ObjectId,
        base_offset: u64,
        delta: &[u8],
    ) -> Result<u64, PackError> {
        let distance = self.position - base_offset;
        let mut prefix = encode_header(TYPE_OFS_DELTA, delta.len() as u64);
        prefix.extend(encode_ofs_distance(distance));
        self.emit(target, &prefix, delta)
    }

    /// Append `target` as a delta against `base`, which may live outside
    /// this pack (thin packs).
    pub fn add_ref_delta(
        &mut self,
        target: ObjectId,
        base: &ObjectId,
        delta: &[u8],
    ) -> Result<u64, PackError> {
        let mut prefix = encode_header(TYPE_REF_DELTA, delta.len() as u64);
        prefix.extend_from_slice(base.as_bytes());
        self.emit(target, &prefix, delta)
    }

    /// Copy already-encoded entries verbatim, for example the body of a
    /// received pack being completed with extra bases. The records must
    /// describe entries at the offsets they will occupy in this pack.
    pub(crate) fn add_raw(&mut self, body: &[u8], records: &[IndexRecord]) -> Result<(), PackError> {
        self.out.write_all(body)?;
        self.hasher.update(body);
        self.position += body.len() as u64;
        self.records.extend_from_slice(records);
        Ok(())
    }

    /// Write the trailer. Returns the writer, the pack checksum and one
    /// index record per entry in write order.
    pub fn finish(mut self) -> Result<(W, ObjectId, Vec<IndexRecord>), PackError> {
        let actual = self.records.len() as u32;
        if actual != self.declared {
            return Err(PackError::CountMismatch {
                declared: self.declared,
                actual,
            });
        }
        let checksum = self.hasher.finalize()?;
        self.out.write_all(checksum.as_bytes())?;
        self.out.flush()?;
        Ok((self.out, checksum, self.records))
    }
}
