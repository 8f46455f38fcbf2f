//! Entry headers: a type code in bits 4-6 of the first byte followed by a
//! little-endian base-128 size, then an OFS_DELTA distance or a REF_DELTA
//! base id for delta entries.

use grove_hash::{ObjectId, RAW_LEN};
use grove_object::ObjectKind;

use crate::PackError;

pub const TYPE_COMMIT: u8 = 1;
pub const TYPE_TREE: u8 = 2;
pub const TYPE_BLOB: u8 = 3;
pub const TYPE_TAG: u8 = 4;
pub const TYPE_OFS_DELTA: u8 = 6;
pub const TYPE_REF_DELTA: u8 = 7;

/// What an entry stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Base(ObjectKind),
    /// Delta against the entry at this absolute offset.
    OfsDelta { base_offset: u64 },
    /// Delta against the object with this id.
    RefDelta { base: ObjectId },
}

#[derive(Debug, Clone, Copy)]
pub struct EntryHeader {
    pub kind: EntryKind,
    /// Inflated size of the entry's data (the delta stream for deltas).
    pub size: u64,
    /// Bytes from the entry start to the compressed data.
    pub header_len: usize,
}

pub fn type_code(kind: ObjectKind) -> u8 {
    match kind {
        ObjectKind::Commit => TYPE_COMMIT,
        ObjectKind::Tree => TYPE_TREE,
        ObjectKind::Blob => TYPE_BLOB,
        ObjectKind::Tag => TYPE_TAG,
    }
}

fn corrupt(offset: u64, reason: &str) -> PackError {
    PackError::CorruptEntry {
        offset,
        reason: reason.into(),
    }
}

/// Parse the header of the entry that starts at `data[0]`, located at
/// absolute pack offset `offset`.
pub fn parse_header(data: &[u8], offset: u64) -> Result<EntryHeader, PackError> {
    let mut bytes = data.iter().copied();
    let mut next = || bytes.next().ok_or_else(|| corrupt(offset, "truncated header"));

    let first = next()?;
    let code = (first >> 4) & 0x07;
    let mut size = (first & 0x0f) as u64;
    let mut shift = 4;
    let mut byte = first;
    let mut pos = 1;
    while byte & 0x80 != 0 {
        byte = next()?;
        pos += 1;
        if shift > 57 {
            return Err(corrupt(offset, "size overflow"));
        }
        size |= ((byte & 0x7f) as u64) << shift;
        shift += 7;
    }

    let kind = match code {
        TYPE_COMMIT => EntryKind::Base(ObjectKind::Commit),
        TYPE_TREE => EntryKind::Base(ObjectKind::Tree),
        TYPE_BLOB => EntryKind::Base(ObjectKind::Blob),
        TYPE_TAG => EntryKind::Base(ObjectKind::Tag),
        TYPE_OFS_DELTA => {
            let mut c = next()?;
            pos += 1;
            let mut distance = (c & 0x7f) as u64;
            while c & 0x80 != 0 {
                c = next()?;
                pos += 1;
                distance = distance
                    .checked_add(1)
                    .and_then(|d| d.checked_mul(128))
                    .ok_or_else(|| corrupt(offset, "delta offset overflow"))?
                    | (c & 0x7f) as u64;
            }
            if distance == 0 || distance > offset {
                return Err(corrupt(offset, "delta base offset out of range"));
            }
            EntryKind::OfsDelta {
                base_offset: offset - distance,
            }
        }
        TYPE_REF_DELTA => {
            let raw = data
                .get(pos..pos + RAW_LEN)
                .ok_or_else(|| corrupt(offset, "truncated base id"))?;
            pos += RAW_LEN;
            EntryKind::RefDelta {
                base: ObjectId::from_bytes(raw)?,
            }
        }
        _ => return Err(corrupt(offset, "unknown entry type")),
    };

    Ok(EntryHeader {
        kind,
        size,
        header_len: pos,
    })
}

/// Type-and-size prefix shared by every entry.
pub fn encode_header(code: u8, size: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    let mut rest = size >> 4;
    let mut c = (code << 4) | (size & 0x0f) as u8;
    while rest > 0 {
        out.push(c | 0x80);
        c = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    out.push(c);
    out
}

/// OFS_DELTA distance encoding (big-endian base-128 with the +1 bias).
pub fn encode_ofs_distance(distance: u64) -> Vec<u8> {
    let mut out = vec![(distance & 0x7f) as u8];
    let mut rest = distance >> 7;
    while rest > 0 {
        rest -= 1;
        out.push(0x80 | (rest & 0x7f) as u8);
        rest >>= 7;
    }
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_header_round_trip() {
        for size in [0u64, 15, 16, 127, 128, 1 << 20, u32::MAX as u64] {
            let bytes = encode_header(TYPE_BLOB, size);
            let hdr = parse_header(&bytes, 12).unwrap();
            assert_eq!(hdr.kind, EntryKind::Base(ObjectKind::Blob));
            assert_eq!(hdr.size, size);
            assert_eq!(hdr.header_len, bytes.len());
        }
    }

    #[test]
    fn ofs_distance_round_trip() {
        for distance in [1u64, 127, 128, 16511, 16512, 1 << 30] {
            let mut bytes = encode_header(TYPE_OFS_DELTA, 10);
            bytes.extend(encode_ofs_distance(distance));
            let offset = distance + 100;
            let hdr = parse_header(&bytes, offset).unwrap();
            assert_eq!(hdr.kind, EntryKind::OfsDelta { base_offset: 100 });
            assert_eq!(hdr.header_len, bytes.len());
        }
    }

    #[test]
    fn ref_delta_reads_base() {
        let base = ObjectId::new([9; 20]);
        let mut bytes = encode_header(TYPE_REF_DELTA, 3);
        bytes.extend_from_slice(base.as_bytes());
        let hdr = parse_header(&bytes, 12).unwrap();
        assert_eq!(hdr.kind, EntryKind::RefDelta { base });
    }

    #[test]
    fn ofs_before_pack_start_is_corrupt() {
        let mut bytes = encode_header(TYPE_OFS_DELTA, 1);
        bytes.extend(encode_ofs_distance(50));
        assert!(parse_header(&bytes, 12).is_err());
    }

    #[test]
    fn type_five_is_reserved() {
        assert!(parse_header(&[0x50], 12).is_err());
    }
}
