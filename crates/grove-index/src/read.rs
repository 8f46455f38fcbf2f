use bstr::ByteSlice;
use grove_hash::{Hasher, ObjectId, RAW_LEN};
use grove_object::EntryMode;

use crate::entry::{EntryFlags, IndexEntry, StatData};
use crate::{Index, IndexError, Stage};

pub(crate) const SIGNATURE: &[u8; 4] = b"DIRC";
const HEADER_LEN: usize = 12;
const STAT_LEN: usize = 40;

pub(crate) const FLAG_ASSUME_VALID: u16 = 0x8000;
pub(crate) const FLAG_EXTENDED: u16 = 0x4000;
pub(crate) const NAME_MASK: u16 = 0x0fff;
pub(crate) const EXT_INTENT_TO_ADD: u16 = 0x2000;
pub(crate) const EXT_SKIP_WORKTREE: u16 = 0x4000;

/// On-disk size of an entry: fixed part plus name, NUL padded to 8 bytes.
pub(crate) fn entry_size(flags_len: usize, name_len: usize) -> usize {
    (STAT_LEN + RAW_LEN + flags_len + name_len + 8) & !7
}

fn be32(data: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn be16(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}

pub(crate) fn parse(data: &[u8]) -> Result<Index, IndexError> {
    if data.len() < HEADER_LEN + RAW_LEN {
        return Err(IndexError::InvalidHeader("file too short".into()));
    }
    if &data[..4] != SIGNATURE {
        return Err(IndexError::InvalidHeader("bad signature".into()));
    }
    let version = be32(data, 4);
    if !(2..=3).contains(&version) {
        return Err(IndexError::UnsupportedVersion(version));
    }

    let body_end = data.len() - RAW_LEN;
    let expected = ObjectId::from_bytes(&data[body_end..])?;
    let actual = Hasher::digest(&data[..body_end])?;
    if expected != actual {
        return Err(IndexError::ChecksumMismatch { expected, actual });
    }

    let count = be32(data, 8) as usize;
    let mut entries = Vec::with_capacity(count.min(body_end / entry_size(2, 1)));
    let mut offset = HEADER_LEN;
    for _ in 0..count {
        let (entry, size) = parse_entry(data, offset, body_end, version)?;
        entries.push(entry);
        offset += size;
    }

    while offset < body_end {
        if body_end - offset < 8 {
            return Err(IndexError::InvalidEntry {
                offset,
                reason: "trailing garbage after entries",
            });
        }
        let signature = &data[offset..offset + 4];
        let len = be32(data, offset + 4) as usize;
        let start = offset + 8;
        if len > body_end - start {
            return Err(IndexError::InvalidEntry {
                offset,
                reason: "extension runs past end of file",
            });
        }
        if !signature[0].is_ascii_uppercase() {
            return Err(IndexError::InvalidExtension(
                signature.to_str_lossy().into_owned(),
            ));
        }
        tracing::trace!(extension = %signature.as_bstr(), len, "skipping optional index extension");
        offset = start + len;
    }

    for pair in entries.windows(2) {
        if (pair[0].path.as_slice(), pair[0].stage) >= (pair[1].path.as_slice(), pair[1].stage) {
            return Err(IndexError::InvalidEntry {
                offset: HEADER_LEN,
                reason: "entries out of order",
            });
        }
    }
    Ok(Index { entries })
}

fn parse_entry(
    data: &[u8],
    offset: usize,
    body_end: usize,
    version: u32,
) -> Result<(IndexEntry, usize), IndexError> {
    let fixed = STAT_LEN + RAW_LEN + 2;
    if offset + fixed > body_end {
        return Err(IndexError::InvalidEntry {
            offset,
            reason: "truncated entry",
        });
    }
    let stat = StatData {
        ctime_secs: be32(data, offset),
        ctime_nsecs: be32(data, offset + 4),
        mtime_secs: be32(data, offset + 8),
        mtime_nsecs: be32(data, offset + 12),
        dev: be32(data, offset + 16),
        ino: be32(data, offset + 20),
        uid: be32(data, offset + 28),
        gid: be32(data, offset + 32),
        size: be32(data, offset + 36),
    };
    let mode = EntryMode::from_raw(be32(data, offset + 24))
        .filter(|m| !m.is_tree())
        .ok_or(IndexError::InvalidEntry {
            offset,
            reason: "invalid mode",
        })?;
    let oid = ObjectId::from_bytes(&data[offset + STAT_LEN..offset + STAT_LEN + RAW_LEN])?;
    let flags = be16(data, offset + STAT_LEN + RAW_LEN);

    let mut flags_len = 2;
    let mut entry_flags = EntryFlags {
        assume_valid: flags & FLAG_ASSUME_VALID != 0,
        ..EntryFlags::default()
    };
    if flags & FLAG_EXTENDED != 0 {
        if version < 3 {
            return Err(IndexError::InvalidEntry {
                offset,
                reason: "extended flags in a version 2 index",
            });
        }
        if offset + fixed + 2 > body_end {
            return Err(IndexError::InvalidEntry {
                offset,
                reason: "truncated extended flags",
            });
        }
        let extended = be16(data, offset + fixed);
        entry_flags.intent_to_add = extended & EXT_INTENT_TO_ADD != 0;
        entry_flags.skip_worktree = extended & EXT_SKIP_WORKTREE != 0;
        flags_len = 4;
    }

    let name_start = offset + STAT_LEN + RAW_LEN + flags_len;
    let rest = &data[name_start..body_end];
    let name_len = match flags & NAME_MASK {
        NAME_MASK => rest.find_byte(0).ok_or(IndexError::InvalidEntry {
            offset,
            reason: "unterminated path",
        })?,
        n => n as usize,
    };
    if rest.get(name_len) != Some(&0) {
        return Err(IndexError::InvalidEntry {
            offset,
            reason: "path is not NUL terminated",
        });
    }
    let path = &rest[..name_len];
    if path.is_empty() || path.contains(&0) {
        return Err(IndexError::InvalidEntry {
            offset,
            reason: "invalid path",
        });
    }
    let size = entry_size(flags_len, name_len);
    if offset + size > body_end {
        return Err(IndexError::InvalidEntry {
            offset,
            reason: "padding runs past end of file",
        });
    }
    if data[name_start + name_len..offset + size].iter().any(|&b| b != 0) {
        return Err(IndexError::InvalidEntry {
            offset,
            reason: "non-NUL padding",
        });
    }

    let entry = IndexEntry {
        path: path.into(),
        oid,
        mode,
        stage: Stage::from_bits(flags >> 12),
        stat,
        flags: entry_flags,
    };
    Ok((entry, size))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_extension(index: &Index, signature: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let data = index.to_bytes().unwrap();
        let mut body = data[..data.len() - RAW_LEN].to_vec();
        body.extend_from_slice(signature);
        body.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        body.extend_from_slice(payload);
        let sum = Hasher::digest(&body).unwrap();
        body.extend_from_slice(sum.as_bytes());
        body
    }

    fn sample() -> Index {
        Index::from_entries([IndexEntry::new(
            "a.txt",
            ObjectId::from_hex("ce013625030ba8dba906f756967f9e9ca394464a").unwrap(),
            EntryMode::Regular,
        )])
    }

    #[test]
    fn entry_size_matches_padding_rule() {
        assert_eq!(entry_size(2, 1), 64);
        assert_eq!(entry_size(2, 2), 72);
        assert_eq!(entry_size(4, 0), 72);
    }

    #[test]
    fn optional_extension_is_skipped() {
        let data = with_extension(&sample(), b"TREE", b"whatever");
        let index = parse(&data).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn required_extension_is_rejected() {
        let data = with_extension(&sample(), b"link", b"abc");
        assert!(matches!(parse(&data), Err(IndexError::InvalidExtension(s)) if s == "link"));
    }

    #[test]
    fn bad_signature() {
        let mut data = sample().to_bytes().unwrap();
        data[0] = b'X';
        assert!(matches!(parse(&data), Err(IndexError::InvalidHeader(_))));
    }

    #[test]
    fn version_four_is_unsupported() {
        let mut data = sample().to_bytes().unwrap();
        data[7] = 4;
        assert!(matches!(parse(&data), Err(IndexError::UnsupportedVersion(4))));
    }
}
