use grove_hash::Hasher;

use crate::entry::IndexEntry;
use crate::read::{
    entry_size, EXT_INTENT_TO_ADD, EXT_SKIP_WORKTREE, FLAG_ASSUME_VALID, FLAG_EXTENDED, NAME_MASK,
    SIGNATURE,
};
use crate::{Index, IndexError};

pub(crate) fn serialize(index: &Index) -> Result<Vec<u8>, IndexError> {
    let version = index.version();
    let mut buf = Vec::with_capacity(12 + index.len() * 80 + 20);
    buf.extend_from_slice(SIGNATURE);
    buf.extend_from_slice(&version.to_be_bytes());
    buf.extend_from_slice(&(index.len() as u32).to_be_bytes());
    for entry in index.iter() {
        write_entry(&mut buf, entry, version);
    }
    let checksum = Hasher::digest(&buf)?;
    buf.extend_from_slice(checksum.as_bytes());
    Ok(buf)
}

fn write_entry(buf: &mut Vec<u8>, entry: &IndexEntry, version: u32) {
    let start = buf.len();
    let stat = &entry.stat;
    for field in [
        stat.ctime_secs,
        stat.ctime_nsecs,
        stat.mtime_secs,
        stat.mtime_nsecs,
        stat.dev,
        stat.ino,
        entry.mode.raw(),
        stat.uid,
        stat.gid,
        stat.size,
    ] {
        buf.extend_from_slice(&field.to_be_bytes());
    }
    buf.extend_from_slice(entry.oid.as_bytes());

    let extended = version >= 3 && entry.flags.has_extended();
    let mut flags = (entry.path.len().min(NAME_MASK as usize)) as u16;
    flags |= (entry.stage.as_u8() as u16) << 12;
    if entry.flags.assume_valid {
        flags |= FLAG_ASSUME_VALID;
    }
    if extended {
        flags |= FLAG_EXTENDED;
    }
    buf.extend_from_slice(&flags.to_be_bytes());
    if extended {
        let mut bits = 0u16;
        if entry.flags.intent_to_add {
            bits |= EXT_INTENT_TO_ADD;
        }
        if entry.flags.skip_worktree {
            bits |= EXT_SKIP_WORKTREE;
        }
        buf.extend_from_slice(&bits.to_be_bytes());
    }

    buf.extend_from_slice(&entry.path);
    let size = entry_size(if extended { 4 } else { 2 }, entry.path.len());
    buf.resize(start + size, 0);
}
