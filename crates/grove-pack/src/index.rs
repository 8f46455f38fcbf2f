//! idx v2: `\377tOc`, version, 256-entry cumulative fanout, sorted ids,
//! CRC32 per entry, 31-bit offsets (MSB set means "index into the 64-bit
//! table"), the 64-bit table, then the pack checksum and the idx checksum.

use std::fs::File;
use std::path::{Path, PathBuf};

use grove_hash::{Hasher, ObjectId, RAW_LEN};
use memmap2::Mmap;

use crate::{PackError, IDX_SIGNATURE, IDX_VERSION};

const HEADER_LEN: usize = 8;
const FANOUT_LEN: usize = 256 * 4;

/// One object's location in a pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    pub oid: ObjectId,
    pub offset: u64,
    pub crc32: u32,
}

/// A memory-mapped `.idx` file.
pub struct PackIndex {
    data: Mmap,
    count: usize,
    path: PathBuf,
}

fn be32(data: &[u8], at: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&data[at..at + 4]);
    u32::from_be_bytes(b)
}

impl PackIndex {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PackError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        // SAFETY: idx files are never modified after installation; they are
        // replaced only by rename, which leaves existing mappings intact.
        let data = unsafe { Mmap::map(&file)? };

        if data.len() < HEADER_LEN + FANOUT_LEN + 2 * RAW_LEN {
            return Err(PackError::BadIndex(format!("{} is too small", path.display())));
        }
        if data[..4] != IDX_SIGNATURE {
            return Err(PackError::BadIndex("missing \\377tOc signature".into()));
        }
        let version = be32(&data, 4);
        if version != IDX_VERSION {
            return Err(PackError::BadIndex(format!("unsupported version {}", version)));
        }
        let mut prev = 0;
        for i in 0..256 {
            let v = be32(&data, HEADER_LEN + i * 4);
            if v < prev {
                return Err(PackError::BadIndex("fanout is not monotonic".into()));
            }
            prev = v;
        }
        let count = prev as usize;
        let min = HEADER_LEN + FANOUT_LEN + count * (RAW_LEN + 8) + 2 * RAW_LEN;
        if data.len() < min {
            return Err(PackError::BadIndex(format!(
                "{} entries need {} bytes, file has {}",
                count,
                min,
                data.len()
            )));
        }
        Ok(Self { data, count, path })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ids_at(&self) -> usize {
        HEADER_LEN + FANOUT_LEN
    }

    fn crcs_at(&self) -> usize {
        self.ids_at() + self.count * RAW_LEN
    }

    fn offsets_at(&self) -> usize {
        self.crcs_at() + self.count * 4
    }

    fn large_offsets_at(&self) -> usize {
        self.offsets_at() + self.count * 4
    }

    fn raw_id(&self, i: usize) -> &[u8] {
        let at = self.ids_at() + i * RAW_LEN;
        &self.data[at..at + RAW_LEN]
    }

    pub fn oid_at(&self, i: usize) -> ObjectId {
        let mut raw = [0u8; RAW_LEN];
        raw.copy_from_slice(self.raw_id(i));
        ObjectId::new(raw)
    }

    pub fn crc32_at(&self, i: usize) -> u32 {
        be32(&self.data, self.crcs_at() + i * 4)
    }

    pub fn offset_at(&self, i: usize) -> Result<u64, PackError> {
        let small = be32(&self.data, self.offsets_at() + i * 4);
        if small & 0x8000_0000 == 0 {
            return Ok(small as u64);
        }
        let at = self.large_offsets_at() + (small & 0x7fff_ffff) as usize * 8;
        let raw = self
            .data
            .get(at..at + 8)
            .ok_or_else(|| PackError::BadIndex("64-bit offset out of range".into()))?;
        let mut b = [0u8; 8];
        b.copy_from_slice(raw);
        Ok(u64::from_be_bytes(b))
    }

    /// Position of `oid` in the sorted id table.
    pub fn position(&self, oid: &ObjectId) -> Option<usize> {
        let first = oid.first_byte() as usize;
        let hi = be32(&self.data, HEADER_LEN + first * 4) as usize;
        let lo = if first == 0 {
            0
        } else {
            be32(&self.data, HEADER_LEN + (first - 1) * 4) as usize
        };
        let (mut lo, mut hi) = (lo, hi.min(self.count));
        let needle = &oid.as_bytes()[..];
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.raw_id(mid).cmp(needle) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return Some(mid),
            }
        }
        None
    }

    pub fn lookup(&self, oid: &ObjectId) -> Result<Option<u64>, PackError> {
        self.position(oid).map(|i| self.offset_at(i)).transpose()
    }

    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.position(oid).is_some()
    }

    /// The checksum of the `.pack` this index describes.
    pub fn pack_checksum(&self) -> ObjectId {
        let at = self.data.len() - 2 * RAW_LEN;
        let mut raw = [0u8; RAW_LEN];
        raw.copy_from_slice(&self.data[at..at + RAW_LEN]);
        ObjectId::new(raw)
    }

    pub fn oids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        (0..self.count).map(move |i| self.oid_at(i))
    }

    /// Recompute the trailing idx checksum.
    pub fn verify(&self) -> Result<(), PackError> {
        let body = self.data.len() - RAW_LEN;
        let actual = Hasher::digest(&self.data[..body])?;
        let expected = ObjectId::from_bytes(&self.data[body..])?;
        if actual != expected {
            return Err(PackError::ChecksumMismatch { expected, actual });
        }
        Ok(())
    }
}

/// Serialize an idx v2 for `records` (sorted in place by id).
pub fn write_index(records: &mut [IndexRecord], pack_checksum: &ObjectId) -> Result<Vec<u8>, PackError> {
    records.sort_by(|a, b| a.oid.cmp(&b.oid));
    let mut out = Vec::with_capacity(HEADER_LEN + FANOUT_LEN + records.len() * 28 + 2 * RAW_LEN);
    out.extend_from_slice(&IDX_SIGNATURE);
    out.extend_from_slice(&IDX_VERSION.to_be_bytes());

    let mut fanout = [0u32; 256];
    for r in records.iter() {
        fanout[r.oid.first_byte() as usize] += 1;
    }
    let mut running = 0u32;
    for bucket in fanout {
        running += bucket;
        out.extend_from_slice(&running.to_be_bytes());
    }
    for r in records.iter() {
        out.extend_from_slice(r.oid.as_bytes());
    }
    for r in records.iter() {
        out.extend_from_slice(&r.crc32.to_be_bytes());
    }
    let mut large = Vec::new();
    for r in records.iter() {
        if r.offset < 0x8000_0000 {
            out.extend_from_slice(&(r.offset as u32).to_be_bytes());
        } else {
            out.extend_from_slice(&(0x8000_0000 | large.len() as u32).to_be_bytes());
            large.push(r.offset);
        }
    }
    for offset in large {
        out.extend_from_slice(&offset.to_be_bytes());
    }
    out.extend_from_slice(pack_checksum.as_bytes());
    let own = Hasher::digest(&out)?;
    out.extend_from_slice(own.as_bytes());
    Ok(out)
}
