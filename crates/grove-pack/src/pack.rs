use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::bufread::ZlibDecoder;
use grove_hash::{ObjectId, RAW_LEN};
use grove_object::ObjectKind;
use memmap2::Mmap;

use crate::entry::{parse_header, EntryKind};
use crate::index::PackIndex;
use crate::{delta, PackError, MAX_DELTA_CHAIN_DEPTH, PACK_HEADER_LEN, PACK_SIGNATURE, PACK_VERSION};

/// Looks up delta bases that live outside this pack.
pub type ExternalBase<'a> = &'a dyn Fn(&ObjectId) -> Option<(ObjectKind, Vec<u8>)>;

/// A memory-mapped `.pack` with its `.idx`.
pub struct PackFile {
    data: Mmap,
    index: PackIndex,
    path: PathBuf,
}

/// Streaming reader over one packed object's content.
pub type PackStream = Box<dyn Read + Send>;

pub(crate) fn check_header(data: &[u8]) -> Result<u32, PackError> {
    if data.len() < PACK_HEADER_LEN + RAW_LEN {
        return Err(PackError::BadHeader("file too small".into()));
    }
    if &data[..4] != PACK_SIGNATURE {
        return Err(PackError::BadHeader("missing PACK signature".into()));
    }
    let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    if version != PACK_VERSION {
        return Err(PackError::UnsupportedVersion(version));
    }
    Ok(u32::from_be_bytes([data[8], data[9], data[10], data[11]]))
}

/// Inflate the zlib stream at the start of `data`, expecting `size` bytes.
/// Returns the content and the number of compressed bytes consumed.
pub(crate) fn inflate(data: &[u8], size: u64, offset: u64) -> Result<(Vec<u8>, usize), PackError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(size.min(1 << 24) as usize);
    decoder
        .by_ref()
        .take(size + 1)
        .read_to_end(&mut out)
        .map_err(|e| PackError::CorruptEntry {
            offset,
            reason: format!("zlib: {}", e),
        })?;
    if out.len() as u64 != size {
        return Err(PackError::CorruptEntry {
            offset,
            reason: format!("inflated to {} bytes, header says {}", out.len(), size),
        });
    }
    Ok((out, decoder.total_in() as usize))
}

impl PackFile {
    /// Open `pack-*.pack` and the `.idx` beside it.
    pub fn open(pack_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let path = pack_path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        // SAFETY: packs are immutable once installed.
        let data = unsafe { Mmap::map(&file)? };
        let count = check_header(&data)?;
        let index = PackIndex::open(path.with_extension("idx"))?;
        if index.len() != count as usize {
            return Err(PackError::CountMismatch {
                declared: count,
                actual: index.len() as u32,
            });
        }
        Ok(Self { data, index, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.index.contains(oid)
    }

    /// The trailing SHA-1, which also names the pack.
    pub fn checksum(&self) -> ObjectId {
        let mut raw = [0u8; RAW_LEN];
        raw.copy_from_slice(&self.data[self.data.len() - RAW_LEN..]);
        ObjectId::new(raw)
    }

    fn entry_slice(&self, offset: u64) -> Result<&[u8], PackError> {
        let end = self.data.len() - RAW_LEN;
        let start = usize::try_from(offset).ok().filter(|&s| s >= PACK_HEADER_LEN && s < end);
        start
            .map(|s| &self.data[s..end])
            .ok_or_else(|| PackError::CorruptEntry {
                offset,
                reason: "offset outside pack body".into(),
            })
    }

    /// Read and fully resolve the object stored at `offset`.
    ///
    /// Delta chains are walked iteratively, then applied from the base
    /// outward. REF_DELTA bases missing from this pack are requested from
    /// `external`.
    pub fn read_at(
        &self,
        offset: u64,
        external: ExternalBase<'_>,
    ) -> Result<(ObjectKind, Vec<u8>), PackError> {
        let mut deltas: Vec<Vec<u8>> = Vec::new();
        let mut at = offset;
        let (kind, mut content) = loop {
            if deltas.len() >= MAX_DELTA_CHAIN_DEPTH {
                return Err(PackError::ChainTooDeep(offset));
            }
            let slice = self.entry_slice(at)?;
            let header = parse_header(slice, at)?;
            let (data, _) = inflate(&slice[header.header_len..], header.size, at)?;
            match header.kind {
                EntryKind::Base(kind) => break (kind, data),
                EntryKind::OfsDelta { base_offset } => {
                    deltas.push(data);
                    at = base_offset;
                }
                EntryKind::RefDelta { base } => {
                    deltas.push(data);
                    match self.index.lookup(&base)? {
                        Some(next) => at = next,
                        None => break external(&base).ok_or(PackError::MissingBase(base))?,
                    }
                }
            }
        };
        for d in deltas.iter().rev() {
            content = delta::apply(&content, d)?;
        }
        Ok((kind, content))
    }

    pub fn read(
        &self,
        oid: &ObjectId,
        external: ExternalBase<'_>,
    ) -> Result<Option<(ObjectKind, Vec<u8>)>, PackError> {
        match self.index.lookup(oid)? {
            Some(offset) => self.read_at(offset, external).map(Some),
            None => Ok(None),
        }
    }

    /// Kind and size without applying deltas. Only the delta at the head
    /// of the chain is inflated (for its target size).
    pub fn header(
        &self,
        oid: &ObjectId,
        external: ExternalBase<'_>,
    ) -> Result<Option<(ObjectKind, u64)>, PackError> {
        let Some(offset) = self.index.lookup(oid)? else {
            return Ok(None);
        };
        let slice = self.entry_slice(offset)?;
        let head = parse_header(slice, offset)?;
        let size = match head.kind {
            EntryKind::Base(kind) => return Ok(Some((kind, head.size))),
            _ => {
                let (d, _) = inflate(&slice[head.header_len..], head.size, offset)?;
                delta::sizes(&d)?.1
            }
        };
        let mut entry = head;
        let mut at = offset;
        for _ in 0..MAX_DELTA_CHAIN_DEPTH {
            match entry.kind {
                EntryKind::Base(kind) => return Ok(Some((kind, size))),
                EntryKind::OfsDelta { base_offset } => at = base_offset,
                EntryKind::RefDelta { base } => match self.index.lookup(&base)? {
                    Some(next) => at = next,
                    None => {
                        let (kind, _) = external(&base).ok_or(PackError::MissingBase(base))?;
                        return Ok(Some((kind, size)));
                    }
                },
            }
            entry = parse_header(self.entry_slice(at)?, at)?;
        }
        Err(PackError::ChainTooDeep(offset))
    }

    /// Open a stream over an object's content. Whole (non-delta) entries
    /// are inflated lazily straight from the mapping; deltas are resolved
    /// first and served from memory.
    pub fn stream(
        self: &Arc<Self>,
        oid: &ObjectId,
        external: ExternalBase<'_>,
    ) -> Result<Option<(ObjectKind, u64, PackStream)>, PackError> {
        let Some(offset) = self.index.lookup(oid)? else {
            return Ok(None);
        };
        let slice = self.entry_slice(offset)?;
        let header = parse_header(slice, offset)?;
        if let EntryKind::Base(kind) = header.kind {
            let start = offset as usize + header.header_len;
            let reader = MappedReader {
                pack: Arc::clone(self),
                pos: start,
            };
            let stream = flate2::read::ZlibDecoder::new(reader).take(header.size);
            return Ok(Some((kind, header.size, Box::new(stream))));
        }
        let (kind, content) = self.read_at(offset, external)?;
        let size = content.len() as u64;
        Ok(Some((kind, size, Box::new(Cursor::new(content)))))
    }
}

/// `Read` over the mapped pack body from a fixed position; keeps the pack
/// alive for as long as the stream exists.
struct MappedReader {
    pack: Arc<PackFile>,
    pos: usize,
}

impl Read for MappedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let end = self.pack.data.len() - RAW_LEN;
        let available = end.saturating_sub(self.pos);
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&self.pack.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
