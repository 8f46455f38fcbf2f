//! The index: a sorted snapshot of staged paths.
//!
//! The index sits between the working tree and the object database. Each
//! entry records a path, the blob it is staged as and the stat data seen
//! when it was staged, which lets checkout and staging skip re-hashing
//! files that have not changed. On disk it is a DIRC file protected by a
//! trailing SHA-1 and replaced only through `index.lock`.

pub mod entry;
mod read;
mod stage;
mod tree;
mod write;

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use bstr::{BStr, ByteSlice};
use grove_utils::LockFile;
use memmap2::Mmap;

pub use entry::{EntryFlags, IndexEntry, StatData};
pub use error::IndexError;
pub use stage::{is_valid_path, work_path};

mod error {
    use std::path::PathBuf;

    use bstr::BString;
    use grove_hash::ObjectId;
    use grove_utils::LockError;

    #[derive(Debug, thiserror::Error)]
    pub enum IndexError {
        #[error("invalid index header: {0}")]
        InvalidHeader(String),

        #[error("unsupported index version: {0}")]
        UnsupportedVersion(u32),

        #[error("index checksum mismatch: expected {expected}, computed {actual}")]
        ChecksumMismatch { expected: ObjectId, actual: ObjectId },

        #[error("invalid index entry at offset {offset}: {reason}")]
        InvalidEntry { offset: usize, reason: &'static str },

        #[error("unsupported required index extension '{0}'")]
        InvalidExtension(String),

        #[error("invalid path '{0}'")]
        InvalidPath(BString),

        #[error("'{0}' is not a file")]
        NotAFile(BString),

        #[error("path '{0}' is unmerged")]
        Unmerged(BString),

        #[error("'{0}' is both a file and a directory in the index")]
        PathConflict(BString),

        #[error("unable to lock index '{}': held by another process", path.display())]
        LockContention { path: PathBuf },

        #[error(transparent)]
        Lock(LockError),

        #[error(transparent)]
        Odb(#[from] grove_odb::OdbError),

        #[error(transparent)]
        Hash(#[from] grove_hash::HashError),

        #[error(transparent)]
        Io(#[from] std::io::Error),
    }

    impl From<LockError> for IndexError {
        fn from(err: LockError) -> Self {
            match err {
                LockError::Contended { path } => IndexError::LockContention { path },
                other => IndexError::Lock(other),
            }
        }
    }
}

/// Merge stage of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stage {
    #[default]
    Normal,
    Base,
    Ours,
    Theirs,
}

impl Stage {
    pub fn from_bits(bits: u16) -> Self {
        match bits & 0x3 {
            0 => Stage::Normal,
            1 => Stage::Base,
            2 => Stage::Ours,
            _ => Stage::Theirs,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// In-memory index, kept sorted by `(path, stage)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    entries: Vec<IndexEntry>,
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

impl Index {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Read and verify an index file. A missing file is an empty index.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        if file.metadata()?.len() == 0 {
            return Err(IndexError::InvalidHeader("empty index file".into()));
        }
        // SAFETY: the index is only ever replaced by rename, never rewritten
        // in place, so the mapping stays valid for the duration of the parse.
        let mmap = unsafe { Mmap::map(&file)? };
        let index = read::parse(&mmap)?;
        tracing::trace!(path = %path.display(), entries = index.len(), "index loaded");
        Ok(index)
    }

    /// Parse an in-memory index file image.
    pub fn from_bytes(data: &[u8]) -> Result<Self, IndexError> {
        read::parse(data)
    }

    /// Serialize with a checksum trailer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        write::serialize(self)
    }

    /// Replace the file at `path` atomically through `<path>.lock`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        let path = path.as_ref();
        let data = self.to_bytes()?;
        let mut lock = LockFile::acquire(path)?;
        lock.write_all(&data)?;
        lock.commit()?;
        tracing::debug!(path = %path.display(), entries = self.entries.len(), "index written");
        Ok(())
    }

    /// Format version the index is written as: 3 only when an entry
    /// carries extended flags.
    pub fn version(&self) -> u32 {
        if self.entries.iter().any(|e| e.flags.has_extended()) {
            3
        } else {
            2
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IndexEntry> {
        self.entries.iter()
    }

    fn position(&self, path: &[u8], stage: Stage) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|e| (e.path.as_slice(), e.stage).cmp(&(path, stage)))
    }

    /// Insert or replace the entry with the same path and stage.
    pub fn add(&mut self, entry: IndexEntry) {
        match self.position(&entry.path, entry.stage) {
            Ok(i) => self.entries[i] = entry,
            Err(i) => self.entries.insert(i, entry),
        }
    }

    /// Remove every stage of `path`. Returns whether anything was removed.
    pub fn remove(&mut self, path: &BStr) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.path.as_bstr() != path);
        self.entries.len() != before
    }

    pub fn get(&self, path: &BStr, stage: Stage) -> Option<&IndexEntry> {
        self.position(path, stage).ok().map(|i| &self.entries[i])
    }

    pub fn get_mut(&mut self, path: &BStr, stage: Stage) -> Option<&mut IndexEntry> {
        self.position(path, stage)
            .ok()
            .map(move |i| &mut self.entries[i])
    }

    pub fn has_conflicts(&self) -> bool {
        self.entries.iter().any(|e| e.stage != Stage::Normal)
    }

    /// Build from entries in any order; later duplicates win.
    pub fn from_entries(entries: impl IntoIterator<Item = IndexEntry>) -> Self {
        let mut all: Vec<IndexEntry> = entries.into_iter().collect();
        all.sort_by(|a, b| (a.path.as_slice(), a.stage).cmp(&(b.path.as_slice(), b.stage)));
        let mut sorted: Vec<IndexEntry> = Vec::with_capacity(all.len());
        for entry in all {
            match sorted.last_mut() {
                Some(last) if last.path == entry.path && last.stage == entry.stage => *last = entry,
                _ => sorted.push(entry),
            }
        }
        Self { entries: sorted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_hash::ObjectId;
    use grove_object::EntryMode;

    fn entry(path: &str, stage: Stage) -> IndexEntry {
        let mut e = IndexEntry::new(path, ObjectId::NULL, EntryMode::Regular);
        e.stage = stage;
        e
    }

    #[test]
    fn add_keeps_path_stage_order() {
        let mut index = Index::new();
        index.add(entry("b", Stage::Normal));
        index.add(entry("a", Stage::Theirs));
        index.add(entry("a", Stage::Ours));
        index.add(entry("a/x", Stage::Normal));
        let order: Vec<_> = index
            .iter()
            .map(|e| (e.path.to_string(), e.stage))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a".to_string(), Stage::Ours),
                ("a".to_string(), Stage::Theirs),
                ("a/x".to_string(), Stage::Normal),
                ("b".to_string(), Stage::Normal),
            ]
        );
        assert!(index.has_conflicts());
    }

    #[test]
    fn add_replaces_same_key() {
        let mut index = Index::new();
        index.add(entry("f", Stage::Normal));
        let mut newer = entry("f", Stage::Normal);
        newer.mode = EntryMode::Executable;
        index.add(newer);
        assert_eq!(index.len(), 1);
        assert_eq!(
            index.get(BStr::new("f"), Stage::Normal).unwrap().mode,
            EntryMode::Executable
        );
    }

    #[test]
    fn remove_drops_all_stages() {
        let mut index = Index::new();
        index.add(entry("f", Stage::Ours));
        index.add(entry("f", Stage::Theirs));
        index.add(entry("g", Stage::Normal));
        assert!(index.remove(BStr::new("f")));
        assert!(!index.remove(BStr::new("f")));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn stage_bits() {
        assert_eq!(Stage::from_bits(0), Stage::Normal);
        assert_eq!(Stage::from_bits(2), Stage::Ours);
        assert_eq!(Stage::Theirs.as_u8(), 3);
    }
}
