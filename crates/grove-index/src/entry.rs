use std::fs::Metadata;

use bstr::BString;
use grove_hash::ObjectId;
use grove_object::EntryMode;

use crate::Stage;

/// A single staged path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Slash-separated, relative to the work tree root.
    pub path: BString,
    pub oid: ObjectId,
    pub mode: EntryMode,
    pub stage: Stage,
    pub stat: StatData,
    pub flags: EntryFlags,
}

impl IndexEntry {
    /// A stage-0 entry with empty stat data.
    pub fn new(path: impl Into<BString>, oid: ObjectId, mode: EntryMode) -> Self {
        Self {
            path: path.into(),
            oid,
            mode,
            stage: Stage::Normal,
            stat: StatData::default(),
            flags: EntryFlags::default(),
        }
    }

    pub fn assume_valid(&self) -> bool {
        self.flags.assume_valid
    }
}

/// File system stat data cached per entry, truncated to 32 bits as on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatData {
    pub ctime_secs: u32,
    pub ctime_nsecs: u32,
    pub mtime_secs: u32,
    pub mtime_nsecs: u32,
    pub dev: u32,
    pub ino: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
}

impl StatData {
    #[cfg(unix)]
    pub fn from_metadata(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            ctime_secs: meta.ctime() as u32,
            ctime_nsecs: meta.ctime_nsec() as u32,
            mtime_secs: meta.mtime() as u32,
            mtime_nsecs: meta.mtime_nsec() as u32,
            dev: meta.dev() as u32,
            ino: meta.ino() as u32,
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.len() as u32,
        }
    }

    #[cfg(not(unix))]
    pub fn from_metadata(meta: &Metadata) -> Self {
        use std::time::UNIX_EPOCH;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .unwrap_or_default();
        Self {
            ctime_secs: mtime.as_secs() as u32,
            ctime_nsecs: mtime.subsec_nanos(),
            mtime_secs: mtime.as_secs() as u32,
            mtime_nsecs: mtime.subsec_nanos(),
            size: meta.len() as u32,
            ..Self::default()
        }
    }

    /// Whether the file still looks the same as when this data was taken.
    ///
    /// Empty stat data (as produced from a tree) never matches. Zero inode,
    /// device and owner fields are treated as unknown.
    pub fn matches(&self, meta: &Metadata) -> bool {
        if *self == Self::default() {
            return false;
        }
        let other = Self::from_metadata(meta);
        let known_eq = |a: u32, b: u32| a == 0 || b == 0 || a == b;
        self.size == other.size
            && self.mtime_secs == other.mtime_secs
            && self.mtime_nsecs == other.mtime_nsecs
            && self.ctime_secs == other.ctime_secs
            && self.ctime_nsecs == other.ctime_nsecs
            && known_eq(self.ino, other.ino)
            && known_eq(self.dev, other.dev)
            && known_eq(self.uid, other.uid)
            && known_eq(self.gid, other.gid)
    }
}

/// Per-entry flags. The last two only exist in version 3 files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryFlags {
    /// Trust the entry without looking at the file.
    pub assume_valid: bool,
    pub intent_to_add: bool,
    pub skip_worktree: bool,
}

impl EntryFlags {
    pub fn has_extended(&self) -> bool {
        self.intent_to_add || self.skip_worktree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stat_never_matches() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"x").unwrap();
        let meta = std::fs::metadata(&file).unwrap();
        assert!(!StatData::default().matches(&meta));
        assert!(StatData::from_metadata(&meta).matches(&meta));
    }

    #[test]
    fn size_change_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"x").unwrap();
        let mut stat = StatData::from_metadata(&std::fs::metadata(&file).unwrap());
        stat.size += 1;
        assert!(!stat.matches(&std::fs::metadata(&file).unwrap()));
    }

    #[test]
    fn extended_flags() {
        assert!(!EntryFlags::default().has_extended());
        let flags = EntryFlags {
            skip_worktree: true,
            ..Default::default()
        };
        assert!(flags.has_extended());
    }
}
