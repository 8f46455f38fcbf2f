use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use bstr::{BStr, ByteSlice, ByteVec};
use grove_hash::ObjectId;
use grove_object::{EntryMode, ObjectKind};
use grove_odb::ObjectDatabase;

use crate::entry::{IndexEntry, StatData};
use crate::{Index, IndexError, Stage};

/// A work-tree relative path that may be stored in the index: slash
/// separated, no empty, `.`, `..` or `.git` components.
pub fn is_valid_path(path: &[u8]) -> bool {
    !path.is_empty()
        && !path.contains(&0)
        && path.split(|&b| b == b'/').all(|part| {
            !part.is_empty() && part != b"." && part != b".." && !part.eq_ignore_ascii_case(b".git")
        })
}

/// Resolve an index path beneath `work_tree`.
pub fn work_path(work_tree: &Path, path: &BStr) -> Result<PathBuf, IndexError> {
    if !is_valid_path(path) {
        return Err(IndexError::InvalidPath(path.into()));
    }
    let relative = path
        .to_path()
        .map_err(|_| IndexError::InvalidPath(path.into()))?;
    Ok(work_tree.join(relative))
}

#[cfg(unix)]
fn is_executable(meta: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &Metadata) -> bool {
    false
}

impl Index {
    /// Stage the current content of `path`, with the executable bit taken
    /// from disk.
    pub fn stage_file(
        &mut self,
        odb: &ObjectDatabase,
        work_tree: &Path,
        path: &BStr,
    ) -> Result<ObjectId, IndexError> {
        self.stage_file_with(odb, work_tree, path, true)
    }

    /// Stage the current content of `path`.
    ///
    /// An assume-valid entry whose stat data still matches is trusted: the
    /// file is not read, and the flag is cleared. Otherwise the file is
    /// hashed into `odb` and replaces every stage of the path. When
    /// `trust_executable` is false the executable bit is kept from the
    /// existing entry instead of being read from disk.
    pub fn stage_file_with(
        &mut self,
        odb: &ObjectDatabase,
        work_tree: &Path,
        path: &BStr,
        trust_executable: bool,
    ) -> Result<ObjectId, IndexError> {
        let full = work_path(work_tree, path)?;
        let meta = fs::symlink_metadata(&full)?;

        if let Some(existing) = self.get_mut(path, Stage::Normal) {
            if existing.flags.assume_valid && existing.stat.matches(&meta) {
                existing.flags.assume_valid = false;
                tracing::trace!(path = %path, "assume-valid entry trusted");
                return Ok(existing.oid);
            }
        }

        let (mode, content) = if meta.file_type().is_symlink() {
            let target = fs::read_link(&full)?;
            (
                EntryMode::Symlink,
                Vec::from_path_lossy(&target).into_owned(),
            )
        } else if meta.is_file() {
            let mode = if trust_executable {
                if is_executable(&meta) {
                    EntryMode::Executable
                } else {
                    EntryMode::Regular
                }
            } else {
                match self.get(path, Stage::Normal).map(|e| e.mode) {
                    Some(EntryMode::Executable) => EntryMode::Executable,
                    _ => EntryMode::Regular,
                }
            };
            (mode, fs::read(&full)?)
        } else {
            return Err(IndexError::NotAFile(path.into()));
        };

        let oid = odb.put(ObjectKind::Blob, &content)?;
        self.remove(path);
        self.remove_directory_conflicts(path);
        let mut entry = IndexEntry::new(path, oid, mode);
        entry.stat = StatData::from_metadata(&meta);
        self.add(entry);
        tracing::debug!(path = %path, %oid, "staged");
        Ok(oid)
    }

    /// Drop entries that would make `path` both a file and a directory.
    fn remove_directory_conflicts(&mut self, path: &BStr) {
        let mut dir_prefix = path.to_vec();
        dir_prefix.push(b'/');
        self.entries.retain(|e| {
            let below = e.path.starts_with(&dir_prefix);
            let above = path.len() > e.path.len()
                && path.starts_with(&e.path)
                && path[e.path.len()] == b'/';
            !(below || above)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_validation() {
        assert!(is_valid_path(b"a/b.txt"));
        assert!(is_valid_path(b".gitignore"));
        assert!(!is_valid_path(b""));
        assert!(!is_valid_path(b"/abs"));
        assert!(!is_valid_path(b"a//b"));
        assert!(!is_valid_path(b"a/../b"));
        assert!(!is_valid_path(b".git/config"));
        assert!(!is_valid_path(b"sub/.GIT/x"));
        assert!(!is_valid_path(b"dir/"));
    }
}
