//! Loose ref files: `<git-dir>/<name>` holding `<hex>\n` or `ref: <name>\n`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use grove_hash::ObjectId;

use crate::error::RefError;
use crate::name::RefName;
use crate::Reference;

pub(crate) fn path_of(git_dir: &Path, name: &RefName) -> PathBuf {
    git_dir.join(name.as_str())
}

pub(crate) fn read(git_dir: &Path, name: &RefName) -> Result<Option<Reference>, RefError> {
    let path = path_of(git_dir, name);
    let data = match fs::read(&path) {
        Ok(data) => data,
        // Also covers a directory at the path, or a file where a parent
        // directory would be.
        Err(e) if e.kind() == io::ErrorKind::NotFound || !path.is_file() => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    parse(&data, &path).map(Some)
}

pub(crate) fn parse(data: &[u8], path: &Path) -> Result<Reference, RefError> {
    let text = data.trim();
    if let Some(target) = text.strip_prefix(b"ref:") {
        let target = target.trim().to_str().map_err(|_| RefError::Parse {
            path: path.to_path_buf(),
            reason: "symbolic target is not UTF-8".into(),
        })?;
        return Ok(Reference::Symbolic(RefName::new(target)?));
    }
    ObjectId::from_hex(text).map(Reference::Direct).map_err(|e| RefError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Every loose ref name under `refs/`, unsorted. Lock files and names that
/// do not validate are ignored.
pub(crate) fn enumerate(git_dir: &Path) -> Result<Vec<RefName>, RefError> {
    let mut out = Vec::new();
    let mut stack = vec![git_dir.join("refs")];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                stack.push(path);
                continue;
            }
            let Ok(rel) = path.strip_prefix(git_dir) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            if rel.ends_with(".lock") {
                continue;
            }
            if let Ok(name) = RefName::new(rel) {
                out.push(name);
            }
        }
    }
    Ok(out)
}

/// A new ref cannot be created where a prefix of its path is a ref file, or
/// where its path is a directory holding other refs.
pub(crate) fn check_dir_file_conflict(git_dir: &Path, name: &RefName) -> Result<(), RefError> {
    let path = path_of(git_dir, name);
    let conflict = |with: &Path| RefError::DirectoryConflict {
        name: name.to_string(),
        conflict: with
            .strip_prefix(git_dir)
            .unwrap_or(with)
            .to_string_lossy()
            .replace('\\', "/"),
    };
    if path.is_dir() {
        return Err(conflict(&path));
    }
    let refs_dir = git_dir.join("refs");
    let mut parent = path.parent();
    while let Some(dir) = parent {
        if dir == refs_dir || dir == git_dir {
            break;
        }
        if dir.is_file() {
            return Err(conflict(dir));
        }
        parent = dir.parent();
    }
    Ok(())
}

/// Remove now-empty directories between `path` and the top-level
/// namespaces (`refs/heads`, `refs/tags`, ...), which are kept.
pub(crate) fn prune_empty_dirs(git_dir: &Path, path: &Path) {
    let refs_dir = git_dir.join("refs");
    let mut dir = path.parent();
    while let Some(d) = dir {
        if !d.starts_with(&refs_dir) || d == refs_dir || d.parent() == Some(refs_dir.as_path()) {
            break;
        }
        if fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
}
