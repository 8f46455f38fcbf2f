//! Lookup across storage: loose first, then packs newest first.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use grove_hash::ObjectId;
use grove_loose::{LooseError, LooseStore};
use grove_object::{compute_id, ObjectKind};
use grove_pack::{PackError, PackFile};

use crate::stream::ObjectStream;
use crate::{ObjectDatabase, OdbError};

/// Open every `pack-*.pack` that has its `.idx` beside it, newest first.
/// Packs already open in `existing` are reused rather than remapped.
pub(crate) fn discover_packs(
    pack_dir: &Path,
    existing: &[Arc<PackFile>],
) -> Result<Vec<Arc<PackFile>>, OdbError> {
    let entries = match std::fs::read_dir(pack_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "pack") && path.with_extension("idx").is_file() {
            let mtime = path
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((mtime, path));
        }
    }
    found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let mut packs = Vec::with_capacity(found.len());
    for (_, path) in found {
        if let Some(open) = existing.iter().find(|p| p.path() == path) {
            packs.push(Arc::clone(open));
            continue;
        }
        match PackFile::open(&path) {
            Ok(pack) => packs.push(Arc::new(pack)),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable pack"),
        }
    }
    Ok(packs)
}

/// Loose corruption is reported against the requested id.
fn loose_error(oid: &ObjectId, e: LooseError) -> OdbError {
    if e.is_corruption() {
        OdbError::Corrupt {
            oid: *oid,
            reason: e.to_string(),
        }
    } else {
        e.into()
    }
}

fn pack_error(oid: &ObjectId, e: PackError) -> OdbError {
    if e.is_corruption() {
        OdbError::Corrupt {
            oid: *oid,
            reason: e.to_string(),
        }
    } else {
        e.into()
    }
}

/// Resolve a REF_DELTA base that is not in the pack being read: loose
/// storage, then any other pack. Bases found in other packs may not
/// themselves depend on a third pack.
fn external_base(
    loose: &LooseStore,
    packs: &[Arc<PackFile>],
    skip: &PackFile,
    base: &ObjectId,
) -> Option<(ObjectKind, Vec<u8>)> {
    if let Ok(Some(found)) = loose.read(base) {
        return Some(found);
    }
    let loose_only = |b: &ObjectId| loose.read(b).ok().flatten();
    packs
        .iter()
        .filter(|p| !std::ptr::eq(Arc::as_ptr(p), skip))
        .find_map(|p| p.read(base, &loose_only).ok().flatten())
}

pub(crate) fn find_raw(
    odb: &ObjectDatabase,
    oid: &ObjectId,
) -> Result<Option<(ObjectKind, Vec<u8>)>, OdbError> {
    if let Some(found) = odb.loose.read(oid).map_err(|e| loose_error(oid, e))? {
        return Ok(Some(found));
    }

    let packs = odb.packs();
    for pack in packs.iter().filter(|p| p.contains(oid)) {
        let external = |base: &ObjectId| external_base(&odb.loose, &packs, pack, base);
        let Some((kind, data)) = pack.read(oid, &external).map_err(|e| pack_error(oid, e))? else {
            continue;
        };
        let actual = compute_id(kind, &data)?;
        if actual != *oid {
            return Err(OdbError::Corrupt {
                oid: *oid,
                reason: format!("packed content hashes to {}", actual),
            });
        }
        return Ok(Some((kind, data)));
    }
    Ok(None)
}

pub(crate) fn find_header(
    odb: &ObjectDatabase,
    oid: &ObjectId,
) -> Result<Option<(ObjectKind, u64)>, OdbError> {
    if let Some((kind, size)) = odb.loose.read_header(oid).map_err(|e| loose_error(oid, e))? {
        return Ok(Some((kind, size as u64)));
    }
    let packs = odb.packs();
    for pack in packs.iter().filter(|p| p.contains(oid)) {
        let external = |base: &ObjectId| external_base(&odb.loose, &packs, pack, base);
        if let Some(found) = pack.header(oid, &external).map_err(|e| pack_error(oid, e))? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

pub(crate) fn contains(odb: &ObjectDatabase, oid: &ObjectId) -> bool {
    odb.loose.contains(oid) || odb.packs().iter().any(|p| p.contains(oid))
}

pub(crate) fn open_stream(
    odb: &ObjectDatabase,
    oid: &ObjectId,
) -> Result<Option<ObjectStream>, OdbError> {
    if let Some((kind, size, reader)) = odb.loose.stream(oid).map_err(|e| loose_error(oid, e))? {
        return Ok(Some(ObjectStream::new(*oid, kind, size as u64, Box::new(reader))));
    }
    let packs = odb.packs();
    for pack in packs.iter().filter(|p| p.contains(oid)) {
        let external = |base: &ObjectId| external_base(&odb.loose, &packs, pack, base);
        if let Some((kind, size, reader)) = pack.stream(oid, &external).map_err(|e| pack_error(oid, e))? {
            return Ok(Some(ObjectStream::new(*oid, kind, size, reader)));
        }
    }
    Ok(None)
}
