//! Indexing of received packs: every entry is inflated, every delta is
//! resolved, every object id is computed from its resolved content, and
//! non-blob objects are parsed to check their structure.

use std::collections::HashMap;
use std::io::Write;

use grove_hash::{Hasher, ObjectId, RAW_LEN};
use grove_object::{compute_id, Object, ObjectKind};
use grove_utils::CancellationToken;

use crate::entry::{parse_header, EntryKind};
use crate::index::IndexRecord;
use crate::pack::{check_header, inflate, ExternalBase};
use crate::write::PackWriter;
use crate::{delta, PackError, PACK_HEADER_LEN};

/// Result of [`index_pack`].
#[derive(Debug)]
pub struct IndexedPack {
    pub checksum: ObjectId,
    /// One record per entry, in pack order.
    pub records: Vec<IndexRecord>,
    /// Kind of each entry's object, parallel to `records`.
    pub kinds: Vec<ObjectKind>,
    /// Bases of REF_DELTA entries that came from outside the pack.
    pub external_bases: Vec<(ObjectId, ObjectKind, Vec<u8>)>,
}

impl IndexedPack {
    pub fn is_thin(&self) -> bool {
        !self.external_bases.is_empty()
    }

    /// Rewrite a thin pack as a self-contained one by appending its external
    /// bases as whole objects. `data` must be the pack that was indexed.
    pub fn complete_thin<W: Write>(&mut self, data: &[u8], out: W) -> Result<W, PackError> {
        let count = (self.records.len() + self.external_bases.len()) as u32;
        let mut writer = PackWriter::new(out, count)?;
        writer.add_raw(&data[PACK_HEADER_LEN..data.len() - RAW_LEN], &self.records)?;
        for (_, kind, content) in &self.external_bases {
            writer.add_object(*kind, content)?;
        }
        let (out, checksum, records) = writer.finish()?;
        self.kinds
            .extend(self.external_bases.iter().map(|(_, kind, _)| *kind));
        self.external_bases.clear();
        self.records = records;
        self.checksum = checksum;
        Ok(out)
    }
}

struct RawEntry {
    offset: u64,
    kind: EntryKind,
    crc32: u32,
    data: Vec<u8>,
}

/// Verify and index the pack in `data`.
///
/// Fails without side effects on a bad trailer, a damaged entry, a delta
/// that does not apply, a missing base, or an object that does not parse.
pub fn index_pack(
    data: &[u8],
    external: ExternalBase<'_>,
    cancel: &CancellationToken,
) -> Result<IndexedPack, PackError> {
    let count = check_header(data)?;
    let body_end = data.len() - RAW_LEN;
    let expected = ObjectId::from_bytes(&data[body_end..])?;
    let actual = Hasher::digest(&data[..body_end])?;
    if actual != expected {
        return Err(PackError::ChecksumMismatch { expected, actual });
    }

    // Every entry takes at least two bytes, which bounds an untrusted count.
    let room = (body_end - PACK_HEADER_LEN) / 2;
    let mut entries = Vec::with_capacity((count as usize).min(room));
    let mut pos = PACK_HEADER_LEN;
    for _ in 0..count {
        cancel.check()?;
        if pos >= body_end {
            return Err(PackError::CountMismatch {
                declared: count,
                actual: entries.len() as u32,
            });
        }
        let offset = pos as u64;
        let header = parse_header(&data[pos..body_end], offset)?;
        let start = pos + header.header_len;
        let (content, consumed) = inflate(&data[start..body_end], header.size, offset)?;
        let end = start + consumed;
        let mut crc = crc32fast::Hasher::new();
        crc.update(&data[pos..end]);
        entries.push(RawEntry {
            offset,
            kind: header.kind,
            crc32: crc.finalize(),
            data: content,
        });
        pos = end;
    }
    if pos != body_end {
        return Err(PackError::CorruptEntry {
            offset: pos as u64,
            reason: "unexpected bytes after the last entry".into(),
        });
    }

    let by_offset: HashMap<u64, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| (e.offset, i))
        .collect();
    let mut resolved: Vec<Option<(ObjectKind, Vec<u8>, ObjectId)>> =
        (0..entries.len()).map(|_| None).collect();
    let mut by_id: HashMap<ObjectId, usize> = HashMap::new();
    let mut external_bases: Vec<(ObjectId, ObjectKind, Vec<u8>)> = Vec::new();
    let mut remaining = entries.len();

    // Bases and OFS chains resolve in one forward pass; REF_DELTA bases that
    // appear later in the pack, or outside it, need further passes.
    let mut allow_external = false;
    while remaining > 0 {
        let mut progressed = false;
        for i in 0..entries.len() {
            if resolved[i].is_some() {
                continue;
            }
            cancel.check()?;
            let entry = &entries[i];
            let outcome = match entry.kind {
                EntryKind::Base(kind) => Some((kind, entry.data.clone())),
                EntryKind::OfsDelta { base_offset } => {
                    let base = *by_offset.get(&base_offset).ok_or_else(|| PackError::CorruptEntry {
                        offset: entry.offset,
                        reason: "delta base is not an entry start".into(),
                    })?;
                    match &resolved[base] {
                        Some((kind, content, _)) => Some((*kind, delta::apply(content, &entry.data)?)),
                        None => None,
                    }
                }
                EntryKind::RefDelta { base } => match by_id.get(&base) {
                    Some(&b) => resolved[b]
                        .as_ref()
                        .map(|(kind, content, _)| delta::apply(content, &entry.data).map(|c| (*kind, c)))
                        .transpose()?,
                    None if allow_external => {
                        let known = external_bases
                            .iter()
                            .find(|(id, _, _)| *id == base)
                            .map(|(_, kind, content)| (*kind, content.clone()));
                        let found = match known {
                            Some(found) => Some(found),
                            None => external(&base).map(|(kind, content)| {
                                external_bases.push((base, kind, content.clone()));
                                (kind, content)
                            }),
                        };
                        match found {
                            Some((kind, content)) => Some((kind, delta::apply(&content, &entry.data)?)),
                            None => None,
                        }
                    }
                    None => None,
                },
            };
            if let Some((kind, content)) = outcome {
                let oid = compute_id(kind, &content)?;
                if kind != ObjectKind::Blob {
                    Object::parse(kind, &content).map_err(|source| PackError::BadObject {
                        oid,
                        kind,
                        source,
                    })?;
                }
                if by_id.insert(oid, i).is_some() {
                    return Err(PackError::CorruptEntry {
                        offset: entry.offset,
                        reason: format!("object {} appears twice", oid),
                    });
                }
                resolved[i] = Some((kind, content, oid));
                remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            if allow_external {
                let missing = entries.iter().zip(&resolved).find_map(|(e, r)| match (e.kind, r) {
                    (EntryKind::RefDelta { base }, None) if !by_id.contains_key(&base) => Some(base),
                    _ => None,
                });
                return Err(match missing {
                    Some(base) => PackError::MissingBase(base),
                    None => PackError::BadDelta("cyclic delta chain".into()),
                });
            }
            allow_external = true;
        }
    }

    let mut records = Vec::with_capacity(entries.len());
    let mut kinds = Vec::with_capacity(entries.len());
    for (entry, done) in entries.iter().zip(resolved) {
        let (kind, _, oid) = done.ok_or_else(|| PackError::BadDelta("unresolved entry".into()))?;
        records.push(IndexRecord {
            oid,
            offset: entry.offset,
            crc32: entry.crc32,
        });
        kinds.push(kind);
    }

    Ok(IndexedPack {
        checksum: expected,
        records,
        kinds,
        external_bases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_external(_: &ObjectId) -> Option<(ObjectKind, Vec<u8>)> {
        None
    }

    fn build(f: impl FnOnce(&mut PackWriter<Vec<u8>>), count: u32) -> Vec<u8> {
        let mut w = PackWriter::new(Vec::new(), count).unwrap();
        f(&mut w);
        w.finish().unwrap().0
    }

    #[test]
    fn indexes_whole_and_ofs_delta_entries() {
        let base = b"line one\nline two\nline three\nline four\n".repeat(4);
        let mut target = base.clone();
        target.extend_from_slice(b"line five\n");
        let target_id = compute_id(ObjectKind::Blob, &target).unwrap();
        let pack = build(
            |w| {
                let at = w.add_object(ObjectKind::Blob, &base).unwrap();
                w.add_ofs_delta(target_id, at, &delta::compute(&base, &target)).unwrap();
            },
            2,
        );
        let indexed = index_pack(&pack, &no_external, &CancellationToken::new()).unwrap();
        assert_eq!(indexed.records.len(), 2);
        assert_eq!(indexed.records[1].oid, target_id);
        assert!(!indexed.is_thin());
    }

    #[test]
    fn flipped_trailer_is_rejected() {
        let mut pack = build(|w| {
            w.add_object(ObjectKind::Blob, b"x").unwrap();
        }, 1);
        let last = pack.len() - 1;
        pack[last] ^= 0xff;
        assert!(matches!(
            index_pack(&pack, &no_external, &CancellationToken::new()),
            Err(PackError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn missing_ref_base_is_rejected() {
        let base = ObjectId::new([5; 20]);
        let target = compute_id(ObjectKind::Blob, b"abc").unwrap();
        let pack = build(
            |w| {
                w.add_ref_delta(target, &base, &delta::compute(b"ab", b"abc"))
                    .unwrap();
            },
            1,
        );
        assert!(matches!(
            index_pack(&pack, &no_external, &CancellationToken::new()),
            Err(PackError::MissingBase(id)) if id == base
        ));
    }

    #[test]
    fn thin_pack_is_completed() {
        let base_content = b"shared base content that the receiver already has".to_vec();
        let base = compute_id(ObjectKind::Blob, &base_content).unwrap();
        let mut target_content = base_content.clone();
        target_content.extend_from_slice(b" plus more");
        let target = compute_id(ObjectKind::Blob, &target_content).unwrap();
        let pack = build(
            |w| {
                w.add_ref_delta(target, &base, &delta::compute(&base_content, &target_content))
                    .unwrap();
            },
            1,
        );
        let lookup = |id: &ObjectId| (*id == base).then(|| (ObjectKind::Blob, base_content.clone()));
        let mut indexed = index_pack(&pack, &lookup, &CancellationToken::new()).unwrap();
        assert!(indexed.is_thin());

        let full = indexed.complete_thin(&pack, Vec::new()).unwrap();
        assert_eq!(indexed.records.len(), 2);
        let again = index_pack(&full, &no_external, &CancellationToken::new()).unwrap();
        assert!(!again.is_thin());
        let ids: Vec<_> = again.records.iter().map(|r| r.oid).collect();
        assert_eq!(ids, vec![target, base]);
        assert_eq!(again.checksum, indexed.checksum);
    }

    #[test]
    fn cancelled_indexing_stops() {
        let pack = build(|w| {
            w.add_object(ObjectKind::Blob, b"x").unwrap();
        }, 1);
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            index_pack(&pack, &no_external, &token),
            Err(PackError::Cancelled(_))
        ));
    }

    #[test]
    fn malformed_commit_is_rejected() {
        let pack = build(
            |w| {
                w.add_object(ObjectKind::Commit, b"not a commit").unwrap();
            },
            1,
        );
        assert!(matches!(
            index_pack(&pack, &no_external, &CancellationToken::new()),
            Err(PackError::BadObject { .. })
        ));
    }

    #[test]
    fn absurd_object_count_is_a_count_mismatch() {
        let mut pack = b"PACK".to_vec();
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend_from_slice(&u32::MAX.to_be_bytes());
        let trailer = Hasher::digest(&pack).unwrap();
        pack.extend_from_slice(trailer.as_bytes());
        assert!(matches!(
            index_pack(&pack, &no_external, &CancellationToken::new()),
            Err(PackError::CountMismatch { declared: u32::MAX, actual: 0 })
        ));
    }
}
