//! Packing loose objects.

use std::cmp::Reverse;
use std::io::Write;
use std::path::PathBuf;

use grove_hash::ObjectId;
use grove_object::ObjectKind;
use grove_pack::{delta, install_pack, write_index, PackWriter};
use grove_utils::CancellationToken;

use crate::{ObjectDatabase, OdbError};

#[derive(Debug, Clone)]
pub struct ConsolidateOptions {
    /// How many preceding objects of the same kind are tried as delta bases.
    pub window: usize,
    /// Longest delta chain written.
    pub depth: usize,
    pub cancel: CancellationToken,
}

impl Default for ConsolidateOptions {
    fn default() -> Self {
        Self {
            window: 10,
            depth: 50,
            cancel: CancellationToken::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidateReport {
    /// The installed pack, `None` when there was nothing to pack.
    pub pack: Option<PathBuf>,
    pub objects: usize,
    pub deltas: usize,
    pub removed_loose: usize,
}

struct Candidate {
    oid: ObjectId,
    kind: ObjectKind,
    data: Vec<u8>,
    offset: u64,
    depth: usize,
}

impl ObjectDatabase {
    /// Move every loose object into one new pack.
    ///
    /// Objects are ordered by kind, then largest first, and each is tried
    /// as a delta against the previous `window` objects of its kind. The
    /// pack and its index are written under temporary names and published
    /// by rename; loose copies are removed only after publication. If the
    /// token is cancelled first, nothing is installed or removed.
    pub fn consolidate(&self, options: &ConsolidateOptions) -> Result<ConsolidateReport, OdbError> {
        let ids = self.iter_loose()?;
        if ids.is_empty() {
            return Ok(ConsolidateReport::default());
        }

        let mut candidates = Vec::with_capacity(ids.len());
        for oid in ids {
            options.cancel.check()?;
            let Some((kind, data)) = self.loose.read(&oid)? else {
                continue;
            };
            candidates.push(Candidate {
                oid,
                kind,
                data,
                offset: 0,
                depth: 0,
            });
        }
        candidates.sort_by_key(|c| (c.kind, Reverse(c.data.len()), c.oid));

        let pack_dir = self.pack_dir();
        std::fs::create_dir_all(&pack_dir)?;
        let tmp = tempfile::Builder::new()
            .prefix("tmp_pack_")
            .tempfile_in(&pack_dir)?;
        let mut writer = PackWriter::new(tmp, candidates.len() as u32)?
            .with_compression(self.options.pack_compression);

        let mut deltas = 0;
        for i in 0..candidates.len() {
            options.cancel.check()?;
            let (done, rest) = candidates.split_at_mut(i);
            let current = &mut rest[0];
            let best = best_base(done, current, options);
            current.offset = match best {
                Some((base, d)) => {
                    deltas += 1;
                    current.depth = done[base].depth + 1;
                    writer.add_ofs_delta(current.oid, done[base].offset, &d)?
                }
                None => writer.add_object(current.kind, &current.data)?,
            };
        }

        let (mut file, checksum, mut records) = writer.finish()?;
        file.flush()?;
        file.as_file().sync_all()?;
        let idx = write_index(&mut records, &checksum)?;
        options.cancel.check()?;
        let path = install_pack(&pack_dir, file.into_temp_path(), &checksum, &idx)?;
        self.refresh()?;

        let mut removed_loose = 0;
        for c in &candidates {
            self.loose.remove(&c.oid)?;
            removed_loose += 1;
        }

        tracing::info!(
            pack = %path.display(),
            objects = candidates.len(),
            deltas,
            "consolidated loose objects"
        );
        Ok(ConsolidateReport {
            pack: Some(path),
            objects: candidates.len(),
            deltas,
            removed_loose,
        })
    }
}

/// Pick the window entry giving the smallest delta, if any delta is worth
/// storing (under half the object's size).
fn best_base(done: &[Candidate], current: &Candidate, options: &ConsolidateOptions) -> Option<(usize, Vec<u8>)> {
    let mut best: Option<(usize, Vec<u8>)> = None;
    let limit = current.data.len() / 2;
    for (i, base) in done.iter().enumerate().rev().take(options.window) {
        if base.kind != current.kind || base.depth >= options.depth {
            continue;
        }
        let d = delta::compute(&base.data, &current.data);
        let smaller = best.as_ref().map_or(true, |(_, b)| d.len() < b.len());
        if d.len() < limit && smaller {
            best = Some((i, d));
        }
    }
    best
}
