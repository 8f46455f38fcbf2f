//! Rename detection over a list of tree changes.
//!
//! Exact matches (same blob id) are paired first. The remaining deletions
//! and additions are scored pairwise and paired greedily, best score first,
//! so the outcome does not depend on the order changes were listed in.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use bstr::ByteSlice;
use grove_hash::ObjectId;
use grove_odb::ObjectSource;

use crate::{ChangeKind, DiffError, TreeChange};

/// Percentage of content shared by `old` and `new`, counted in bytes of
/// matching lines over the larger input.
pub fn similarity_score(old: &[u8], new: &[u8]) -> u8 {
    if old.is_empty() && new.is_empty() {
        return 100;
    }
    if old.is_empty() || new.is_empty() {
        return 0;
    }

    let mut lines: HashMap<&[u8], usize> = HashMap::new();
    for line in old.lines_with_terminator() {
        *lines.entry(line).or_insert(0) += 1;
    }
    let mut common = 0usize;
    for line in new.lines_with_terminator() {
        if let Some(count) = lines.get_mut(line) {
            if *count > 0 {
                *count -= 1;
                common += line.len();
            }
        }
    }
    let base = old.len().max(new.len());
    (common * 100 / base) as u8
}

fn is_candidate(change: &TreeChange, kind: &ChangeKind) -> bool {
    let side = match kind {
        ChangeKind::Deleted => change.old,
        _ => change.new,
    };
    change.kind == *kind && side.is_some_and(|(mode, _)| mode.is_blob())
}

/// Fold matching deletion/addition pairs in `changes` into renames.
pub(crate) fn detect(
    source: &dyn ObjectSource,
    changes: &mut Vec<TreeChange>,
    threshold: u8,
) -> Result<(), DiffError> {
    let deleted: Vec<usize> = (0..changes.len())
        .filter(|&i| is_candidate(&changes[i], &ChangeKind::Deleted))
        .collect();
    let added: Vec<usize> = (0..changes.len())
        .filter(|&i| is_candidate(&changes[i], &ChangeKind::Added))
        .collect();
    if deleted.is_empty() || added.is_empty() {
        return Ok(());
    }

    let mut del_used = vec![false; deleted.len()];
    let mut add_used = vec![false; added.len()];
    let mut pairs: Vec<(usize, usize, u8)> = Vec::new();

    for (di, &d) in deleted.iter().enumerate() {
        let Some((_, old_oid)) = changes[d].old else {
            continue;
        };
        let found = added.iter().enumerate().find(|&(ai, &a)| {
            !add_used[ai] && changes[a].new.is_some_and(|(_, oid)| oid == old_oid)
        });
        if let Some((ai, &a)) = found {
            del_used[di] = true;
            add_used[ai] = true;
            pairs.push((d, a, 100));
        }
    }

    if threshold <= 100 {
        let mut blobs: HashMap<ObjectId, Vec<u8>> = HashMap::new();
        let mut load = |oid: ObjectId| -> Result<(), DiffError> {
            if let Entry::Vacant(slot) = blobs.entry(oid) {
                slot.insert(source.blob(&oid)?);
            }
            Ok(())
        };
        for (di, &d) in deleted.iter().enumerate() {
            if let (false, Some((_, oid))) = (del_used[di], changes[d].old) {
                load(oid)?;
            }
        }
        for (ai, &a) in added.iter().enumerate() {
            if let (false, Some((_, oid))) = (add_used[ai], changes[a].new) {
                load(oid)?;
            }
        }

        let mut candidates: Vec<(u8, usize, usize)> = Vec::new();
        for (di, &d) in deleted.iter().enumerate() {
            if del_used[di] {
                continue;
            }
            let Some((_, old_oid)) = changes[d].old else {
                continue;
            };
            for (ai, &a) in added.iter().enumerate() {
                if add_used[ai] {
                    continue;
                }
                let Some((_, new_oid)) = changes[a].new else {
                    continue;
                };
                let (Some(old), Some(new)) = (blobs.get(&old_oid), blobs.get(&new_oid)) else {
                    continue;
                };
                let score = similarity_score(old, new);
                if score >= threshold {
                    candidates.push((score, di, ai));
                }
            }
        }
        candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        for (score, di, ai) in candidates {
            if del_used[di] || add_used[ai] {
                continue;
            }
            del_used[di] = true;
            add_used[ai] = true;
            pairs.push((deleted[di], added[ai], score));
        }
    }

    if pairs.is_empty() {
        return Ok(());
    }
    let mut consumed = vec![false; changes.len()];
    for &(d, a, score) in &pairs {
        let from = changes[d].path.clone();
        let old = changes[d].old;
        let target = &mut changes[a];
        target.kind = ChangeKind::Renamed { from, score };
        target.old = old;
        consumed[d] = true;
    }
    let mut index = 0;
    changes.retain(|_| {
        let keep = !consumed[index];
        index += 1;
        keep
    });
    tracing::debug!(renames = pairs.len(), "detected renames");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_scores_full() {
        assert_eq!(similarity_score(b"hello\nworld\n", b"hello\nworld\n"), 100);
    }

    #[test]
    fn disjoint_content_scores_zero() {
        assert_eq!(similarity_score(b"aaa\nbbb\n", b"xxx\nyyy\n"), 0);
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(similarity_score(b"", b""), 100);
        assert_eq!(similarity_score(b"hello", b""), 0);
        assert_eq!(similarity_score(b"", b"hello"), 0);
    }

    #[test]
    fn partial_overlap_counts_shared_bytes() {
        let old = b"line1\nline2\nline3\nline4\n";
        let new = b"line1\nline2\nline3\nchanged\n";
        // 18 shared bytes over the 26-byte larger side.
        assert_eq!(similarity_score(old, new), 69);
    }

    #[test]
    fn repeated_lines_match_once_each() {
        assert_eq!(similarity_score(b"x\nx\n", b"x\ny\n"), 50);
    }
}
