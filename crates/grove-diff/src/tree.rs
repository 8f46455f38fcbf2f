use std::cmp::Ordering;

use bstr::{BStr, BString, ByteSlice};
use grove_hash::ObjectId;
use grove_object::{tree_order, EntryMode, TreeEntry};
use grove_odb::ObjectSource;

use crate::{rename, ChangeKind, DiffError, DiffOptions, TreeChange};

/// Compare two trees. `None` stands for the empty tree.
pub fn diff_trees(
    source: &dyn ObjectSource,
    old: Option<&ObjectId>,
    new: Option<&ObjectId>,
    options: &DiffOptions,
) -> Result<Vec<TreeChange>, DiffError> {
    if old == new {
        return Ok(Vec::new());
    }
    let old_entries = match old {
        Some(oid) => source.tree(oid)?.entries,
        None => Vec::new(),
    };
    let new_entries = match new {
        Some(oid) => source.tree(oid)?.entries,
        None => Vec::new(),
    };

    let mut changes = Vec::new();
    walk(source, &old_entries, &new_entries, &BString::default(), &mut changes)?;
    changes.sort_by(|a, b| a.path.cmp(&b.path));

    if options.renames {
        rename::detect(source, &mut changes, options.rename_threshold)?;
    }
    tracing::trace!(changes = changes.len(), "tree diff");
    Ok(changes)
}

fn join(prefix: &BStr, name: &BStr) -> BString {
    let mut path = BString::from(prefix);
    if !path.is_empty() {
        path.push(b'/');
    }
    path.extend_from_slice(name);
    path
}

fn walk(
    source: &dyn ObjectSource,
    old: &[TreeEntry],
    new: &[TreeEntry],
    prefix: &BString,
    out: &mut Vec<TreeChange>,
) -> Result<(), DiffError> {
    let (mut i, mut j) = (0, 0);
    while i < old.len() || j < new.len() {
        let order = match (old.get(i), new.get(j)) {
            (Some(o), Some(n)) => tree_order(&o.name, o.mode.is_tree(), &n.name, n.mode.is_tree()),
            (Some(_), None) => Ordering::Less,
            (None, _) => Ordering::Greater,
        };
        match order {
            Ordering::Less => {
                one_sided(source, &old[i], prefix, Side::Old, out)?;
                i += 1;
            }
            Ordering::Greater => {
                one_sided(source, &new[j], prefix, Side::New, out)?;
                j += 1;
            }
            Ordering::Equal => {
                let (o, n) = (&old[i], &new[j]);
                if o.oid != n.oid || o.mode != n.mode {
                    let path = join(prefix.as_bstr(), o.name.as_bstr());
                    if o.mode.is_tree() {
                        let old_sub = source.tree(&o.oid)?.entries;
                        let new_sub = source.tree(&n.oid)?.entries;
                        walk(source, &old_sub, &new_sub, &path, out)?;
                    } else {
                        out.push(TreeChange {
                            kind: ChangeKind::Modified,
                            path,
                            old: Some((o.mode, o.oid)),
                            new: Some((n.mode, n.oid)),
                        });
                    }
                }
                i += 1;
                j += 1;
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum Side {
    Old,
    New,
}

/// Expand an entry present on one side only into one change per file.
fn one_sided(
    source: &dyn ObjectSource,
    entry: &TreeEntry,
    prefix: &BString,
    side: Side,
    out: &mut Vec<TreeChange>,
) -> Result<(), DiffError> {
    let path = join(prefix.as_bstr(), entry.name.as_bstr());
    if entry.mode.is_tree() {
        for child in source.tree(&entry.oid)?.entries {
            one_sided(source, &child, &path, side, out)?;
        }
        return Ok(());
    }
    let value = Some((entry.mode, entry.oid));
    out.push(match side {
        Side::Old => TreeChange {
            kind: ChangeKind::Deleted,
            path,
            old: value,
            new: None,
        },
        Side::New => TreeChange {
            kind: ChangeKind::Added,
            path,
            old: None,
            new: value,
        },
    });
    Ok(())
}

/// Look up `path` inside `tree`. The empty path names the tree itself.
pub fn entry_at_path(
    source: &dyn ObjectSource,
    tree: &ObjectId,
    path: &BStr,
) -> Result<Option<(EntryMode, ObjectId)>, DiffError> {
    let mut current = (EntryMode::Tree, *tree);
    for part in path.split_str("/").filter(|p| !p.is_empty()) {
        if !current.0.is_tree() {
            return Ok(None);
        }
        let tree = source.tree(&current.1)?;
        match tree.find(part.as_bstr()) {
            Some(entry) => current = (entry.mode, entry.oid),
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}
