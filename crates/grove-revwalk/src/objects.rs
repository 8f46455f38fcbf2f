use std::collections::HashSet;

use bstr::BString;
use grove_hash::ObjectId;
use grove_object::ObjectKind;
use grove_odb::ObjectSource;

use crate::walk::RevWalk;
use crate::RevWalkError;

/// An object to send, with the path it was first reached at for trees and
/// blobs (used to pick delta bases).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachableObject {
    pub oid: ObjectId,
    pub kind: ObjectKind,
    pub path: Option<BString>,
}

impl ReachableObject {
    fn new(oid: ObjectId, kind: ObjectKind, path: Option<BString>) -> Self {
        Self { oid, kind, path }
    }
}

/// Every commit, tag, tree and blob reachable from `wants` and not from
/// `haves`, commits first.
///
/// Haves the source does not know are ignored. Trees of the uninteresting
/// commits at the walk boundary are expanded so that objects the other side
/// already holds are left out even when they reappear in new commits.
pub fn list_objects(
    source: &dyn ObjectSource,
    wants: &[ObjectId],
    haves: &[ObjectId],
) -> Result<Vec<ReachableObject>, RevWalkError> {
    let mut walk = RevWalk::new(source);
    let mut tags = Vec::new();
    let mut loose_trees = Vec::new();
    let mut loose_blobs = Vec::new();

    for want in wants {
        let mut current = *want;
        loop {
            let (kind, _) = source.header(&current)?;
            match kind {
                ObjectKind::Tag => {
                    tags.push(current);
                    current = source.tag(&current)?.target;
                }
                ObjectKind::Commit => {
                    walk.push(current)?;
                    break;
                }
                ObjectKind::Tree => {
                    loose_trees.push(current);
                    break;
                }
                ObjectKind::Blob => {
                    loose_blobs.push(current);
                    break;
                }
            }
        }
    }
    for have in haves {
        match source.peel(have) {
            Ok((peeled, ObjectKind::Commit)) => walk.hide(peeled)?,
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
    }

    let commits = walk.by_ref().collect::<Result<Vec<_>, _>>()?;

    let mut held = HashSet::new();
    for tree in walk.uninteresting_trees() {
        mark_held(source, tree, &mut held)?;
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for commit in &commits {
        seen.insert(*commit);
        out.push(ReachableObject::new(*commit, ObjectKind::Commit, None));
    }
    for tag in tags {
        if seen.insert(tag) {
            out.push(ReachableObject::new(tag, ObjectKind::Tag, None));
        }
    }
    for commit in &commits {
        if let Some(node) = walk.node(commit) {
            add_tree(source, node.tree, BString::default(), &held, &mut seen, &mut out)?;
        }
    }
    for tree in loose_trees {
        add_tree(source, tree, BString::default(), &held, &mut seen, &mut out)?;
    }
    for blob in loose_blobs {
        if !held.contains(&blob) && seen.insert(blob) {
            out.push(ReachableObject::new(blob, ObjectKind::Blob, None));
        }
    }
    tracing::debug!(
        wants = wants.len(),
        haves = haves.len(),
        commits = commits.len(),
        objects = out.len(),
        "listed reachable objects"
    );
    Ok(out)
}

fn mark_held(
    source: &dyn ObjectSource,
    root: ObjectId,
    held: &mut HashSet<ObjectId>,
) -> Result<(), RevWalkError> {
    let mut stack = vec![root];
    while let Some(tree) = stack.pop() {
        if !held.insert(tree) {
            continue;
        }
        for entry in source.tree(&tree)?.entries {
            if entry.mode.is_tree() {
                stack.push(entry.oid);
            } else if entry.mode.is_blob() {
                held.insert(entry.oid);
            }
        }
    }
    Ok(())
}

fn add_tree(
    source: &dyn ObjectSource,
    root: ObjectId,
    root_path: BString,
    held: &HashSet<ObjectId>,
    seen: &mut HashSet<ObjectId>,
    out: &mut Vec<ReachableObject>,
) -> Result<(), RevWalkError> {
    let mut stack = vec![(root, root_path)];
    while let Some((tree, path)) = stack.pop() {
        if held.contains(&tree) || !seen.insert(tree) {
            continue;
        }
        out.push(ReachableObject::new(tree, ObjectKind::Tree, Some(path.clone())));
        let entries = source.tree(&tree)?.entries;
        for entry in entries.into_iter().rev() {
            let mut child = path.clone();
            if !child.is_empty() {
                child.push(b'/');
            }
            child.extend_from_slice(&entry.name);
            if entry.mode.is_tree() {
                stack.push((entry.oid, child));
            } else if entry.mode.is_blob() && !held.contains(&entry.oid) && seen.insert(entry.oid) {
                out.push(ReachableObject::new(entry.oid, ObjectKind::Blob, Some(child)));
            }
        }
    }
    Ok(())
}
