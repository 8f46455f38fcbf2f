use bstr::{BString, ByteSlice};
use grove_hash::ObjectId;
use grove_object::{EntryMode, ObjectKind, Tree, TreeEntry};
use grove_odb::{ObjectDatabase, ObjectSource};

use crate::entry::IndexEntry;
use crate::{Index, IndexError, Stage};

impl Index {
    /// Write the nested trees described by the stage-0 entries and return
    /// the root tree id. Fails if any path is unmerged.
    pub fn write_tree(&self, odb: &ObjectDatabase) -> Result<ObjectId, IndexError> {
        if let Some(unmerged) = self.iter().find(|e| e.stage != Stage::Normal) {
            return Err(IndexError::Unmerged(unmerged.path.clone()));
        }
        let entries: Vec<&IndexEntry> = self.iter().collect();
        let root = build(&entries, 0, odb)?;
        tracing::debug!(%root, entries = entries.len(), "tree written from index");
        Ok(root)
    }

    /// Flatten `tree` into stage-0 entries with empty stat data.
    pub fn from_tree(source: &dyn ObjectSource, tree: &ObjectId) -> Result<Self, IndexError> {
        let mut entries = Vec::new();
        flatten(source, tree, &mut BString::default(), &mut entries)?;
        Ok(Self::from_entries(entries))
    }
}

fn build(entries: &[&IndexEntry], prefix_len: usize, odb: &ObjectDatabase) -> Result<ObjectId, IndexError> {
    let mut tree = Tree::new();
    let mut i = 0;
    while i < entries.len() {
        let rel = &entries[i].path[prefix_len..];
        match rel.find_byte(b'/') {
            None => {
                tree.entries
                    .push(TreeEntry::new(entries[i].mode, rel, entries[i].oid));
                i += 1;
            }
            Some(slash) => {
                let dir = &rel[..slash];
                let end = i + entries[i..]
                    .iter()
                    .take_while(|e| {
                        let r = &e.path[prefix_len..];
                        r.len() > slash && r[slash] == b'/' && &r[..slash] == dir
                    })
                    .count();
                let sub = build(&entries[i..end], prefix_len + slash + 1, odb)?;
                tree.entries.push(TreeEntry::new(EntryMode::Tree, dir, sub));
                i = end;
            }
        }
    }

    let mut names: Vec<&[u8]> = tree.entries.iter().map(|e| e.name.as_slice()).collect();
    names.sort_unstable();
    if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
        let mut path: BString = entries
            .first()
            .map(|e| e.path[..prefix_len].to_vec())
            .unwrap_or_default()
            .into();
        path.extend_from_slice(dup[0]);
        return Err(IndexError::PathConflict(path));
    }
    Ok(odb.put(ObjectKind::Tree, &tree.encode())?)
}

fn flatten(
    source: &dyn ObjectSource,
    tree: &ObjectId,
    prefix: &mut BString,
    out: &mut Vec<IndexEntry>,
) -> Result<(), IndexError> {
    for entry in source.tree(tree)?.entries {
        let len = prefix.len();
        if len > 0 {
            prefix.push(b'/');
        }
        prefix.extend_from_slice(&entry.name);
        if entry.mode.is_tree() {
            flatten(source, &entry.oid, prefix, out)?;
        } else {
            out.push(IndexEntry::new(prefix.clone(), entry.oid, entry.mode));
        }
        prefix.truncate(len);
    }
    Ok(())
}
