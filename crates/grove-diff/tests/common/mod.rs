#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

use grove_hash::ObjectId;
use grove_object::{EntryMode, Object, ObjectKind, Tree, TreeEntry};
use grove_odb::{ObjectDatabase, ObjectSource, OdbError};

pub struct Store {
    _dir: tempfile::TempDir,
    pub odb: ObjectDatabase,
}

impl Store {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let objects = dir.path().join("objects");
        std::fs::create_dir_all(objects.join("pack")).unwrap();
        let odb = ObjectDatabase::open(&objects).unwrap();
        Self { _dir: dir, odb }
    }

    pub fn blob(&self, content: &str) -> ObjectId {
        self.odb.put(ObjectKind::Blob, content.as_bytes()).unwrap()
    }

    pub fn tree(&self, entries: &[(&str, EntryMode, ObjectId)]) -> ObjectId {
        let tree = Tree {
            entries: entries
                .iter()
                .map(|(name, mode, oid)| TreeEntry::new(*mode, *name, *oid))
                .collect(),
        };
        self.odb.put_object(&Object::Tree(tree)).unwrap()
    }

    /// Build nested trees from slash-separated paths mapped to file contents.
    pub fn tree_from_paths(&self, files: &BTreeMap<String, String>) -> ObjectId {
        let mut blobs: Vec<(String, EntryMode, ObjectId)> = Vec::new();
        let mut dirs: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for (path, content) in files {
            match path.split_once('/') {
                Some((dir, rest)) => {
                    dirs.entry(dir.to_string())
                        .or_default()
                        .insert(rest.to_string(), content.clone());
                }
                None => blobs.push((path.clone(), EntryMode::Regular, self.blob(content))),
            }
        }
        for (dir, children) in &dirs {
            blobs.push((dir.clone(), EntryMode::Tree, self.tree_from_paths(children)));
        }
        let entries: Vec<(&str, EntryMode, ObjectId)> = blobs
            .iter()
            .map(|(name, mode, oid)| (name.as_str(), *mode, *oid))
            .collect();
        self.tree(&entries)
    }
}

/// Records every id read through it.
pub struct Recording<'a> {
    pub inner: &'a ObjectDatabase,
    pub reads: RefCell<HashSet<ObjectId>>,
}

impl<'a> Recording<'a> {
    pub fn new(inner: &'a ObjectDatabase) -> Self {
        Self {
            inner,
            reads: RefCell::new(HashSet::new()),
        }
    }

    pub fn was_read(&self, oid: &ObjectId) -> bool {
        self.reads.borrow().contains(oid)
    }

    pub fn read_count(&self) -> usize {
        self.reads.borrow().len()
    }
}

impl ObjectSource for Recording<'_> {
    fn get(&self, oid: &ObjectId) -> Result<Object, OdbError> {
        self.reads.borrow_mut().insert(*oid);
        self.inner.get(oid)
    }

    fn header(&self, oid: &ObjectId) -> Result<(ObjectKind, u64), OdbError> {
        self.inner.header(oid)
    }

    fn has(&self, oid: &ObjectId) -> bool {
        self.inner.has(oid)
    }
}
