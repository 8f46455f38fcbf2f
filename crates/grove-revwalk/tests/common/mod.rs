#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;

use grove_hash::ObjectId;
use grove_object::{Commit, EntryMode, Object, ObjectKind, Tag, Tree, TreeEntry};
use grove_odb::{ObjectDatabase, ObjectSource, OdbError};
use grove_utils::{Signature, Time};

pub struct Graph {
    _dir: tempfile::TempDir,
    pub odb: ObjectDatabase,
}

impl Graph {
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

    pub fn commit_with(
        &self,
        tree: ObjectId,
        time: i64,
        parents: &[ObjectId],
        author: &str,
        message: &str,
    ) -> ObjectId {
        let who = Signature::new(author, format!("{author}@example.com"), Time::new(time, 0));
        let commit = Commit {
            tree,
            parents: parents.to_vec(),
            author: who.clone(),
            committer: who,
            extra_headers: Vec::new(),
            message: format!("{message}\n").into(),
        };
        self.odb.put_object(&Object::Commit(commit)).unwrap()
    }

    /// A commit whose tree holds one file named after the message.
    pub fn commit(&self, time: i64, parents: &[ObjectId], message: &str) -> ObjectId {
        let blob = self.blob(message);
        let tree = self.tree(&[("file", EntryMode::Regular, blob)]);
        self.commit_with(tree, time, parents, "Alice", message)
    }

    pub fn tag(&self, target: ObjectId, kind: ObjectKind, name: &str) -> ObjectId {
        let tag = Tag {
            target,
            target_kind: kind,
            name: name.into(),
            tagger: None,
            message: "release\n".into(),
        };
        self.odb.put_object(&Object::Tag(tag)).unwrap()
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
