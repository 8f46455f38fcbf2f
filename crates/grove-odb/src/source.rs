use grove_hash::ObjectId;
use grove_object::{Commit, Object, ObjectKind, Tag, Tree};

use crate::{ObjectDatabase, OdbError};

const MAX_PEEL_DEPTH: usize = 32;

/// Read access to objects.
///
/// Traversal, diffing and checkout take `&dyn ObjectSource` rather than a
/// concrete database so that callers can wrap the store, for instance to
/// count reads.
pub trait ObjectSource {
    fn get(&self, oid: &ObjectId) -> Result<Object, OdbError>;

    fn header(&self, oid: &ObjectId) -> Result<(ObjectKind, u64), OdbError>;

    fn has(&self, oid: &ObjectId) -> bool;

    fn commit(&self, oid: &ObjectId) -> Result<Commit, OdbError> {
        match self.get(oid)? {
            Object::Commit(c) => Ok(c),
            other => Err(wrong_kind(oid, ObjectKind::Commit, &other)),
        }
    }

    fn tree(&self, oid: &ObjectId) -> Result<Tree, OdbError> {
        match self.get(oid)? {
            Object::Tree(t) => Ok(t),
            other => Err(wrong_kind(oid, ObjectKind::Tree, &other)),
        }
    }

    fn blob(&self, oid: &ObjectId) -> Result<Vec<u8>, OdbError> {
        match self.get(oid)? {
            Object::Blob(b) => Ok(b),
            other => Err(wrong_kind(oid, ObjectKind::Blob, &other)),
        }
    }

    fn tag(&self, oid: &ObjectId) -> Result<Tag, OdbError> {
        match self.get(oid)? {
            Object::Tag(t) => Ok(t),
            other => Err(wrong_kind(oid, ObjectKind::Tag, &other)),
        }
    }

    /// Follow annotated tags until a non-tag object is reached.
    fn peel(&self, oid: &ObjectId) -> Result<(ObjectId, ObjectKind), OdbError> {
        let mut current = *oid;
        for _ in 0..MAX_PEEL_DEPTH {
            match self.get(&current)? {
                Object::Tag(tag) => current = tag.target,
                other => return Ok((current, other.kind())),
            }
        }
        Err(OdbError::Corrupt {
            oid: *oid,
            reason: "tag chain too long".into(),
        })
    }

    /// The tree of a commit, or the tree itself.
    fn tree_of(&self, oid: &ObjectId) -> Result<ObjectId, OdbError> {
        let (peeled, kind) = self.peel(oid)?;
        match kind {
            ObjectKind::Tree => Ok(peeled),
            ObjectKind::Commit => Ok(self.commit(&peeled)?.tree),
            actual => Err(OdbError::WrongKind {
                oid: peeled,
                expected: ObjectKind::Tree,
                actual,
            }),
        }
    }
}

fn wrong_kind(oid: &ObjectId, expected: ObjectKind, found: &Object) -> OdbError {
    OdbError::WrongKind {
        oid: *oid,
        expected,
        actual: found.kind(),
    }
}

impl ObjectSource for ObjectDatabase {
    fn get(&self, oid: &ObjectId) -> Result<Object, OdbError> {
        ObjectDatabase::get(self, oid)
    }

    fn header(&self, oid: &ObjectId) -> Result<(ObjectKind, u64), OdbError> {
        ObjectDatabase::header(self, oid)
    }

    fn has(&self, oid: &ObjectId) -> bool {
        ObjectDatabase::has(self, oid)
    }
}
