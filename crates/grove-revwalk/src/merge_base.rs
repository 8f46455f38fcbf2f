//! Common-ancestor queries.
//!
//! [`merge_base`] paints both inputs' ancestors with one flag each, expanding
//! the two frontiers together newest first. The first commit that ends up
//! carrying both flags is the answer. Under clock skew this is a policy
//! choice rather than the lowest common ancestor in every graph, but it is
//! deterministic: the same graph always yields the same commit.

use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use bitflags::bitflags;
use grove_hash::ObjectId;
use grove_odb::ObjectSource;

use crate::walk::QueueEntry;
use crate::RevWalkError;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct Paint: u8 {
        const PARENT1 = 1 << 0;
        const PARENT2 = 1 << 1;
        const BOTH = Self::PARENT1.bits() | Self::PARENT2.bits();
    }
}

struct Painter<'a> {
    source: &'a dyn ObjectSource,
    paint: HashMap<ObjectId, Paint>,
    commits: HashMap<ObjectId, (i64, Vec<ObjectId>)>,
    queue: BinaryHeap<QueueEntry>,
    queued: HashSet<ObjectId>,
    seq: u64,
}

impl Painter<'_> {
    fn load(&mut self, oid: &ObjectId) -> Result<i64, RevWalkError> {
        if let Some((time, _)) = self.commits.get(oid) {
            return Ok(*time);
        }
        let commit = self.source.commit(oid)?;
        let time = commit.time();
        self.commits.insert(*oid, (time, commit.parents));
        Ok(time)
    }

    /// Add `flags` to `oid`. Returns the commit if it now carries both.
    fn paint(&mut self, oid: ObjectId, flags: Paint) -> Result<Option<ObjectId>, RevWalkError> {
        let current = self.paint.entry(oid).or_default();
        if current.contains(flags) {
            return Ok(None);
        }
        current.insert(flags);
        if current.contains(Paint::BOTH) {
            return Ok(Some(oid));
        }
        let time = self.load(&oid)?;
        if self.queued.insert(oid) {
            self.queue.push(QueueEntry {
                time,
                seq: self.seq,
                oid,
            });
            self.seq += 1;
        }
        Ok(None)
    }

    fn run(&mut self) -> Result<Option<ObjectId>, RevWalkError> {
        while let Some(entry) = self.queue.pop() {
            self.queued.remove(&entry.oid);
            let flags = self.paint.get(&entry.oid).copied().unwrap_or_default();
            let parents = self
                .commits
                .get(&entry.oid)
                .map(|(_, p)| p.clone())
                .unwrap_or_default();
            for parent in parents {
                if let Some(found) = self.paint(parent, flags)? {
                    return Ok(Some(found));
                }
            }
        }
        Ok(None)
    }
}

/// The first commit reachable from both `a` and `b`, or `None` when the
/// histories are unrelated. `a == b` yields `a`; an ancestor of the other
/// side yields itself.
pub fn merge_base(
    source: &dyn ObjectSource,
    a: &ObjectId,
    b: &ObjectId,
) -> Result<Option<ObjectId>, RevWalkError> {
    let mut painter = Painter {
        source,
        paint: HashMap::new(),
        commits: HashMap::new(),
        queue: BinaryHeap::new(),
        queued: HashSet::new(),
        seq: 0,
    };
    if let Some(found) = painter.paint(*a, Paint::PARENT1)? {
        return Ok(Some(found));
    }
    if let Some(found) = painter.paint(*b, Paint::PARENT2)? {
        return Ok(Some(found));
    }
    let base = painter.run()?;
    tracing::trace!(%a, %b, base = ?base, loaded = painter.commits.len(), "merge base");
    Ok(base)
}

/// Whether `ancestor` is reachable from `descendant`, by full traversal so
/// that commit timestamps play no part.
pub fn is_ancestor(
    source: &dyn ObjectSource,
    ancestor: &ObjectId,
    descendant: &ObjectId,
) -> Result<bool, RevWalkError> {
    let mut queue = VecDeque::from([*descendant]);
    let mut visited = HashSet::from([*descendant]);
    while let Some(current) = queue.pop_front() {
        if current == *ancestor {
            return Ok(true);
        }
        for parent in source.commit(&current)?.parents {
            if visited.insert(parent) {
                queue.push_back(parent);
            }
        }
    }
    Ok(false)
}

/// Fast-forward oracle for ref updates, backed by an object source.
pub struct CommitAncestry<'a> {
    source: &'a dyn ObjectSource,
}

impl<'a> CommitAncestry<'a> {
    pub fn new(source: &'a dyn ObjectSource) -> Self {
        Self { source }
    }
}

impl grove_ref::Ancestry for CommitAncestry<'_> {
    fn is_ancestor(
        &self,
        ancestor: &ObjectId,
        descendant: &ObjectId,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        is_ancestor(self.source, ancestor, descendant).map_err(Into::into)
    }
}
