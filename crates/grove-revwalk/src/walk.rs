use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, VecDeque};

use bitflags::bitflags;
use bstr::ByteSlice;
use grove_hash::ObjectId;
use grove_object::{Commit, ObjectKind};
use grove_odb::ObjectSource;

use crate::RevWalkError;

bitflags! {
    /// Per-commit walk state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WalkFlags: u8 {
        /// Entered the frontier.
        const SEEN = 1 << 0;
        /// Reachable from a hidden commit.
        const UNINTERESTING = 1 << 1;
        /// Already emitted.
        const ADDED = 1 << 2;
    }
}

/// Emission order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Newest commit time first, produced lazily.
    #[default]
    Chronological,
    /// No commit before all of its children.
    Topological,
    /// Oldest first.
    Reverse,
}

#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    pub order: SortOrder,
    pub max_count: Option<usize>,
    pub skip: usize,
    /// Only commits with committer time at or after this.
    pub since: Option<i64>,
    /// Only commits with committer time at or before this.
    pub until: Option<i64>,
    pub first_parent: bool,
    /// Substring of the author name or email.
    pub author: Option<String>,
    /// Substring of the message.
    pub grep: Option<String>,
}

impl WalkOptions {
    fn needs_commit(&self) -> bool {
        self.since.is_some() || self.until.is_some() || self.author.is_some() || self.grep.is_some()
    }
}

pub(crate) struct CommitNode {
    pub(crate) tree: ObjectId,
    pub(crate) parents: Vec<ObjectId>,
    pub(crate) time: i64,
    pub(crate) flags: WalkFlags,
}

/// Frontier entry: newest first, then earliest inserted.
pub(crate) struct QueueEntry {
    pub(crate) time: i64,
    pub(crate) seq: u64,
    pub(crate) oid: ObjectId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Lazy commit iterator.
///
/// ```text
/// let mut walk = RevWalk::new(&odb);
/// walk.push(tip)?;
/// walk.hide(base)?;
/// for id in walk { ... }
/// ```
pub struct RevWalk<'a> {
    source: &'a dyn ObjectSource,
    arena: HashMap<ObjectId, CommitNode>,
    queue: BinaryHeap<QueueEntry>,
    seq: u64,
    options: WalkOptions,
    materialized: Option<VecDeque<ObjectId>>,
    skipped: usize,
    emitted: usize,
}

impl<'a> RevWalk<'a> {
    pub fn new(source: &'a dyn ObjectSource) -> Self {
        Self {
            source,
            arena: HashMap::new(),
            queue: BinaryHeap::new(),
            seq: 0,
            options: WalkOptions::default(),
            materialized: None,
            skipped: 0,
            emitted: 0,
        }
    }

    pub fn set_options(&mut self, options: WalkOptions) {
        self.options = options;
    }

    pub fn options(&self) -> &WalkOptions {
        &self.options
    }

    /// Add a starting point. Annotated tags are peeled.
    pub fn push(&mut self, oid: ObjectId) -> Result<(), RevWalkError> {
        let oid = self.peel_commit(&oid)?;
        self.load(&oid)?;
        self.enqueue_unseen(oid);
        Ok(())
    }

    /// Exclude `oid` and everything reachable from it.
    pub fn hide(&mut self, oid: ObjectId) -> Result<(), RevWalkError> {
        let oid = self.peel_commit(&oid)?;
        self.load(&oid)?;
        self.mark_uninteresting(oid);
        self.enqueue_unseen(oid);
        Ok(())
    }

    /// Flags of a loaded commit; empty for commits the walk has not reached.
    pub fn flags(&self, oid: &ObjectId) -> WalkFlags {
        self.arena.get(oid).map(|n| n.flags).unwrap_or_default()
    }

    pub(crate) fn node(&self, oid: &ObjectId) -> Option<&CommitNode> {
        self.arena.get(oid)
    }

    /// Trees of every loaded uninteresting commit.
    pub(crate) fn uninteresting_trees(&self) -> Vec<ObjectId> {
        self.arena
            .values()
            .filter(|n| n.flags.contains(WalkFlags::UNINTERESTING))
            .map(|n| n.tree)
            .collect()
    }

    fn peel_commit(&self, oid: &ObjectId) -> Result<ObjectId, RevWalkError> {
        match self.source.peel(oid)? {
            (peeled, ObjectKind::Commit) => Ok(peeled),
            _ => Err(RevWalkError::NotACommit(*oid)),
        }
    }

    fn load(&mut self, oid: &ObjectId) -> Result<(), RevWalkError> {
        if self.arena.contains_key(oid) {
            return Ok(());
        }
        let commit = self.source.commit(oid)?;
        self.arena.insert(
            *oid,
            CommitNode {
                tree: commit.tree,
                time: commit.time(),
                parents: commit.parents,
                flags: WalkFlags::empty(),
            },
        );
        Ok(())
    }

    fn enqueue_unseen(&mut self, oid: ObjectId) {
        let Some(node) = self.arena.get_mut(&oid) else {
            return;
        };
        if node.flags.contains(WalkFlags::SEEN) {
            return;
        }
        node.flags.insert(WalkFlags::SEEN);
        self.queue.push(QueueEntry {
            time: node.time,
            seq: self.seq,
            oid,
        });
        self.seq += 1;
    }

    /// Flag `oid` and every loaded ancestor. Ancestors not loaded yet pick
    /// the flag up when the frontier reaches them.
    fn mark_uninteresting(&mut self, oid: ObjectId) {
        let mut stack = vec![oid];
        while let Some(current) = stack.pop() {
            let Some(node) = self.arena.get_mut(&current) else {
                continue;
            };
            if node.flags.contains(WalkFlags::UNINTERESTING) {
                continue;
            }
            node.flags.insert(WalkFlags::UNINTERESTING);
            stack.extend(node.parents.iter().copied());
        }
    }

    /// Load the parents of a popped commit and put the unseen ones on the
    /// frontier.
    fn expand(&mut self, oid: &ObjectId) -> Result<(), RevWalkError> {
        let Some(node) = self.arena.get(oid) else {
            return Ok(());
        };
        let uninteresting = node.flags.contains(WalkFlags::UNINTERESTING);
        let parents: Vec<ObjectId> = if self.options.first_parent && !uninteresting {
            node.parents.iter().take(1).copied().collect()
        } else {
            node.parents.clone()
        };
        for parent in parents {
            self.load(&parent)?;
            if uninteresting {
                self.mark_uninteresting(parent);
            }
            self.enqueue_unseen(parent);
        }
        Ok(())
    }

    fn everybody_uninteresting(&self) -> bool {
        self.queue
            .iter()
            .all(|e| self.flags(&e.oid).contains(WalkFlags::UNINTERESTING))
    }

    fn next_lazy(&mut self) -> Result<Option<ObjectId>, RevWalkError> {
        while !self.everybody_uninteresting() {
            let Some(entry) = self.queue.pop() else {
                break;
            };
            self.expand(&entry.oid)?;
            let Some(node) = self.arena.get_mut(&entry.oid) else {
                continue;
            };
            if node
                .flags
                .intersects(WalkFlags::UNINTERESTING | WalkFlags::ADDED)
            {
                continue;
            }
            node.flags.insert(WalkFlags::ADDED);
            return Ok(Some(entry.oid));
        }
        Ok(None)
    }

    /// Walk to exhaustion, then drop commits that turned out to be
    /// reachable from a hidden commit after they were popped.
    fn materialize(&mut self) -> Result<VecDeque<ObjectId>, RevWalkError> {
        let mut all = Vec::new();
        while let Some(oid) = self.next_lazy()? {
            all.push(oid);
        }
        all.retain(|oid| !self.flags(oid).contains(WalkFlags::UNINTERESTING));
        Ok(match self.options.order {
            SortOrder::Reverse => all.into_iter().rev().collect(),
            _ => self.topo_sort(all),
        })
    }

    /// Kahn's algorithm over the collected set. Among ready commits the
    /// one that came first chronologically goes first.
    fn topo_sort(&self, commits: Vec<ObjectId>) -> VecDeque<ObjectId> {
        let position: HashMap<ObjectId, usize> =
            commits.iter().enumerate().map(|(i, c)| (*c, i)).collect();
        let parents_of = |oid: &ObjectId| -> Vec<usize> {
            let Some(node) = self.arena.get(oid) else {
                return Vec::new();
            };
            let limit = if self.options.first_parent { 1 } else { usize::MAX };
            node.parents
                .iter()
                .take(limit)
                .filter_map(|p| position.get(p).copied())
                .collect()
        };

        let mut indegree = vec![0usize; commits.len()];
        for oid in &commits {
            for p in parents_of(oid) {
                indegree[p] += 1;
            }
        }
        let mut ready: BinaryHeap<Reverse<usize>> = indegree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();
        let mut out = VecDeque::with_capacity(commits.len());
        while let Some(Reverse(i)) = ready.pop() {
            out.push_back(commits[i]);
            for p in parents_of(&commits[i]) {
                indegree[p] -= 1;
                if indegree[p] == 0 {
                    ready.push(Reverse(p));
                }
            }
        }
        out
    }

    fn next_raw(&mut self) -> Result<Option<ObjectId>, RevWalkError> {
        if self.options.order == SortOrder::Chronological {
            return self.next_lazy();
        }
        if self.materialized.is_none() {
            let list = self.materialize()?;
            self.materialized = Some(list);
        }
        Ok(self.materialized.as_mut().and_then(|m| m.pop_front()))
    }

    fn passes_filters(&self, commit: &Commit) -> bool {
        let time = commit.time();
        if self.options.since.map_or(false, |since| time < since) {
            return false;
        }
        if self.options.until.map_or(false, |until| time > until) {
            return false;
        }
        if let Some(author) = &self.options.author {
            if !commit.author.name.contains_str(author) && !commit.author.email.contains_str(author) {
                return false;
            }
        }
        if let Some(grep) = &self.options.grep {
            if !commit.message.contains_str(grep) {
                return false;
            }
        }
        true
    }

    fn next_filtered(&mut self) -> Result<Option<ObjectId>, RevWalkError> {
        loop {
            let Some(oid) = self.next_raw()? else {
                return Ok(None);
            };
            if self.options.needs_commit() {
                let commit = self.source.commit(&oid)?;
                if !self.passes_filters(&commit) {
                    continue;
                }
            }
            if self.skipped < self.options.skip {
                self.skipped += 1;
                continue;
            }
            return Ok(Some(oid));
        }
    }
}

impl Iterator for RevWalk<'_> {
    type Item = Result<ObjectId, RevWalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.options.max_count.map_or(false, |max| self.emitted >= max) {
            return None;
        }
        match self.next_filtered() {
            Ok(Some(oid)) => {
                self.emitted += 1;
                Some(Ok(oid))
            }
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(time: i64, seq: u64) -> QueueEntry {
        QueueEntry {
            time,
            seq,
            oid: ObjectId::NULL,
        }
    }

    #[test]
    fn newest_pops_first() {
        let mut heap = BinaryHeap::new();
        heap.push(entry(10, 0));
        heap.push(entry(30, 1));
        heap.push(entry(20, 2));
        let times: Vec<i64> = std::iter::from_fn(|| heap.pop().map(|e| e.time)).collect();
        assert_eq!(times, vec![30, 20, 10]);
    }

    #[test]
    fn equal_times_pop_in_insertion_order() {
        let mut heap = BinaryHeap::new();
        heap.push(entry(5, 2));
        heap.push(entry(5, 0));
        heap.push(entry(5, 1));
        let seqs: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|e| e.seq)).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }
}
