use std::collections::{BTreeMap, HashMap};
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use bstr::{BStr, BString, ByteSlice, ByteVec};
use grove_index::entry::IndexEntry;
use grove_index::{work_path, Index, Stage};
use grove_object::{compute_id, EntryMode, ObjectKind};

use crate::{Conflict, FsCapabilities, PathConflict, SyncError, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// Index and target agree; the entry is kept as it is.
    Retain,
    /// The disk already holds the target; only stat data is refreshed.
    Refresh,
    /// Write the target. `clear_dir` removes a directory standing at the path.
    Write { clear_dir: bool },
    /// Remove the file and drop the entry.
    Delete,
    /// Drop the entry; nothing on disk to remove.
    Forget,
}

#[derive(Debug, Clone)]
pub(crate) struct Step {
    pub path: BString,
    pub full: PathBuf,
    pub target: Option<Target>,
    pub previous: Option<IndexEntry>,
    pub action: Action,
}

#[derive(Debug, Default)]
pub(crate) struct Plan {
    pub steps: Vec<Step>,
    pub conflicts: Vec<PathConflict>,
    /// Untracked files removed under force because a directory is needed.
    pub in_the_way: Vec<PathBuf>,
}

enum Disk {
    Missing,
    Dir,
    File(Metadata),
}

#[derive(Default)]
struct Slot<'i> {
    entry: Option<&'i IndexEntry>,
    unmerged: bool,
    target: Option<Target>,
}

pub(crate) struct Planner<'a> {
    pub work_dir: &'a Path,
    pub caps: &'a dyn FsCapabilities,
    pub force: bool,
}

impl Planner<'_> {
    pub fn plan(&self, index: &Index, target: &Index) -> Result<Plan, SyncError> {
        let mut slots: BTreeMap<&BStr, Slot<'_>> = BTreeMap::new();
        for entry in index.iter() {
            let slot = slots.entry(entry.path.as_bstr()).or_default();
            if entry.stage == Stage::Normal {
                slot.entry = Some(entry);
            } else {
                slot.unmerged = true;
            }
        }
        for entry in target.iter() {
            slots.entry(entry.path.as_bstr()).or_default().target = Some((entry.mode, entry.oid));
        }

        let mut plan = Plan::default();
        let mut by_path: BTreeMap<BString, usize> = BTreeMap::new();
        let mut dir_at: Vec<usize> = Vec::new();
        for (path, slot) in slots {
            let full = work_path(self.work_dir, path)?;
            let (action, conflict, is_dir) = self.classify(&full, &slot)?;
            if let Some(kind) = conflict {
                plan.conflicts.push(PathConflict {
                    path: path.to_owned(),
                    kind,
                });
            }
            by_path.insert(path.to_owned(), plan.steps.len());
            if is_dir && matches!(action, Action::Write { .. }) {
                dir_at.push(plan.steps.len());
            }
            plan.steps.push(Step {
                path: path.to_owned(),
                full,
                target: slot.target,
                previous: slot.entry.cloned(),
                action,
            });
        }

        for i in dir_at {
            let step = &plan.steps[i];
            let prefix = step.path.as_bstr();
            if !self.directory_is_disposable(&step.full, prefix, &plan.steps, &by_path)? {
                plan.conflicts.push(PathConflict {
                    path: step.path.clone(),
                    kind: Conflict::DirectoryInTheWay,
                });
            }
        }
        self.check_ancestors(&mut plan, &by_path)?;

        plan.conflicts.sort_by(|a, b| a.path.cmp(&b.path));
        plan.conflicts.dedup();
        Ok(plan)
    }

    /// Decide one path. Returns the action, a conflict if the action would
    /// lose local content, and whether a directory currently sits there.
    fn classify(
        &self,
        full: &Path,
        slot: &Slot<'_>,
    ) -> Result<(Action, Option<Conflict>, bool), SyncError> {
        let tracked = slot.entry.is_some() || slot.unmerged;
        if let (Some(target), Some(entry), false, false) =
            (slot.target, slot.entry, slot.unmerged, self.force)
        {
            if entry.mode == target.0 && entry.oid == target.1 {
                return Ok((Action::Retain, None, false));
            }
        }

        match self.probe(full)? {
            Disk::Dir => Ok(match slot.target {
                Some((EntryMode::Gitlink, _)) => (Action::Refresh, None, true),
                Some(_) => (Action::Write { clear_dir: true }, None, true),
                None if slot.entry.is_some_and(|e| e.mode == EntryMode::Gitlink) => {
                    (Action::Delete, None, true)
                }
                None => (Action::Forget, None, true),
            }),
            Disk::Missing => Ok(match slot.target {
                Some(_) => (Action::Write { clear_dir: false }, None, false),
                None => (Action::Forget, None, false),
            }),
            Disk::File(meta) => {
                let on_disk = self.disk_entry(full, &meta, slot.entry)?;
                if let Some(target) = slot.target {
                    if target.0 != EntryMode::Gitlink && self.agrees(on_disk, target) {
                        return Ok((Action::Refresh, None, false));
                    }
                }
                let clean = !slot.unmerged
                    && slot
                        .entry
                        .is_some_and(|e| e.mode != EntryMode::Gitlink && self.agrees(on_disk, (e.mode, e.oid)));
                let (action, conflict) = match (slot.target, tracked) {
                    (Some(_), false) => (
                        Action::Write { clear_dir: false },
                        Some(Conflict::UntrackedOverwritten),
                    ),
                    (Some(_), true) => (
                        Action::Write { clear_dir: false },
                        (!clean).then_some(Conflict::DirtyFile),
                    ),
                    (None, _) => (Action::Delete, (!clean).then_some(Conflict::DirtyFile)),
                };
                Ok((action, conflict.filter(|_| !self.force), false))
            }
        }
    }

    fn probe(&self, full: &Path) -> Result<Disk, SyncError> {
        match fs::symlink_metadata(full) {
            Ok(meta) if meta.is_dir() => Ok(Disk::Dir),
            Ok(meta) => Ok(Disk::File(meta)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Disk::Missing),
            // A file higher up makes the path unreachable.
            Err(e) if self.blocked_by_file(full) => {
                tracing::trace!(path = %full.display(), error = %e, "path below a file");
                Ok(Disk::Missing)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn blocked_by_file(&self, full: &Path) -> bool {
        full.ancestors()
            .skip(1)
            .take_while(|p| p.starts_with(self.work_dir) && p != &self.work_dir)
            .any(|p| fs::symlink_metadata(p).is_ok_and(|m| !m.is_dir()))
    }

    /// The (mode, id) the file at `full` holds. Stat data that still
    /// matches the index entry, or an assume-valid entry, is trusted.
    fn disk_entry(
        &self,
        full: &Path,
        meta: &Metadata,
        entry: Option<&IndexEntry>,
    ) -> Result<Target, SyncError> {
        if let Some(entry) = entry {
            if entry.assume_valid() || entry.stat.matches(meta) {
                return Ok((entry.mode, entry.oid));
            }
        }
        if meta.file_type().is_symlink() {
            let link = fs::read_link(full)?;
            let bytes = Vec::from_path_lossy(&link).into_owned();
            return Ok((EntryMode::Symlink, compute_id(ObjectKind::Blob, &bytes)?));
        }
        let data = fs::read(full)?;
        let mode = if is_executable(meta) {
            EntryMode::Executable
        } else {
            EntryMode::Regular
        };
        Ok((mode, compute_id(ObjectKind::Blob, &data)?))
    }

    /// Whether what is on disk counts as `wanted`, given what the file
    /// system can represent.
    pub(crate) fn agrees(&self, on_disk: Target, wanted: Target) -> bool {
        use EntryMode::*;
        if on_disk.1 != wanted.1 {
            return false;
        }
        match (on_disk.0, wanted.0) {
            (a, b) if a == b => true,
            (Regular | Executable, Regular | Executable) => !self.caps.supports_executable(),
            (Regular | Executable, Symlink) => !self.caps.supports_symlinks(),
            _ => false,
        }
    }

    /// A directory may be replaced by a file only if every file below it
    /// is tracked and about to be deleted.
    fn directory_is_disposable(
        &self,
        dir: &Path,
        prefix: &BStr,
        steps: &[Step],
        by_path: &BTreeMap<BString, usize>,
    ) -> Result<bool, SyncError> {
        if self.force {
            return Ok(true);
        }
        let mut stack: Vec<(PathBuf, BString)> = vec![(dir.to_path_buf(), prefix.to_owned())];
        while let Some((dir, rel)) = stack.pop() {
            for item in fs::read_dir(&dir)? {
                let item = item?;
                let mut child = rel.clone();
                child.push(b'/');
                child.push_str(Vec::from_os_str_lossy(&item.file_name()));
                if item.file_type()?.is_dir() {
                    stack.push((item.path(), child));
                    continue;
                }
                let deleted = by_path
                    .get(&child)
                    .is_some_and(|&i| steps[i].action == Action::Delete);
                if !deleted {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Every written path needs its parents to be directories. A file at a
    /// parent is fine only when the plan deletes it.
    fn check_ancestors(
        &self,
        plan: &mut Plan,
        by_path: &BTreeMap<BString, usize>,
    ) -> Result<(), SyncError> {
        let mut blocking: HashMap<BString, bool> = HashMap::new();
        let mut found = Vec::new();
        for step in &plan.steps {
            if !matches!(step.action, Action::Write { .. }) {
                continue;
            }
            let mut end = 0;
            while let Some(pos) = step.path[end..].find_byte(b'/') {
                let parent = BString::from(&step.path[..end + pos]);
                end += pos + 1;
                let is_file = match blocking.get(&parent) {
                    Some(known) => *known,
                    None => {
                        let full = work_path(self.work_dir, parent.as_bstr())?;
                        let known = fs::symlink_metadata(&full).is_ok_and(|m| !m.is_dir());
                        blocking.insert(parent.clone(), known);
                        known
                    }
                };
                if !is_file {
                    continue;
                }
                let deleted = by_path
                    .get(&parent)
                    .is_some_and(|&i| plan.steps[i].action == Action::Delete);
                if !deleted {
                    found.push(parent);
                }
            }
        }
        for parent in found {
            if self.force {
                let full = work_path(self.work_dir, parent.as_bstr())?;
                if !plan.in_the_way.contains(&full) {
                    plan.in_the_way.push(full);
                }
            } else {
                plan.conflicts.push(PathConflict {
                    path: parent,
                    kind: Conflict::FileInTheWay,
                });
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn is_executable(meta: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.is_file() && meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use grove_hash::ObjectId;

    use super::*;
    use crate::FixedCapabilities;

    fn planner(caps: &dyn FsCapabilities) -> Planner<'_> {
        Planner {
            work_dir: Path::new("/nonexistent"),
            caps,
            force: false,
        }
    }

    #[test]
    fn executable_bit_ignored_without_support() {
        let oid = ObjectId::new([7; 20]);
        let minimal = FixedCapabilities::MINIMAL;
        let p = planner(&minimal);
        assert!(p.agrees((EntryMode::Regular, oid), (EntryMode::Executable, oid)));
        assert!(p.agrees((EntryMode::Regular, oid), (EntryMode::Symlink, oid)));

        let full = FixedCapabilities {
            executable: true,
            symlinks: true,
        };
        let p = planner(&full);
        assert!(!p.agrees((EntryMode::Regular, oid), (EntryMode::Executable, oid)));
        assert!(!p.agrees((EntryMode::Regular, oid), (EntryMode::Symlink, oid)));
        assert!(!p.agrees((EntryMode::Regular, oid), (EntryMode::Regular, ObjectId::NULL)));
    }
}
