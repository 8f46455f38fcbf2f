use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use grove_hash::ObjectId;
use grove_index::entry::IndexEntry;
use grove_index::{Index, StatData};
use grove_object::{EntryMode, ObjectKind};
use grove_odb::ObjectDatabase;
use grove_utils::CancellationToken;
use tempfile::NamedTempFile;

use crate::plan::{Action, Plan, Planner, Step};
use crate::{FsCapabilities, PathConflict, SyncError};

#[derive(Debug, Clone, Default)]
pub struct CheckoutOptions {
    /// Overwrite local changes and remove whatever is in the way.
    pub force: bool,
    pub cancel: CancellationToken,
}

/// What a checkout did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckoutReport {
    pub written: usize,
    pub deleted: usize,
    /// Paths already matching the target.
    pub unchanged: usize,
    pub dirs_created: usize,
    pub dirs_removed: usize,
}

pub struct Checkout<'a> {
    odb: &'a ObjectDatabase,
    work_dir: PathBuf,
    caps: &'a dyn FsCapabilities,
    index_path: PathBuf,
    options: CheckoutOptions,
}

impl<'a> Checkout<'a> {
    /// The index is persisted to `<work_dir>/.git/index` unless
    /// [`with_index_path`](Self::with_index_path) says otherwise.
    pub fn new(
        odb: &'a ObjectDatabase,
        work_dir: impl Into<PathBuf>,
        caps: &'a dyn FsCapabilities,
    ) -> Self {
        let work_dir = work_dir.into();
        let index_path = work_dir.join(".git").join("index");
        Self {
            odb,
            work_dir,
            caps,
            index_path,
            options: CheckoutOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CheckoutOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = path.into();
        self
    }

    fn planner(&self) -> Planner<'_> {
        Planner {
            work_dir: &self.work_dir,
            caps: self.caps,
            force: self.options.force,
        }
    }

    fn plan(&self, index: &Index, target_tree: &ObjectId) -> Result<Plan, SyncError> {
        let target = Index::from_tree(self.odb, target_tree)?;
        self.planner().plan(index, &target)
    }

    /// Every path that would block a checkout of `target_tree`, without
    /// changing anything.
    pub fn conflicts(
        &self,
        index: &Index,
        target_tree: &ObjectId,
    ) -> Result<Vec<PathConflict>, SyncError> {
        Ok(self.plan(index, target_tree)?.conflicts)
    }

    /// Make the work tree and `index` match `target_tree`.
    ///
    /// Nothing is touched when a conflict is found. The index is written
    /// only after every file operation succeeded; on cancellation it is
    /// left as it was and a later run picks up where this one stopped.
    pub fn sync(
        &self,
        index: &mut Index,
        target_tree: &ObjectId,
    ) -> Result<CheckoutReport, SyncError> {
        self.options.cancel.check()?;
        let plan = self.plan(index, target_tree)?;
        if !plan.conflicts.is_empty() {
            tracing::debug!(conflicts = plan.conflicts.len(), "checkout refused");
            return Err(SyncError::DirtyWorkingTree {
                conflicts: plan.conflicts,
            });
        }

        let mut report = CheckoutReport::default();
        self.delete(&plan, &mut report)?;
        self.create_dirs(&plan, &mut report)?;
        self.write(&plan, &mut report)?;

        let rebuilt = self.rebuild_index(&plan.steps)?;
        rebuilt.write_to(&self.index_path)?;
        *index = rebuilt;

        tracing::info!(
            target = %target_tree,
            written = report.written,
            deleted = report.deleted,
            unchanged = report.unchanged,
            "checkout complete"
        );
        Ok(report)
    }

    fn delete(&self, plan: &Plan, report: &mut CheckoutReport) -> Result<(), SyncError> {
        let mut emptied: BTreeSet<PathBuf> = BTreeSet::new();
        let deletions = plan
            .steps
            .iter()
            .filter(|s| s.action == Action::Delete)
            .map(|s| (s.full.as_path(), s.previous.as_ref().map(|e| e.mode)))
            .chain(plan.in_the_way.iter().map(|p| (p.as_path(), None)));

        for (full, mode) in deletions {
            self.options.cancel.check()?;
            let removed = if mode == Some(EntryMode::Gitlink) {
                // A populated submodule directory is left alone.
                fs::remove_dir(full).is_ok()
            } else {
                remove_if_present(full)?
            };
            if removed {
                report.deleted += 1;
            }
            for parent in full.ancestors().skip(1) {
                if parent == self.work_dir || !parent.starts_with(&self.work_dir) {
                    break;
                }
                emptied.insert(parent.to_path_buf());
            }
        }

        let mut dirs: Vec<PathBuf> = emptied.into_iter().collect();
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in dirs {
            if fs::remove_dir(&dir).is_ok() {
                report.dirs_removed += 1;
            }
        }
        Ok(())
    }

    fn create_dirs(&self, plan: &Plan, report: &mut CheckoutReport) -> Result<(), SyncError> {
        let mut needed: BTreeSet<PathBuf> = BTreeSet::new();
        for step in plan.steps.iter().filter(|s| matches!(s.action, Action::Write { .. })) {
            for parent in step.full.ancestors().skip(1) {
                if parent == self.work_dir || !parent.starts_with(&self.work_dir) {
                    break;
                }
                needed.insert(parent.to_path_buf());
            }
        }
        for dir in needed {
            match fs::symlink_metadata(&dir) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) if self.options.force => {
                    fs::remove_file(&dir)?;
                    fs::create_dir(&dir)?;
                    report.dirs_created += 1;
                }
                _ => {
                    fs::create_dir(&dir)?;
                    report.dirs_created += 1;
                }
            }
        }
        Ok(())
    }

    fn write(&self, plan: &Plan, report: &mut CheckoutReport) -> Result<(), SyncError> {
        for step in &plan.steps {
            match step.action {
                Action::Write { clear_dir } => {
                    self.options.cancel.check()?;
                    if clear_dir {
                        clear_directory(&step.full, self.options.force)?;
                    }
                    let Some((mode, oid)) = step.target else {
                        continue;
                    };
                    self.write_entry(step, mode, &oid)?;
                    report.written += 1;
                }
                Action::Retain | Action::Refresh => report.unchanged += 1,
                Action::Delete | Action::Forget => {}
            }
        }
        Ok(())
    }

    fn write_entry(&self, step: &Step, mode: EntryMode, oid: &ObjectId) -> Result<(), SyncError> {
        let full = &step.full;
        if mode == EntryMode::Gitlink {
            if fs::symlink_metadata(full).is_ok_and(|m| !m.is_dir()) {
                fs::remove_file(full)?;
            }
            if !full.is_dir() {
                fs::create_dir(full)?;
            }
            return Ok(());
        }

        let mut stream = self.odb.open_stream(oid)?;
        if stream.kind() != ObjectKind::Blob {
            return Err(SyncError::NotABlob {
                path: step.path.clone(),
                oid: *oid,
            });
        }
        let dir = full.parent().unwrap_or(&self.work_dir);

        if mode == EntryMode::Symlink && self.caps.supports_symlinks() {
            let mut target = Vec::new();
            stream.read_to_end(&mut target)?;
            return install_symlink(dir, full, &target);
        }

        let mut tmp = NamedTempFile::new_in(dir)?;
        io::copy(&mut stream, tmp.as_file_mut())?;
        set_mode(
            tmp.as_file(),
            mode == EntryMode::Executable && self.caps.supports_executable(),
        )?;
        tmp.persist(full).map_err(|e| e.error)?;
        tracing::trace!(path = %step.path, %oid, "wrote file");
        Ok(())
    }

    fn rebuild_index(&self, steps: &[Step]) -> Result<Index, SyncError> {
        let mut entries = Vec::with_capacity(steps.len());
        for step in steps {
            let Some((mode, oid)) = step.target else {
                continue;
            };
            if let (Action::Retain, Some(previous)) = (step.action, &step.previous) {
                entries.push(previous.clone());
                continue;
            }
            let mut entry = IndexEntry::new(step.path.clone(), oid, mode);
            if mode != EntryMode::Gitlink {
                let meta = fs::symlink_metadata(&step.full)?;
                entry.stat = StatData::from_metadata(&meta);
            }
            entries.push(entry);
        }
        Ok(Index::from_entries(entries))
    }
}

fn remove_if_present(path: &Path) -> Result<bool, SyncError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Remove a directory standing where a file goes. Without force only an
/// empty directory is removed; planning has checked that its tracked
/// content was deleted already.
fn clear_directory(path: &Path, force: bool) -> Result<(), SyncError> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => {
            if force {
                fs::remove_dir_all(path)?;
            } else {
                fs::remove_dir(path)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn set_mode(file: &fs::File, executable: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if executable { 0o755 } else { 0o644 };
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &fs::File, _executable: bool) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn install_symlink(dir: &Path, full: &Path, target: &[u8]) -> Result<(), SyncError> {
    let target = target
        .to_path()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let tmp = tempfile::Builder::new()
        .prefix(".grove-link")
        .make_in(dir, |path| std::os::unix::fs::symlink(target, path))?;
    tmp.persist(full).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(not(unix))]
fn install_symlink(_dir: &Path, _full: &Path, _target: &[u8]) -> Result<(), SyncError> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "symbolic links are not supported").into())
}
