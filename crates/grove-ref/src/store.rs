use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use grove_hash::ObjectId;
use grove_utils::LockFile;

use crate::error::RefError;
use crate::loose;
use crate::name::RefName;
use crate::packed::{PackedRef, PackedRefs};
use crate::update::{Ancestry, DeleteOutcome, Expected, RefUpdate, RejectReason, UpdateOutcome};
use crate::Reference;

pub const MAX_SYMREF_DEPTH: usize = 10;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// Peels an annotated tag id to the id it ultimately names; `None` for
/// anything that is not a tag.
pub type Peel<'a> = &'a dyn Fn(&ObjectId) -> Option<ObjectId>;

/// The files backend: one file per loose ref under the git directory, plus
/// `packed-refs`. Loose entries shadow packed ones.
///
/// Every write holds `<ref>.lock` (or `packed-refs.lock`) for the duration
/// of one operation only; there is no store-wide lock.
#[derive(Debug, Clone)]
pub struct FilesRefStore {
    git_dir: PathBuf,
    lock_timeout: Duration,
}

impl FilesRefStore {
    pub fn new(git_dir: impl AsRef<Path>) -> Self {
        Self {
            git_dir: git_dir.as_ref().to_path_buf(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// How long writers retry a held lock before reporting contention.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn packed_path(&self) -> PathBuf {
        self.git_dir.join("packed-refs")
    }

    fn lock(&self, path: &Path) -> Result<LockFile, RefError> {
        Ok(LockFile::acquire_timeout(path, self.lock_timeout)?)
    }

    /// Lock the loose file for `name`, creating its directory if needed.
    fn lock_ref(&self, name: &RefName) -> Result<(PathBuf, LockFile), RefError> {
        let path = loose::path_of(&self.git_dir, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock = self.lock(&path)?;
        Ok((path, lock))
    }

    /// The ref as stored, without following symbolic targets.
    pub fn read(&self, name: &RefName) -> Result<Option<Reference>, RefError> {
        if let Some(found) = loose::read(&self.git_dir, name)? {
            return Ok(Some(found));
        }
        let packed = PackedRefs::load(&self.packed_path())?;
        Ok(packed.find(name).map(|r| Reference::Direct(r.oid)))
    }

    /// Follow symbolic refs from `name` to the direct ref at the end of the
    /// chain. Returns that ref's name and its value, `None` if it does not
    /// exist yet.
    pub fn follow(&self, name: &RefName) -> Result<(RefName, Option<ObjectId>), RefError> {
        let mut current = name.clone();
        for _ in 0..=MAX_SYMREF_DEPTH {
            match self.read(&current)? {
                None => return Ok((current, None)),
                Some(Reference::Direct(id)) => return Ok((current, Some(id))),
                Some(Reference::Symbolic(target)) => current = target,
            }
        }
        Err(RefError::SymrefLoop(name.to_string()))
    }

    pub fn try_resolve(&self, name: &RefName) -> Result<Option<ObjectId>, RefError> {
        Ok(self.follow(name)?.1)
    }

    pub fn resolve(&self, name: &RefName) -> Result<ObjectId, RefError> {
        self.try_resolve(name)?
            .ok_or_else(|| RefError::NotFound(name.to_string()))
    }

    /// Compare-and-swap update.
    ///
    /// A symbolic `name` updates the direct ref its chain ends at. Refs
    /// that do not exist yet report [`UpdateOutcome::Created`]; otherwise
    /// `ancestry` decides between a fast-forward and a forced or rejected
    /// move. Rejections are outcomes, not errors; a lock that stays held
    /// past the timeout is [`RefError::LockContention`].
    pub fn update(&self, update: &RefUpdate, ancestry: &dyn Ancestry) -> Result<UpdateOutcome, RefError> {
        let (leaf, _) = self.follow(&update.name)?;
        loose::check_dir_file_conflict(&self.git_dir, &leaf)?;
        let (_, mut lock) = self.lock_ref(&leaf)?;

        let current = match self.read(&leaf)? {
            Some(Reference::Direct(id)) => Some(id),
            Some(Reference::Symbolic(_)) => return Err(RefError::Symbolic(leaf.to_string())),
            None => None,
        };
        if !update.expected.admits(current) {
            return Ok(UpdateOutcome::Rejected(RejectReason::Stale {
                expected: update.expected.value(),
                actual: current,
            }));
        }

        let outcome = match current {
            None => UpdateOutcome::Created,
            Some(old) if old == update.new => return Ok(UpdateOutcome::NoChange),
            Some(old) => {
                if ancestry.is_ancestor(&old, &update.new).map_err(RefError::Ancestry)? {
                    UpdateOutcome::FastForward
                } else if update.force {
                    UpdateOutcome::Forced
                } else {
                    return Ok(UpdateOutcome::Rejected(RejectReason::NonFastForward));
                }
            }
        };

        writeln!(lock, "{}", update.new)?;
        lock.commit()?;
        tracing::debug!(name = %leaf, old = ?current, new = %update.new, ?outcome, "updated ref");
        Ok(outcome)
    }

    /// Delete `name` itself (a symbolic ref is removed, not its target),
    /// from loose storage and from `packed-refs`.
    pub fn delete(&self, name: &RefName, expected: Expected) -> Result<DeleteOutcome, RefError> {
        let (path, lock) = self.lock_ref(name)?;
        let current = match self.read(name)? {
            Some(Reference::Direct(id)) => Some(id),
            Some(Reference::Symbolic(_)) => self.try_resolve(name)?,
            None => {
                drop(lock);
                loose::prune_empty_dirs(&self.git_dir, &path);
                return match expected {
                    Expected::Value(id) => Ok(DeleteOutcome::Rejected(RejectReason::Stale {
                        expected: Some(id),
                        actual: None,
                    })),
                    Expected::Any | Expected::Missing => Err(RefError::NotFound(name.to_string())),
                };
            }
        };
        if !expected.admits(current) {
            return Ok(DeleteOutcome::Rejected(RejectReason::Stale {
                expected: expected.value(),
                actual: current,
            }));
        }

        let packed_path = self.packed_path();
        if PackedRefs::load(&packed_path)?.find(name).is_some() {
            let mut packed_lock = self.lock(&packed_path)?;
            let mut packed = PackedRefs::load(&packed_path)?;
            packed.remove(name);
            packed_lock.write_all(&packed.to_bytes())?;
            packed_lock.commit()?;
        }
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        drop(lock);
        loose::prune_empty_dirs(&self.git_dir, &path);
        tracing::debug!(name = %name, old = ?current, "deleted ref");
        Ok(DeleteOutcome::Deleted)
    }

    /// Point `name` at `target`. Only `name`'s own file is written.
    pub fn set_symbolic(&self, name: &RefName, target: &RefName) -> Result<(), RefError> {
        let (_, mut lock) = self.lock_ref(name)?;
        writeln!(lock, "ref: {}", target)?;
        lock.commit()?;
        tracing::debug!(name = %name, target = %target, "set symbolic ref");
        Ok(())
    }

    /// Store `id` directly in `name`'s own file, replacing a symbolic ref
    /// rather than updating its target. Used to detach `HEAD`.
    pub fn set_detached(&self, name: &RefName, id: &ObjectId) -> Result<(), RefError> {
        let (_, mut lock) = self.lock_ref(name)?;
        writeln!(lock, "{}", id)?;
        lock.commit()?;
        tracing::debug!(name = %name, %id, "detached ref");
        Ok(())
    }

    /// Refs whose full name starts with `prefix`, resolved to ids and
    /// sorted by name. Dangling symbolic refs are left out.
    pub fn list(&self, prefix: &str) -> Result<Vec<(RefName, ObjectId)>, RefError> {
        let mut names: BTreeSet<RefName> = loose::enumerate(&self.git_dir)?.into_iter().collect();
        names.extend(PackedRefs::load(&self.packed_path())?.iter().map(|r| r.name.clone()));

        let mut out = Vec::with_capacity(names.len());
        for name in names.into_iter().filter(|n| n.as_str().starts_with(prefix)) {
            match self.follow(&name) {
                Ok((_, Some(id))) => out.push((name, id)),
                Ok((_, None)) => {}
                Err(RefError::SymrefLoop(_)) => {
                    tracing::warn!(name = %name, "skipping symbolic ref loop");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// Move every loose direct ref into `packed-refs`, recording peeled
    /// targets for tags when `peel` is given. Returns how many refs moved.
    pub fn pack_refs(&self, peel: Option<Peel<'_>>) -> Result<usize, RefError> {
        let packed_path = self.packed_path();
        let mut lock = self.lock(&packed_path)?;
        let mut packed = PackedRefs::load(&packed_path)?;

        let mut moved = Vec::new();
        for name in loose::enumerate(&self.git_dir)? {
            if let Some(Reference::Direct(oid)) = loose::read(&self.git_dir, &name)? {
                let peeled = if name.is_tag() {
                    peel.and_then(|p| p(&oid)).filter(|p| *p != oid)
                } else {
                    None
                };
                packed.upsert(PackedRef {
                    name: name.clone(),
                    oid,
                    peeled,
                });
                moved.push((name, oid));
            }
        }
        lock.write_all(&packed.to_bytes())?;
        lock.commit()?;

        for (name, oid) in &moved {
            let path = loose::path_of(&self.git_dir, name);
            let ref_lock = match self.lock(&path) {
                Ok(l) => l,
                Err(RefError::LockContention { .. }) => {
                    tracing::debug!(name = %name, "ref busy, leaving loose copy");
                    continue;
                }
                Err(e) => return Err(e),
            };
            // Only remove the loose file if nobody moved the ref meanwhile.
            if loose::read(&self.git_dir, name)? == Some(Reference::Direct(*oid)) {
                fs::remove_file(&path)?;
            }
            drop(ref_lock);
            loose::prune_empty_dirs(&self.git_dir, &path);
        }
        tracing::debug!(refs = moved.len(), "packed refs");
        Ok(moved.len())
    }

    /// Tags whose target, after peeling, is `id`.
    pub fn tags_pointing_at(&self, id: &ObjectId, peel: Peel<'_>) -> Result<Vec<RefName>, RefError> {
        Ok(self
            .list("refs/tags/")?
            .into_iter()
            .filter(|(_, oid)| oid == id || peel(oid).as_ref() == Some(id))
            .map(|(name, _)| name)
            .collect())
    }
}
