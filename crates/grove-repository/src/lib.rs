//! The repository handle.
//!
//! A [`Repository`] owns the object database, the ref store and the parsed
//! configuration of one git directory. There is no process-wide state:
//! every higher-level operation takes the handle, or the sub-store it
//! needs, explicitly.

mod checkout;
mod error;
mod init;

pub use checkout::{checkout_commit, CheckoutTarget};
pub use error::{ErrorKind, RepoError};
pub use init::{InitOptions, DEFAULT_BRANCH};

use std::path::{Path, PathBuf};
use std::time::Duration;

use bstr::{BStr, BString, ByteSlice};
use grove_config::{ConfigFile, CoreConfig};
use grove_hash::ObjectId;
use grove_index::Index;
use grove_object::ObjectKind;
use grove_odb::{ConsolidateOptions, ConsolidateReport, ObjectDatabase, ObjectSource, OdbOptions};
use grove_ref::{FilesRefStore, RefName, RefUpdate, Reference, UpdateOutcome};
use grove_revwalk::CommitAncestry;
use grove_utils::CancellationToken;
use grove_worktree::{FileModeOverride, NativeFs};

pub struct Repository {
    git_dir: PathBuf,
    work_tree: Option<PathBuf>,
    odb: ObjectDatabase,
    refs: FilesRefStore,
    config: ConfigFile,
    core: CoreConfig,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("git_dir", &self.git_dir)
            .field("work_tree", &self.work_tree)
            .finish_non_exhaustive()
    }
}

fn is_git_dir(path: &Path) -> bool {
    path.join("HEAD").is_file() && path.join("objects").is_dir() && path.join("refs").is_dir()
}

impl Repository {
    /// Open the repository whose work tree or git directory is `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let path = path.as_ref();
        let dot_git = path.join(".git");
        if is_git_dir(&dot_git) {
            Self::from_git_dir(dot_git, Some(path.to_path_buf()))
        } else if is_git_dir(path) {
            Self::from_git_dir(path.to_path_buf(), None)
        } else {
            Err(RepoError::NotARepository(path.to_path_buf()))
        }
    }

    /// Create a repository at `path`, or open the one already there.
    pub fn init(path: impl AsRef<Path>, options: &InitOptions) -> Result<Self, RepoError> {
        let (git_dir, work_tree) = init::init_layout(path.as_ref(), options)?;
        Self::from_git_dir(git_dir, work_tree)
    }

    fn from_git_dir(git_dir: PathBuf, work_tree: Option<PathBuf>) -> Result<Self, RepoError> {
        let config = ConfigFile::open(git_dir.join("config"))?;
        let core = CoreConfig::from_config(&config)?;

        // A non-bare `.git` opened directly still has its parent as work tree.
        let work_tree = match work_tree {
            Some(dir) => Some(dir),
            None if !core.bare && git_dir.file_name().is_some_and(|n| n == ".git") => {
                git_dir.parent().map(Path::to_path_buf)
            }
            None => None,
        };

        let odb = ObjectDatabase::open_with(
            git_dir.join("objects"),
            OdbOptions {
                cache_size: core.object_cache_size,
                loose_compression: core.loose_level(),
                pack_compression: core.pack_level(),
            },
        )?;
        let refs = FilesRefStore::new(&git_dir)
            .with_lock_timeout(Duration::from_millis(core.refs_lock_timeout_ms));

        tracing::debug!(git_dir = %git_dir.display(), bare = work_tree.is_none(), "opened repository");
        Ok(Self {
            git_dir,
            work_tree,
            odb,
            refs,
            config,
            core,
        })
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// `None` for bare repositories.
    pub fn work_tree(&self) -> Option<&Path> {
        self.work_tree.as_deref()
    }

    pub fn is_bare(&self) -> bool {
        self.work_tree.is_none()
    }

    pub fn require_work_tree(&self) -> Result<&Path, RepoError> {
        self.work_tree().ok_or(RepoError::NoWorkTree)
    }

    pub fn odb(&self) -> &ObjectDatabase {
        &self.odb
    }

    pub fn refs(&self) -> &FilesRefStore {
        &self.refs
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn core(&self) -> &CoreConfig {
        &self.core
    }

    pub fn index_path(&self) -> PathBuf {
        self.git_dir.join("index")
    }

    /// The index as currently on disk; empty if there is none yet.
    pub fn load_index(&self) -> Result<Index, RepoError> {
        Ok(Index::read_from(self.index_path())?)
    }

    /// Native filesystem capabilities, with the executable bit switched
    /// off when `core.filemode` says so.
    pub fn fs_capabilities(&self) -> FileModeOverride<NativeFs> {
        FileModeOverride::new(NativeFs, self.core.filemode)
    }

    /// Fast-forward oracle backed by this repository's objects.
    pub fn ancestry(&self) -> CommitAncestry<'_> {
        CommitAncestry::new(&self.odb)
    }

    /// The commit `HEAD` resolves to; `None` on an unborn branch.
    pub fn head_commit(&self) -> Result<Option<ObjectId>, RepoError> {
        Ok(self.refs.try_resolve(&RefName::head())?)
    }

    /// The branch `HEAD` points at; `None` when detached.
    pub fn head_branch(&self) -> Result<Option<RefName>, RepoError> {
        Ok(match self.refs.read(&RefName::head())? {
            Some(Reference::Symbolic(target)) => Some(target),
            _ => None,
        })
    }

    /// The root tree of `commit`, peeling annotated tags first.
    pub fn commit_tree(&self, commit: &ObjectId) -> Result<ObjectId, RepoError> {
        let (peeled, kind) = self.odb.peel(commit)?;
        if kind != ObjectKind::Commit {
            return Err(RepoError::NotACommit(peeled));
        }
        Ok(self.odb.commit(&peeled)?.tree)
    }

    /// Content of the blob at `path` in `commit`, or `None` when the path
    /// does not name a file there.
    pub fn blob_at(&self, commit: &ObjectId, path: &BStr) -> Result<Option<Vec<u8>>, RepoError> {
        let tree = self.commit_tree(commit)?;
        match grove_diff::entry_at_path(&self.odb, &tree, path)? {
            Some((mode, oid)) if mode.is_blob() => Ok(Some(self.odb.blob(&oid)?)),
            _ => Ok(None),
        }
    }

    /// Tags naming `id`, directly or through annotated tag objects.
    pub fn tags_at(&self, id: &ObjectId) -> Result<Vec<RefName>, RepoError> {
        let peel = |oid: &ObjectId| self.odb.peel(oid).ok().map(|(peeled, _)| peeled);
        Ok(self.refs.tags_pointing_at(id, &peel)?)
    }

    /// Resolve a full id, `HEAD`, a full ref name, or a short branch, tag or
    /// remote-tracking name, in that order.
    pub fn resolve_revision(&self, spec: &str) -> Result<ObjectId, RepoError> {
        if let Ok(oid) = ObjectId::from_hex(spec) {
            return if self.odb.has(&oid) {
                Ok(oid)
            } else {
                Err(RepoError::UnknownRevision(spec.to_owned()))
            };
        }
        let candidates = [
            spec.to_owned(),
            format!("refs/{}", spec),
            format!("refs/heads/{}", spec),
            format!("refs/tags/{}", spec),
            format!("refs/remotes/{}", spec),
        ];
        for candidate in candidates {
            let Ok(name) = RefName::new(candidate) else {
                continue;
            };
            if let Some(id) = self.refs.try_resolve(&name)? {
                return Ok(id);
            }
        }
        Err(RepoError::UnknownRevision(spec.to_owned()))
    }

    /// Compare-and-swap update with fast-forward checks against this
    /// repository's history.
    pub fn update_ref(&self, update: &RefUpdate) -> Result<UpdateOutcome, RepoError> {
        Ok(self.refs.update(update, &self.ancestry())?)
    }

    /// Like [`update_ref`](Self::update_ref), but a rejection is an error.
    pub fn update_ref_checked(&self, update: &RefUpdate) -> Result<UpdateOutcome, RepoError> {
        match self.update_ref(update)? {
            UpdateOutcome::Rejected(reason) => Err(RepoError::RefRejected {
                name: update.name.to_string(),
                reason,
            }),
            outcome => Ok(outcome),
        }
    }

    /// Hash the current content of `paths` into the store and stage them.
    pub fn stage(&self, paths: &[BString]) -> Result<Vec<ObjectId>, RepoError> {
        let work_tree = self.require_work_tree()?;
        let mut index = self.load_index()?;
        let mut staged = Vec::with_capacity(paths.len());
        for path in paths {
            staged.push(index.stage_file_with(&self.odb, work_tree, path.as_bstr(), self.core.filemode)?);
        }
        index.write_to(self.index_path())?;
        tracing::debug!(paths = paths.len(), "staged paths");
        Ok(staged)
    }

    /// Write the staged snapshot as trees and return the root.
    pub fn write_tree(&self) -> Result<ObjectId, RepoError> {
        Ok(self.load_index()?.write_tree(&self.odb)?)
    }

    /// Pack every loose object, with delta settings from `pack.*`.
    pub fn repack(&self, cancel: &CancellationToken) -> Result<ConsolidateReport, RepoError> {
        let options = ConsolidateOptions {
            window: self.core.delta_window,
            depth: self.core.delta_depth,
            cancel: cancel.clone(),
        };
        Ok(self.odb.consolidate(&options)?)
    }

    /// Move loose refs into `packed-refs`, recording peeled tag targets.
    pub fn pack_refs(&self) -> Result<usize, RepoError> {
        let peel = |oid: &ObjectId| match self.odb.peel(oid) {
            Ok((peeled, _)) if peeled != *oid => Some(peeled),
            _ => None,
        };
        Ok(self.refs.pack_refs(Some(&peel))?)
    }
}
