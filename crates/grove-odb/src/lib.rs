//! Unified object database.
//!
//! One handle over an `objects/` directory: loose objects are consulted
//! first, then every installed pack (newest first). Everything returned is
//! verified against its id, and verified objects are kept in a bounded LRU
//! cache. All higher layers read objects through the [`ObjectSource`] trait.

mod consolidate;
mod search;
mod source;
mod stream;

pub use consolidate::{ConsolidateOptions, ConsolidateReport};
pub use source::ObjectSource;
pub use stream::ObjectStream;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use grove_hash::ObjectId;
use grove_loose::LooseStore;
use grove_object::{compute_id, Object, ObjectKind};
use grove_pack::PackFile;

pub use error::OdbError;

mod error {
    use grove_hash::ObjectId;
    use grove_object::ObjectKind;

    #[derive(Debug, thiserror::Error)]
    pub enum OdbError {
        #[error("object not found: {0}")]
        NotFound(ObjectId),

        #[error("corrupt object {oid}: {reason}")]
        Corrupt { oid: ObjectId, reason: String },

        #[error("object {oid} is a {actual}, expected a {expected}")]
        WrongKind {
            oid: ObjectId,
            expected: ObjectKind,
            actual: ObjectKind,
        },

        #[error(transparent)]
        Loose(#[from] grove_loose::LooseError),

        #[error(transparent)]
        Pack(#[from] grove_pack::PackError),

        #[error(transparent)]
        Hash(#[from] grove_hash::HashError),

        #[error(transparent)]
        Cancelled(#[from] grove_utils::Cancelled),

        #[error(transparent)]
        Io(#[from] std::io::Error),
    }

    impl OdbError {
        pub fn is_not_found(&self) -> bool {
            matches!(self, OdbError::NotFound(_))
        }

        pub fn is_corruption(&self) -> bool {
            match self {
                OdbError::Corrupt { .. } => true,
                OdbError::Loose(e) => e.is_corruption(),
                OdbError::Pack(e) => e.is_corruption(),
                _ => false,
            }
        }
    }
}

/// Tunables, normally taken from `core.*` configuration.
#[derive(Debug, Clone, Copy)]
pub struct OdbOptions {
    /// Number of decoded objects kept in memory.
    pub cache_size: usize,
    /// zlib level for new loose objects.
    pub loose_compression: u32,
    /// zlib level for packs written by [`ObjectDatabase::consolidate`].
    pub pack_compression: u32,
}

impl Default for OdbOptions {
    fn default() -> Self {
        Self {
            cache_size: 1024,
            loose_compression: 1,
            pack_compression: 6,
        }
    }
}

/// Object database over one `objects/` directory.
pub struct ObjectDatabase {
    loose: LooseStore,
    /// Installed packs, newest first. Replaced wholesale on refresh.
    packs: RwLock<Vec<Arc<PackFile>>>,
    cache: Mutex<lru::LruCache<ObjectId, Object>>,
    objects_dir: PathBuf,
    options: OdbOptions,
}

impl ObjectDatabase {
    pub fn open(objects_dir: impl AsRef<Path>) -> Result<Self, OdbError> {
        Self::open_with(objects_dir, OdbOptions::default())
    }

    pub fn open_with(objects_dir: impl AsRef<Path>, options: OdbOptions) -> Result<Self, OdbError> {
        let objects_dir = objects_dir.as_ref().to_path_buf();
        let loose = LooseStore::new(&objects_dir).with_compression(options.loose_compression);
        let packs = search::discover_packs(&objects_dir.join("pack"), &[])?;
        let capacity = NonZeroUsize::new(options.cache_size).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            loose,
            packs: RwLock::new(packs),
            cache: Mutex::new(lru::LruCache::new(capacity)),
            objects_dir,
            options,
        })
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    pub fn pack_dir(&self) -> PathBuf {
        self.objects_dir.join("pack")
    }

    pub fn loose(&self) -> &LooseStore {
        &self.loose
    }

    /// Snapshot of the installed packs, newest first.
    pub fn packs(&self) -> Vec<Arc<PackFile>> {
        self.packs.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn cache(&self) -> MutexGuard<'_, lru::LruCache<ObjectId, Object>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `payload` as an object of `kind` and return its id. Objects
    /// already present, loose or packed, are not written again.
    pub fn put(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId, OdbError> {
        let oid = compute_id(kind, payload)?;
        if self.has(&oid) {
            tracing::trace!(%oid, "object already present");
            return Ok(oid);
        }
        let written = self.loose.write(kind, payload)?;
        debug_assert_eq!(written, oid);
        Ok(oid)
    }

    /// Encode and store a decoded object.
    pub fn put_object(&self, object: &Object) -> Result<ObjectId, OdbError> {
        self.put(object.kind(), &object.encode())
    }

    /// Look an object up, `None` when it is absent everywhere.
    pub fn find(&self, oid: &ObjectId) -> Result<Option<Object>, OdbError> {
        if let Some(hit) = self.cache().get(oid) {
            return Ok(Some(hit.clone()));
        }
        let Some((kind, payload)) = self.find_raw(oid)? else {
            return Ok(None);
        };
        let object = Object::parse(kind, &payload).map_err(|e| OdbError::Corrupt {
            oid: *oid,
            reason: e.to_string(),
        })?;
        self.cache().put(*oid, object.clone());
        Ok(Some(object))
    }

    /// Verified kind and payload bytes, bypassing the decoded-object cache.
    pub fn find_raw(&self, oid: &ObjectId) -> Result<Option<(ObjectKind, Vec<u8>)>, OdbError> {
        match search::find_raw(self, oid)? {
            Some(found) => Ok(Some(found)),
            None if self.refresh_changed()? => search::find_raw(self, oid),
            None => Ok(None),
        }
    }

    pub fn get(&self, oid: &ObjectId) -> Result<Object, OdbError> {
        self.find(oid)?.ok_or(OdbError::NotFound(*oid))
    }

    pub fn get_raw(&self, oid: &ObjectId) -> Result<(ObjectKind, Vec<u8>), OdbError> {
        self.find_raw(oid)?.ok_or(OdbError::NotFound(*oid))
    }

    pub fn has(&self, oid: &ObjectId) -> bool {
        if search::contains(self, oid) {
            return true;
        }
        matches!(self.refresh_changed(), Ok(true)) && search::contains(self, oid)
    }

    /// Kind and size without loading the payload where the storage allows.
    pub fn header(&self, oid: &ObjectId) -> Result<(ObjectKind, u64), OdbError> {
        if let Some(found) = search::find_header(self, oid)? {
            return Ok(found);
        }
        if self.refresh_changed()? {
            if let Some(found) = search::find_header(self, oid)? {
                return Ok(found);
            }
        }
        Err(OdbError::NotFound(*oid))
    }

    /// Open a reader over an object's payload. The digest is checked when
    /// the reader reaches end of data; a mismatch surfaces as an
    /// `InvalidData` I/O error.
    pub fn open_stream(&self, oid: &ObjectId) -> Result<ObjectStream, OdbError> {
        if let Some(stream) = search::open_stream(self, oid)? {
            return Ok(stream);
        }
        if self.refresh_changed()? {
            if let Some(stream) = search::open_stream(self, oid)? {
                return Ok(stream);
            }
        }
        Err(OdbError::NotFound(*oid))
    }

    /// Ids of all loose objects, sorted.
    pub fn iter_loose(&self) -> Result<Vec<ObjectId>, OdbError> {
        Ok(self.loose.list()?)
    }

    /// Rescan `objects/pack`. Packs that are still installed keep their
    /// open mappings.
    pub fn refresh(&self) -> Result<(), OdbError> {
        self.refresh_changed().map(|_| ())
    }

    /// Rescan, reporting whether the set of packs changed.
    fn refresh_changed(&self) -> Result<bool, OdbError> {
        let current = self.packs();
        let fresh = search::discover_packs(&self.pack_dir(), &current)?;
        let changed = fresh.len() != current.len()
            || fresh.iter().zip(&current).any(|(a, b)| a.path() != b.path());
        if changed {
            tracing::debug!(packs = fresh.len(), "pack list changed");
            *self.packs.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        }
        Ok(changed)
    }

    pub fn options(&self) -> &OdbOptions {
        &self.options
    }
}

impl std::fmt::Debug for ObjectDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectDatabase")
            .field("objects_dir", &self.objects_dir)
            .finish_non_exhaustive()
    }
}
