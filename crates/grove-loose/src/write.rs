use std::fs;
use std::io::{self, Write};

use flate2::write::ZlibEncoder;
use grove_hash::ObjectId;
use grove_object::{compute_id, header, ObjectKind};

use crate::{LooseError, LooseStore};

impl LooseStore {
    /// Store `payload` as a `kind` object and return its id.
    ///
    /// Writing content that already exists is a no-op. The compressed
    /// object is written to a temporary file in the objects directory and
    /// linked into place, so readers never observe a partial file and
    /// concurrent writers of the same object both succeed.
    pub fn write(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId, LooseError> {
        let oid = compute_id(kind, payload)?;
        let path = self.path_of(&oid);
        if path.exists() {
            return Ok(oid);
        }

        fs::create_dir_all(&self.objects_dir)?;
        let tmp = tempfile::Builder::new()
            .prefix("tmp_obj_")
            .tempfile_in(&self.objects_dir)?;
        let mut encoder = ZlibEncoder::new(tmp, self.compression);
        encoder.write_all(&header::encode(kind, payload.len()))?;
        encoder.write_all(payload)?;
        let tmp = encoder.finish()?;
        tmp.as_file().sync_all()?;
        set_read_only(tmp.path())?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                tracing::debug!(%oid, %kind, size = payload.len(), "wrote loose object");
                Ok(oid)
            }
            // Another writer installed identical content first.
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists || path.exists() => Ok(oid),
            Err(e) => Err(LooseError::Io(e.error)),
        }
    }

    /// Remove a loose object, for example after it was copied into a pack.
    /// Missing files are not an error.
    pub fn remove(&self, oid: &ObjectId) -> Result<(), LooseError> {
        let path = self.path_of(oid);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        if let Some(dir) = path.parent() {
            // Leaves the fan-out directory alone unless it became empty.
            let _ = fs::remove_dir(dir);
        }
        Ok(())
    }
}

#[cfg(unix)]
fn set_read_only(path: &std::path::Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o444))
}

#[cfg(not(unix))]
fn set_read_only(path: &std::path::Path) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms)
}
