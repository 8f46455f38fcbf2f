use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use grove_hash::ObjectId;
use tempfile::TempPath;

use crate::PackError;

/// Publish a finished pack.
///
/// `tmp_pack` is a complete `.pack` already written inside `pack_dir`. It
/// is renamed to `pack-<checksum>.pack`, then the index is written to a
/// temporary file and renamed to `pack-<checksum>.idx`. Readers only
/// consider a pack once its `.idx` exists, so the idx rename is the single
/// publication point. Installing a pack that is already present is a no-op.
pub fn install_pack(
    pack_dir: &Path,
    tmp_pack: TempPath,
    checksum: &ObjectId,
    idx_bytes: &[u8],
) -> Result<PathBuf, PackError> {
    let stem = format!("pack-{}", checksum);
    let pack_path = pack_dir.join(format!("{}.pack", stem));
    let idx_path = pack_dir.join(format!("{}.idx", stem));

    if idx_path.exists() && pack_path.exists() {
        tracing::debug!(pack = %stem, "pack already installed");
        return Ok(pack_path);
    }

    let mut idx_tmp = tempfile::Builder::new()
        .prefix("tmp_idx_")
        .tempfile_in(pack_dir)?;
    idx_tmp.write_all(idx_bytes)?;
    idx_tmp.as_file().sync_all()?;

    tmp_pack.persist(&pack_path).map_err(|e| PackError::Io(e.error))?;
    if let Err(e) = idx_tmp.persist(&idx_path) {
        let _ = fs::remove_file(&pack_path);
        return Err(PackError::Io(e.error));
    }
    tracing::debug!(pack = %stem, "installed pack");
    Ok(pack_path)
}
