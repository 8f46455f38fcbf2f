//! Receiving a pack into the object store.
//!
//! The stream is spooled to a temporary file in `objects/pack`, verified
//! and indexed in full, completed if thin, and only then installed. Until
//! the final rename nothing is visible to readers, and every temporary file
//! is removed on failure.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use grove_odb::ObjectDatabase;
use grove_pack::{index_pack, install_pack, write_index};
use grove_utils::CancellationToken;
use memmap2::Mmap;
use tempfile::NamedTempFile;

use crate::ProtocolError;

const SPOOL_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// The installed pack; `None` when the pack held no objects.
    pub pack: Option<PathBuf>,
    pub objects: usize,
    /// Bases taken from the local store to complete a thin pack.
    pub thin_bases: usize,
}

fn temp_pack(odb: &ObjectDatabase) -> io::Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix("tmp_pack_")
        .tempfile_in(odb.pack_dir())
}

fn map(file: &File) -> io::Result<Mmap> {
    // SAFETY: the file is a private temporary that nothing else writes
    // while the map is alive.
    unsafe { Mmap::map(file) }
}

/// Store the pack read from `stream` and return what was installed.
pub fn ingest(
    odb: &ObjectDatabase,
    mut stream: impl Read,
    cancel: &CancellationToken,
) -> Result<IngestReport, ProtocolError> {
    let mut spool = temp_pack(odb)?;
    let mut buf = vec![0u8; SPOOL_CHUNK];
    let mut received = 0u64;
    loop {
        cancel.check()?;
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        spool.write_all(&buf[..n])?;
        received += n as u64;
    }
    spool.flush()?;
    tracing::debug!(bytes = received, "received pack data");

    let data = map(spool.as_file())?;
    let external = |oid: &grove_hash::ObjectId| odb.find_raw(oid).ok().flatten();
    let mut indexed = index_pack(&data, &external, cancel)?;
    if indexed.records.is_empty() {
        tracing::debug!("received an empty pack");
        return Ok(IngestReport::default());
    }

    let thin_bases = indexed.external_bases.len();
    let tmp = if indexed.is_thin() {
        let completed = indexed.complete_thin(&data, temp_pack(odb)?)?;
        drop(data);
        drop(spool);
        completed
    } else {
        drop(data);
        spool
    };
    cancel.check()?;
    tmp.as_file().sync_all()?;

    let idx = write_index(&mut indexed.records, &indexed.checksum)?;
    let objects = indexed.records.len();
    let path = install_pack(&odb.pack_dir(), tmp.into_temp_path(), &indexed.checksum, &idx)?;
    odb.refresh()?;

    tracing::info!(pack = %path.display(), objects, thin_bases, "ingested pack");
    Ok(IngestReport {
        pack: Some(path),
        objects,
        thin_bases,
    })
}
