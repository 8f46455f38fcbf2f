use std::fs;
use std::io;

use grove_hash::ObjectId;

use crate::{LooseError, LooseStore};

impl LooseStore {
    /// Every loose object id, sorted. Stray files that are not object
    /// names (temporary files, `info/`, `pack/`) are skipped.
    pub fn list(&self) -> Result<Vec<ObjectId>, LooseError> {
        let mut out = Vec::new();
        let top = match fs::read_dir(&self.objects_dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        for dir in top {
            let dir = dir?;
            let prefix = dir.file_name();
            let Some(prefix) = prefix.to_str() else { continue };
            if prefix.len() != 2 || !grove_hash::hex::is_hex(prefix.as_bytes()) {
                continue;
            }
            for file in fs::read_dir(dir.path())? {
                let file = file?;
                let name = file.file_name();
                let Some(rest) = name.to_str() else { continue };
                if rest.len() != grove_hash::HEX_LEN - 2 {
                    continue;
                }
                if let Ok(oid) = ObjectId::from_hex(format!("{}{}", prefix, rest)) {
                    out.push(oid);
                }
            }
        }
        out.sort();
        Ok(out)
    }
}
