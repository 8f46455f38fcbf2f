use std::fs;
use std::path::Path;

use bstr::ByteSlice;
use grove_hash::ObjectId;

use crate::error::RefError;
use crate::name::RefName;

pub const HEADER: &str = "# pack-refs with: peeled fully-peeled sorted \n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedRef {
    pub name: RefName,
    pub oid: ObjectId,
    /// What an annotated tag ultimately points at.
    pub peeled: Option<ObjectId>,
}

/// Parsed `packed-refs`:
///
/// ```text
/// # pack-refs with: peeled fully-peeled sorted
/// <hex-oid> <refname>
/// ^<hex-oid of the peeled tag target>
/// ```
#[derive(Debug, Clone, Default)]
pub struct PackedRefs {
    refs: Vec<PackedRef>,
}

impl PackedRefs {
    pub fn parse(data: &[u8], path: &Path) -> Result<Self, RefError> {
        let malformed = |reason: &str| RefError::Parse {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        let mut refs: Vec<PackedRef> = Vec::new();
        for line in data.lines() {
            if line.is_empty() || line.starts_with(b"#") {
                continue;
            }
            if let Some(hex) = line.strip_prefix(b"^") {
                let peeled = ObjectId::from_hex(hex.trim())?;
                let last = refs.last_mut().ok_or_else(|| malformed("peeled line without a ref"))?;
                last.peeled = Some(peeled);
                continue;
            }
            let (hex, name) = line
                .split_once_str(" ")
                .ok_or_else(|| malformed("expected '<id> <name>'"))?;
            let name = name.trim().to_str().map_err(|_| malformed("ref name is not UTF-8"))?;
            refs.push(PackedRef {
                name: RefName::new(name)?,
                oid: ObjectId::from_hex(hex)?,
                peeled: None,
            });
        }
        refs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self { refs })
    }

    /// Missing file means no packed refs.
    pub fn load(path: &Path) -> Result<Self, RefError> {
        match fs::read(path) {
            Ok(data) => Self::parse(&data, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn find(&self, name: &RefName) -> Option<&PackedRef> {
        self.refs
            .binary_search_by(|r| r.name.cmp(name))
            .ok()
            .map(|i| &self.refs[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PackedRef> {
        self.refs.iter()
    }

    /// Returns whether an entry was removed.
    pub fn remove(&mut self, name: &RefName) -> bool {
        match self.refs.binary_search_by(|r| r.name.cmp(name)) {
            Ok(i) => {
                self.refs.remove(i);
                true
            }
            Err(_) => false,
        }
    }

    pub fn upsert(&mut self, entry: PackedRef) {
        match self.refs.binary_search_by(|r| r.name.cmp(&entry.name)) {
            Ok(i) => self.refs[i] = entry,
            Err(i) => self.refs.insert(i, entry),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER.len() + self.refs.len() * 64);
        out.extend_from_slice(HEADER.as_bytes());
        for r in &self.refs {
            out.extend_from_slice(format!("{} {}\n", r.oid, r.name).as_bytes());
            if let Some(peeled) = r.peeled {
                out.extend_from_slice(format!("^{}\n", peeled).as_bytes());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "1111111111111111111111111111111111111111";
    const B: &str = "2222222222222222222222222222222222222222";

    #[test]
    fn parses_peeled_lines_and_sorts() {
        let text = format!("{}{} refs/tags/v1\n^{}\n{} refs/heads/main\n", HEADER, A, B, B);
        let packed = PackedRefs::parse(text.as_bytes(), Path::new("packed-refs")).unwrap();
        let names: Vec<_> = packed.iter().map(|r| r.name.to_string()).collect();
        assert_eq!(names, ["refs/heads/main", "refs/tags/v1"]);
        let tag = packed.find(&RefName::new("refs/tags/v1").unwrap()).unwrap();
        assert_eq!(tag.peeled.unwrap().to_hex(), B);
        assert_eq!(PackedRefs::parse(&packed.to_bytes(), Path::new("p")).unwrap().iter().count(), 2);
    }

    #[test]
    fn orphan_peel_line_is_malformed() {
        let err = PackedRefs::parse(format!("^{}\n", A).as_bytes(), Path::new("packed-refs")).unwrap_err();
        assert!(matches!(err, RefError::Parse { .. }));
    }
}
