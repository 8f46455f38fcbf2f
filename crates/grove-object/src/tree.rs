use std::cmp::Ordering;

use bstr::{BStr, BString, ByteSlice};
use grove_hash::{ObjectId, RAW_LEN};

use crate::ObjectError;

/// Mode of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryMode {
    Regular,
    Executable,
    Symlink,
    Gitlink,
    Tree,
}

impl EntryMode {
    /// Parse the octal text stored in trees. Group-writable `100664`
    /// files, found in very old repositories, read as regular files.
    pub fn from_octal(text: &[u8]) -> Result<Self, ObjectError> {
        let raw = std::str::from_utf8(text)
            .ok()
            .and_then(|s| u32::from_str_radix(s, 8).ok())
            .ok_or_else(|| ObjectError::BadMode(text.into()))?;
        Self::from_raw(raw).ok_or_else(|| ObjectError::BadMode(text.into()))
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0o100644 | 0o100664 => Self::Regular,
            0o100755 => Self::Executable,
            0o120000 => Self::Symlink,
            0o160000 => Self::Gitlink,
            0o040000 => Self::Tree,
            _ => return None,
        })
    }

    pub fn raw(&self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
            Self::Symlink => 0o120000,
            Self::Gitlink => 0o160000,
            Self::Tree => 0o040000,
        }
    }

    /// Octal text as written in trees; directories carry no leading zero.
    pub fn to_octal(&self) -> String {
        format!("{:o}", self.raw())
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Tree)
    }

    /// Regular, executable or symlink: anything backed by a blob.
    pub fn is_blob(&self) -> bool {
        matches!(self, Self::Regular | Self::Executable | Self::Symlink)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeEntry {
    pub mode: EntryMode,
    pub name: BString,
    pub oid: ObjectId,
}

impl TreeEntry {
    pub fn new(mode: EntryMode, name: impl Into<BString>, oid: ObjectId) -> Self {
        Self {
            mode,
            name: name.into(),
            oid,
        }
    }
}

/// Canonical entry order: byte-wise by name, where a directory name sorts
/// as though it ended with `/`.
pub fn tree_order(a: &[u8], a_is_tree: bool, b: &[u8], b_is_tree: bool) -> Ordering {
    let common = a.len().min(b.len());
    match a[..common].cmp(&b[..common]) {
        Ordering::Equal => {}
        other => return other,
    }
    let tail = |name: &[u8], is_tree: bool| -> Option<u8> {
        name.get(common)
            .copied()
            .or(if is_tree { Some(b'/') } else { None })
    };
    tail(a, a_is_tree).cmp(&tail(b, b_is_tree))
}

/// A directory snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(data: &[u8]) -> Result<Self, ObjectError> {
        let mut entries = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            let rest = &data[pos..];
            let space = rest.find_byte(b' ').ok_or(ObjectError::BadTreeEntry {
                offset: pos,
                reason: "missing space after mode",
            })?;
            let mode = EntryMode::from_octal(&rest[..space])?;
            let after_mode = &rest[space + 1..];
            let nul = after_mode.find_byte(0).ok_or(ObjectError::BadTreeEntry {
                offset: pos,
                reason: "missing NUL after name",
            })?;
            let name = &after_mode[..nul];
            if name.is_empty() || name.contains(&b'/') || name == b"." || name == b".." {
                return Err(ObjectError::BadTreeEntry {
                    offset: pos,
                    reason: "invalid entry name",
                });
            }
            let id_start = nul + 1;
            let raw = after_mode
                .get(id_start..id_start + RAW_LEN)
                .ok_or(ObjectError::BadTreeEntry {
                    offset: pos,
                    reason: "truncated object id",
                })?;
            entries.push(TreeEntry {
                mode,
                name: name.into(),
                oid: ObjectId::from_bytes(raw)?,
            });
            pos += space + 1 + id_start + RAW_LEN;
        }
        Ok(Self { entries })
    }

    /// Encode in canonical order regardless of the order of `entries`.
    pub fn encode(&self) -> Vec<u8> {
        let mut sorted: Vec<&TreeEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| tree_order(&a.name, a.mode.is_tree(), &b.name, b.mode.is_tree()));
        let mut out = Vec::with_capacity(self.entries.len() * 40);
        for entry in sorted {
            out.extend_from_slice(entry.mode.to_octal().as_bytes());
            out.push(b' ');
            out.extend_from_slice(&entry.name);
            out.push(0);
            out.extend_from_slice(entry.oid.as_bytes());
        }
        out
    }

    /// Sort entries in place into canonical order.
    pub fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| tree_order(&a.name, a.mode.is_tree(), &b.name, b.mode.is_tree()));
    }

    pub fn find(&self, name: &BStr) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name.as_bstr() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TreeEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Tree {
    type Item = &'a TreeEntry;
    type IntoIter = std::slice::Iter<'a, TreeEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(n: u8) -> ObjectId {
        ObjectId::new([n; RAW_LEN])
    }

    #[test]
    fn directories_sort_with_trailing_slash() {
        // "foo.c" < "foo/" because '.' (0x2e) < '/' (0x2f); "foo0" > "foo/".
        assert_eq!(tree_order(b"foo.c", false, b"foo", true), Ordering::Less);
        assert_eq!(tree_order(b"foo", true, b"foo0", false), Ordering::Less);
        assert_eq!(tree_order(b"foo", false, b"foo.c", false), Ordering::Less);
        assert_eq!(tree_order(b"a", true, b"a", true), Ordering::Equal);
    }

    #[test]
    fn encode_sorts_and_parse_reads_back() {
        let tree = Tree {
            entries: vec![
                TreeEntry::new(EntryMode::Tree, "foo", oid(1)),
                TreeEntry::new(EntryMode::Regular, "foo.c", oid(2)),
                TreeEntry::new(EntryMode::Executable, "bar", oid(3)),
            ],
        };
        let parsed = Tree::parse(&tree.encode()).unwrap();
        let names: Vec<_> = parsed.iter().map(|e| e.name.to_string()).collect();
        assert_eq!(names, ["bar", "foo.c", "foo"]);
        assert_eq!(parsed.entries[2].mode, EntryMode::Tree);
    }

    #[test]
    fn tree_mode_has_no_leading_zero() {
        let tree = Tree {
            entries: vec![TreeEntry::new(EntryMode::Tree, "d", oid(9))],
        };
        assert!(tree.encode().starts_with(b"40000 d\0"));
    }

    #[test]
    fn rejects_slash_in_name() {
        let mut data = b"100644 a/b\0".to_vec();
        data.extend_from_slice(&[0u8; RAW_LEN]);
        assert!(Tree::parse(&data).is_err());
    }

    #[test]
    fn rejects_truncated_id() {
        let mut data = b"100644 a\0".to_vec();
        data.extend_from_slice(&[0u8; 10]);
        assert!(matches!(
            Tree::parse(&data),
            Err(ObjectError::BadTreeEntry { .. })
        ));
    }

    #[test]
    fn legacy_group_writable_mode_reads_as_regular() {
        assert_eq!(EntryMode::from_octal(b"100664").unwrap(), EntryMode::Regular);
        assert!(EntryMode::from_octal(b"100600").is_err());
    }
}
