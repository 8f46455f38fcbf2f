use std::fmt;

use bstr::{BStr, BString, ByteSlice};

use crate::error::RefError;

/// A validated reference name.
///
/// The rules follow `git check-ref-format`: no `..`, no control characters
/// or any of ` ~^:?*[\`, no component starting with `.` or ending with
/// `.lock`, no empty component, no trailing `.`, no `@{`, and not `@`
/// alone. Names without a `/` are limited to upper-case pseudo-refs such
/// as `HEAD` or `FETCH_HEAD`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefName(BString);

const FORBIDDEN: &[u8] = b" ~^:?*[\\";

pub const HEAD: &str = "HEAD";

impl RefName {
    pub fn new(name: impl Into<BString>) -> Result<Self, RefError> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    pub fn head() -> Self {
        Self(HEAD.into())
    }

    /// `main` for `refs/heads/main`, and likewise for tags and remotes.
    pub fn short_name(&self) -> &BStr {
        ["refs/heads/", "refs/tags/", "refs/remotes/"]
            .iter()
            .find_map(|p| self.0.strip_prefix(p.as_bytes()))
            .unwrap_or(self.0.as_slice())
            .as_bstr()
    }

    pub fn is_branch(&self) -> bool {
        self.0.starts_with(b"refs/heads/")
    }

    pub fn is_tag(&self) -> bool {
        self.0.starts_with(b"refs/tags/")
    }

    pub fn as_bstr(&self) -> &BStr {
        self.0.as_bstr()
    }

    /// Ref names are UTF-8 in practice; anything else yields a placeholder.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("<non-utf8 ref>")
    }
}

impl AsRef<BStr> for RefName {
    fn as_ref(&self) -> &BStr {
        self.0.as_bstr()
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for RefName {
    type Error = RefError;

    fn try_from(s: &str) -> Result<Self, RefError> {
        Self::new(s)
    }
}

fn validate(name: &[u8]) -> Result<(), RefError> {
    let reject = |why: &str| {
        Err(RefError::InvalidName(format!(
            "'{}': {}",
            name.as_bstr(),
            why
        )))
    };

    if name.is_empty() {
        return reject("empty");
    }
    if name == b"@" {
        return reject("'@' alone is reserved");
    }
    if let Some(&b) = name.iter().find(|&&b| b < 0x20 || b == 0x7f || FORBIDDEN.contains(&b)) {
        return reject(&format!("contains forbidden byte {:?}", b as char));
    }
    if name.find(b"..").is_some() {
        return reject("contains '..'");
    }
    if name.find(b"@{").is_some() {
        return reject("contains '@{'");
    }
    if name.ends_with(b".") {
        return reject("ends with '.'");
    }
    for component in name.split_str("/") {
        if component.is_empty() {
            return reject("empty path component");
        }
        if component.starts_with(b".") {
            return reject("component starts with '.'");
        }
        if component.ends_with(b".lock") {
            return reject("component ends with '.lock'");
        }
    }
    if !name.contains(&b'/') && !name.iter().all(|b| b.is_ascii_uppercase() || *b == b'_') {
        return reject("one-level names must be upper-case pseudo-refs");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_names() {
        for name in [
            "refs/heads/main",
            "refs/tags/v1.0",
            "refs/remotes/origin/feature/x-y",
            "HEAD",
            "FETCH_HEAD",
        ] {
            assert!(RefName::new(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_malformed_names() {
        for name in [
            "",
            "@",
            "refs/heads/a..b",
            "refs/heads/a b",
            "refs/heads/a~1",
            "refs/heads/a^",
            "refs/heads/a:b",
            "refs/heads/a?",
            "refs/heads/a*",
            "refs/heads/a[",
            "refs/heads/a\\b",
            "refs/heads/\x01",
            "refs/heads/.hidden",
            "refs/heads/main.lock",
            "refs/heads/main/",
            "/refs/heads/main",
            "refs//heads",
            "refs/heads/main.",
            "refs/heads/a@{1}",
            "main",
        ] {
            assert!(RefName::new(name).is_err(), "{name:?}");
        }
    }

    #[test]
    fn short_names() {
        assert_eq!(RefName::new("refs/heads/topic").unwrap().short_name(), "topic");
        assert_eq!(RefName::new("refs/remotes/origin/main").unwrap().short_name(), "origin/main");
        assert_eq!(RefName::head().short_name(), "HEAD");
    }
}
