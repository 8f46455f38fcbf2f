use std::fmt;
use std::str::FromStr;

use grove_ref::RefName;

use crate::ProtocolError;

/// Maps remote ref names to local ones: `[+]<src>:<dst>`, where both sides
/// may hold a single `*` matching any suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSpec {
    pub force: bool,
    pub src: String,
    pub dst: String,
}

impl RefSpec {
    /// The default fetch mapping for `remote`.
    pub fn default_for(remote: &str) -> Self {
        Self {
            force: true,
            src: "refs/heads/*".into(),
            dst: format!("refs/remotes/{}/*", remote),
        }
    }

    fn is_glob(&self) -> bool {
        self.src.contains('*')
    }

    /// The local name for remote ref `name`, if this spec covers it.
    pub fn map(&self, name: &RefName) -> Option<RefName> {
        let name = name.as_str();
        if !self.is_glob() {
            return (name == self.src)
                .then(|| RefName::new(self.dst.as_str()).ok())
                .flatten();
        }
        let (prefix, suffix) = self.src.split_once('*')?;
        let matched = name.strip_prefix(prefix)?.strip_suffix(suffix)?;
        RefName::new(self.dst.replacen('*', matched, 1)).ok()
    }
}

impl FromStr for RefSpec {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, ProtocolError> {
        let invalid = || ProtocolError::InvalidRefSpec(s.to_owned());
        let (force, body) = match s.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (src, dst) = body.split_once(':').ok_or_else(invalid)?;
        if src.is_empty() || dst.is_empty() {
            return Err(invalid());
        }
        let stars = (src.matches('*').count(), dst.matches('*').count());
        if !matches!(stars, (0, 0) | (1, 1)) {
            return Err(invalid());
        }
        let sample = |side: &str| side.replacen('*', "x", 1);
        if RefName::new(sample(src)).is_err() || RefName::new(sample(dst)).is_err() {
            return Err(invalid());
        }
        Ok(Self {
            force,
            src: src.to_owned(),
            dst: dst.to_owned(),
        })
    }
}

impl fmt::Display for RefSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.force {
            f.write_str("+")?;
        }
        write!(f, "{}:{}", self.src, self.dst)
    }
}
