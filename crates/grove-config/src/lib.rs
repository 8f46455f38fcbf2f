//! git-style configuration.
//!
//! [`ConfigFile`] parses and edits one file while preserving its layout;
//! [`CoreConfig`] is the typed view of the settings the engine reads.

mod settings;
pub mod error;
mod file;
pub mod parse;
pub mod types;

pub use settings::CoreConfig;
pub use error::ConfigError;
pub use file::ConfigFile;
pub use types::{parse_bool, parse_int};

use bstr::{BString, ByteSlice};

/// A normalized `section[.subsection].name` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigKey {
    /// Lowercased.
    pub section: BString,
    /// Case preserved.
    pub subsection: Option<BString>,
    /// Lowercased.
    pub name: BString,
}

impl ConfigKey {
    /// The section is everything before the first dot and the name
    /// everything after the last; anything between is the subsection,
    /// which may itself contain dots.
    pub fn parse(key: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidKey(key.to_string());
        let (section, rest) = key.trim().split_once('.').ok_or_else(invalid)?;
        let (subsection, name) = match rest.rsplit_once('.') {
            Some((sub, name)) => (Some(BString::from(sub)), name),
            None => (None, rest),
        };
        if section.is_empty() || name.is_empty() {
            return Err(invalid());
        }
        Ok(ConfigKey {
            section: section.to_ascii_lowercase().into(),
            subsection,
            name: name.to_ascii_lowercase().into(),
        })
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.subsection {
            Some(sub) => write!(f, "{}.{}.{}", self.section, sub.to_str_lossy(), self.name),
            None => write!(f, "{}.{}", self.section, self.name),
        }
    }
}
