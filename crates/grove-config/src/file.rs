use std::io::Write;
use std::path::Path;

use bstr::{BStr, BString, ByteSlice};
use grove_utils::LockFile;

use crate::error::ConfigError;
use crate::parse::{self, Event};
use crate::types;
use crate::ConfigKey;

/// One config file, kept as parsed events so that writing it back changes
/// only the lines that were edited.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    events: Vec<Event>,
}

impl ConfigFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(input: &[u8]) -> Result<Self, ConfigError> {
        Ok(Self {
            events: parse::parse(input)?,
        })
    }

    /// Read a file; a missing file is an empty config.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read(path.as_ref()) {
            Ok(bytes) => Self::parse(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Every `(section, subsection, name, value)` in file order.
    fn entries(&self) -> impl Iterator<Item = (usize, &BString, Option<&BString>, &BString, Option<&BString>)> {
        let mut section: Option<(&BString, Option<&BString>)> = None;
        self.events.iter().enumerate().filter_map(move |(i, event)| match event {
            Event::Section {
                section: s,
                subsection,
                ..
            } => {
                section = Some((s, subsection.as_ref()));
                None
            }
            Event::Entry { name, value, .. } => {
                section.map(|(s, sub)| (i, s, sub, name, value.as_ref()))
            }
            Event::Other(_) => None,
        })
    }

    fn matches(key: &ConfigKey, section: &BString, sub: Option<&BString>, name: &BString) -> bool {
        key.section == *section && key.subsection.as_ref() == sub && key.name == *name
    }

    /// The last value for `key`. The inner `None` is a bare `name` line
    /// (implicit `true`).
    pub fn get_raw(&self, key: &ConfigKey) -> Option<Option<&BStr>> {
        self.entries()
            .filter(|(_, s, sub, n, _)| Self::matches(key, s, *sub, n))
            .last()
            .map(|(_, _, _, _, v)| v.map(|v| v.as_bstr()))
    }

    /// All values for a multi-valued key, in file order.
    pub fn get_all(&self, key: &ConfigKey) -> Vec<&BStr> {
        self.entries()
            .filter(|(_, s, sub, n, _)| Self::matches(key, s, *sub, n))
            .map(|(_, _, _, _, v)| v.map_or(BStr::new(""), |v| v.as_bstr()))
            .collect()
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let key = ConfigKey::parse(key)?;
        Ok(self
            .get_raw(&key)
            .map(|v| v.map_or_else(String::new, |v| v.to_str_lossy().into_owned())))
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        let parsed = ConfigKey::parse(key)?;
        match self.get_raw(&parsed) {
            None => Ok(None),
            Some(None) => Ok(Some(true)),
            Some(Some(v)) => types::parse_bool(v).map(Some).ok_or_else(|| ConfigError::InvalidBool {
                key: key.to_string(),
                value: v.to_str_lossy().into_owned(),
            }),
        }
    }

    /// Integer with an optional `k`, `m` or `g` suffix.
    pub fn get_int(&self, key: &str) -> Result<Option<i64>, ConfigError> {
        let parsed = ConfigKey::parse(key)?;
        match self.get_raw(&parsed) {
            None => Ok(None),
            Some(v) => {
                let v = v.unwrap_or(BStr::new(""));
                types::parse_int(v).map(Some).ok_or_else(|| ConfigError::InvalidInt {
                    key: key.to_string(),
                    value: v.to_str_lossy().into_owned(),
                })
            }
        }
    }

    /// Subsection names present under `section`, for example remote names.
    pub fn subsections(&self, section: &str) -> Vec<BString> {
        let section = section.to_ascii_lowercase();
        let mut out: Vec<BString> = Vec::new();
        for event in &self.events {
            if let Event::Section {
                section: s,
                subsection: Some(sub),
                ..
            } = event
            {
                if s.as_slice() == section.as_bytes() && !out.contains(sub) {
                    out.push(sub.clone());
                }
            }
        }
        out
    }

    /// Set `key` to `value`, replacing its last occurrence, or appending it
    /// to the last matching section, or appending a new section.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let key = ConfigKey::parse(key)?;
        let line = BString::from(format!("\t{} = {}\n", key.name, types::quote(value)));
        let entry = Event::Entry {
            raw: line,
            name: key.name.clone(),
            value: Some(value.into()),
            line: 0,
        };

        let existing = self
            .entries()
            .filter(|(_, s, sub, n, _)| Self::matches(&key, s, *sub, n))
            .last()
            .map(|(i, ..)| i);
        if let Some(i) = existing {
            self.events[i] = entry;
            return Ok(());
        }

        let mut insert_at = None;
        let mut in_section = false;
        for (i, event) in self.events.iter().enumerate() {
            match event {
                Event::Section { section, subsection, .. } => {
                    in_section = key.section == *section && key.subsection == *subsection;
                    if in_section {
                        insert_at = Some(i + 1);
                    }
                }
                Event::Entry { .. } if in_section => insert_at = Some(i + 1),
                _ => {}
            }
        }

        match insert_at {
            Some(i) => self.events.insert(i, entry),
            None => {
                if self.events.last().is_some_and(|e| !e.raw().ends_with(b"\n")) {
                    self.events.push(Event::Other("\n".into()));
                }
                let header = match &key.subsection {
                    Some(sub) => format!("[{} \"{}\"]\n", key.section, types::escape_subsection(sub)),
                    None => format!("[{}]\n", key.section),
                };
                self.events.push(Event::Section {
                    raw: header.into(),
                    section: key.section.clone(),
                    subsection: key.subsection.clone(),
                });
                self.events.push(entry);
            }
        }
        Ok(())
    }

    /// Append another value for a multi-valued key.
    pub fn add(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let parsed = ConfigKey::parse(key)?;
        if self.get_raw(&parsed).is_none() {
            return self.set(key, value);
        }
        let last = self
            .entries()
            .filter(|(_, s, sub, n, _)| Self::matches(&parsed, s, *sub, n))
            .last()
            .map(|(i, ..)| i);
        if let Some(i) = last {
            let line = BString::from(format!("\t{} = {}\n", parsed.name, types::quote(value)));
            self.events.insert(
                i + 1,
                Event::Entry {
                    raw: line,
                    name: parsed.name,
                    value: Some(value.into()),
                    line: 0,
                },
            );
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.events.iter().flat_map(|e| e.raw().iter().copied()).collect()
    }

    /// Replace `path` atomically through `<path>.lock`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let mut lock = LockFile::acquire(path.as_ref())?;
        lock.write_all(&self.to_bytes())?;
        lock.commit()?;
        Ok(())
    }
}
